use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Top-level configuration for the publisher. Every section carries a
/// default so the library is constructible without a config file; the
/// TOML fixture under `configs/` documents the full surface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PublisherConfig {
    pub account: AccountSection,
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agents: UserAgentSection,
    pub viewport: ViewportSection,
    pub asset: AssetSection,
    pub scheduling: SchedulingSection,
    pub waits: WaitSection,
    pub observability: ObservabilitySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountSection {
    pub email: Option<String>,
    pub password: Option<String>,
    pub session_state_path: String,
    pub default_collection: Option<String>,
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            session_state_path: "auth/session.json".to_string(),
            default_collection: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            request_timeout_seconds: Some(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub disable_blink_features: Vec<String>,
    pub mute_audio: bool,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            no_first_run: true,
            disable_automation_controlled: true,
            disable_blink_features: vec!["AutomationControlled".to_string()],
            mute_audio: true,
            lang: None,
            accept_language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentSection {
    pub pool: Vec<String>,
}

impl Default for UserAgentSection {
    fn default() -> Self {
        Self {
            pool: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub resolutions: Vec<[u32; 2]>,
    pub jitter_pixels: u32,
    pub device_scale_factor: [f32; 2],
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            resolutions: vec![[1366, 768], [1536, 864], [1920, 1080]],
            jitter_pixels: 12,
            device_scale_factor: [1.0, 1.25],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetSection {
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for AssetSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_seconds: 2,
            request_timeout_seconds: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Slot math for deferred publishing. `slot_minutes` is the single
/// granularity constant shared by the bump rounding and the time-field
/// candidate labels; changing it changes both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulingSection {
    pub minimum_lead_minutes: i64,
    pub bump_margin_minutes: i64,
    pub slot_minutes: u32,
}

impl Default for SchedulingSection {
    fn default() -> Self {
        Self {
            minimum_lead_minutes: 20,
            bump_margin_minutes: 25,
            slot_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaitSection {
    pub poll_interval_ms: u64,
    pub field_timeout_seconds: u64,
    pub login_timeout_seconds: u64,
    pub upload_settle_seconds: u64,
    pub suggestion_timeout_ms: u64,
    pub chip_timeout_ms: u64,
    pub schedule_verify_seconds: u64,
    pub immediate_verify_seconds: u64,
    pub overall_timeout_seconds: u64,
    pub settle_range_ms: [u64; 2],
}

impl Default for WaitSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            field_timeout_seconds: 10,
            login_timeout_seconds: 30,
            upload_settle_seconds: 10,
            suggestion_timeout_ms: 2000,
            chip_timeout_ms: 1200,
            schedule_verify_seconds: 35,
            immediate_verify_seconds: 15,
            overall_timeout_seconds: 300,
            settle_range_ms: [600, 1800],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObservabilitySection {
    pub screenshot_dir: Option<String>,
}

pub fn load_publisher_config<P: AsRef<Path>>(path: P) -> Result<PublisherConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/publisher.toml");
        let config = load_publisher_config(path).expect("config should parse");
        assert!(config.user_agents.pool.len() >= 2);
        assert_eq!(config.scheduling.slot_minutes, 30);
        assert_eq!(config.asset.max_retries, 3);
        assert_eq!(config.account.session_state_path, "auth/session.json");
    }

    #[test]
    fn defaults_cover_every_section() {
        let config: PublisherConfig = toml::from_str("").expect("empty config should parse");
        assert!(config.chromium.headless);
        assert_eq!(config.scheduling.minimum_lead_minutes, 20);
        assert_eq!(config.scheduling.bump_margin_minutes, 25);
        assert_eq!(config.waits.settle_range_ms.len(), 2);
        assert!(config.observability.screenshot_dir.is_none());
    }
}
