use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AccountSection, WaitSection};
use crate::publisher::error::{PublishError, PublisherResult};
use crate::publisher::locator::{FieldLocator, Probe};
use crate::publisher::platform;
use crate::publisher::session::{PinSession, StoredCookie};

pub const EMAIL_ENV: &str = "PINWHEEL_EMAIL";
pub const PASSWORD_ENV: &str = "PINWHEEL_PASSWORD";

/// Serialized session blob. Cookies are the only state worth carrying
/// between runs; everything else the platform rebuilds on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub saved_at: DateTime<Utc>,
    pub cookies: Vec<StoredCookie>,
}

/// Reads and writes the session blob. A missing or corrupt file is
/// never an error; the caller falls through to a credential login.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn load(&self) -> Option<SessionState> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(_) => {
                debug!(path = %self.path.display(), "no saved session state");
                return None;
            }
        };
        match serde_json::from_slice::<SessionState>(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding unreadable session state");
                None
            }
        }
    }

    pub async fn save(&self, state: &SessionState) -> PublisherResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(state).map_err(std::io::Error::from)?;
        tokio::fs::write(&self.path, raw).await?;
        debug!(path = %self.path.display(), cookies = state.cookies.len(), "session state saved");
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Environment variables override the config section so deployments
    /// can keep secrets out of the TOML file.
    fn resolve(account: &AccountSection) -> Option<Self> {
        let email = env::var(EMAIL_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .or_else(|| account.email.clone().filter(|value| !value.is_empty()))?;
        let password = env::var(PASSWORD_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .or_else(|| account.password.clone().filter(|value| !value.is_empty()))?;
        Some(Self { email, password })
    }
}

/// Brings a session to a signed-in state: installed cookies when the
/// blob is still valid, a scripted credential login otherwise.
pub struct Authenticator {
    account: AccountSection,
    waits: WaitSection,
}

impl Authenticator {
    pub fn new(account: AccountSection, waits: WaitSection) -> Self {
        Self { account, waits }
    }

    /// Returns true when a fresh credential login happened, false when
    /// the saved state was still accepted.
    pub async fn ensure_authenticated(
        &self,
        session: &mut dyn PinSession,
        store: &SessionStore,
    ) -> PublisherResult<bool> {
        if let Some(state) = store.load().await {
            let age_hours = (Utc::now() - state.saved_at).num_hours();
            debug!(cookies = state.cookies.len(), age_hours, "installing saved session state");
            session.install_cookies(&state.cookies).await?;
        }

        session.goto(platform::HOME_URL).await?;
        if self
            .wait_for_profile(session, Duration::from_secs(self.waits.field_timeout_seconds))
            .await?
        {
            debug!("saved session accepted");
            return Ok(false);
        }

        let credentials = Credentials::resolve(&self.account).ok_or_else(|| {
            PublishError::Authentication(format!(
                "signed out and no credentials available (set {EMAIL_ENV}/{PASSWORD_ENV} or the account section)"
            ))
        })?;
        info!(email = %credentials.email, "signing in with credentials");
        self.login(session, &credentials).await?;
        self.snapshot(session, store).await?;
        Ok(true)
    }

    /// Captures the live cookie jar into the store. Called after login
    /// and again after a successful publish so rotated cookies survive.
    pub async fn snapshot(
        &self,
        session: &mut dyn PinSession,
        store: &SessionStore,
    ) -> PublisherResult<()> {
        let cookies = session.read_cookies().await?;
        if cookies.is_empty() {
            debug!("cookie jar empty, keeping previous session state");
            return Ok(());
        }
        store
            .save(&SessionState {
                saved_at: Utc::now(),
                cookies,
            })
            .await
    }

    async fn login(
        &self,
        session: &mut dyn PinSession,
        credentials: &Credentials,
    ) -> PublisherResult<()> {
        session.goto(platform::LOGIN_URL).await?;

        let field_timeout = Duration::from_secs(self.waits.field_timeout_seconds);
        let interval = self.poll_interval();

        let email_locator = platform::email_field();
        let email_probe = email_locator
            .wait_visible(session, field_timeout, interval)
            .await?
            .ok_or_else(|| {
                PublishError::Authentication("login form did not render an email field".to_string())
            })?;
        if !session
            .type_text(&email_probe.selector, &credentials.email)
            .await?
        {
            return Err(PublishError::Authentication(format!(
                "email field vanished ({})",
                email_probe.name
            )));
        }

        let password_locator = platform::password_field();
        let password_probe = password_locator
            .wait_visible(session, field_timeout, interval)
            .await?
            .ok_or_else(|| {
                PublishError::Authentication("login form did not render a password field".to_string())
            })?;
        if !session
            .type_text(&password_probe.selector, &credentials.password)
            .await?
        {
            return Err(PublishError::Authentication(format!(
                "password field vanished ({})",
                password_probe.name
            )));
        }

        let submit_locator = platform::login_submit();
        match submit_locator.first_visible(session).await? {
            Some(probe) => {
                session.click(&probe.selector).await?;
            }
            None => {
                session.press_enter(&password_probe.selector).await?;
            }
        }

        let settle = self.waits.settle_range_ms;
        session.settle((settle[0], settle[1])).await?;

        if self
            .wait_for_profile(session, Duration::from_secs(self.waits.login_timeout_seconds))
            .await?
        {
            info!("credential login accepted");
            return Ok(());
        }

        let url = session.current_url().await?;
        if url.contains("login") {
            Err(PublishError::Authentication(
                "still on the login page after submit; credentials rejected or a challenge was shown"
                    .to_string(),
            ))
        } else {
            Err(PublishError::Authentication(format!(
                "profile chrome missing after sign-in (landed on {url})"
            )))
        }
    }

    async fn wait_for_profile(
        &self,
        session: &mut dyn PinSession,
        timeout: Duration,
    ) -> PublisherResult<bool> {
        let marker = FieldLocator::new(
            "auth-marker",
            vec![Probe::new("header-profile", platform::AUTH_MARKER)],
        );
        Ok(marker
            .wait_visible(session, timeout, self.poll_interval())
            .await?
            .is_some())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.waits.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_round_trips_through_json() {
        let state = SessionState {
            saved_at: Utc::now(),
            cookies: vec![StoredCookie {
                name: "_auth".to_string(),
                value: "token".to_string(),
                domain: ".pinterest.com".to_string(),
                path: "/".to_string(),
                expires: Some(1_900_000_000.0),
                http_only: true,
                secure: true,
                same_site: Some("Lax".to_string()),
            }],
        };
        let raw = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.cookies.len(), 1);
        assert_eq!(back.cookies[0].name, "_auth");
        assert!(back.cookies[0].http_only);
    }

    #[tokio::test]
    async fn corrupt_session_state_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let store = SessionStore::new(&path);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn store_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/auth/session.json");
        let store = SessionStore::new(&path);
        store
            .save(&SessionState {
                saved_at: Utc::now(),
                cookies: Vec::new(),
            })
            .await
            .unwrap();
        assert!(path.exists());
    }
}
