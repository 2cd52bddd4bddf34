use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::BrowserResult;
use crate::config::WaitSection;
use crate::publisher::dispatch::{is_immediate_label, DispatchMode};
use crate::publisher::error::{PublishError, PublisherResult};
use crate::publisher::platform;
use crate::publisher::request::VerificationLevel;
use crate::publisher::session::PinSession;

/// Confirms the dispatched action actually landed. Direct success text
/// is the strong signal; the draft probe is the weak fallback. Nothing
/// here upgrades an unknown outcome to a failure except a draft that
/// visibly survived submission.
pub struct VerificationEngine {
    waits: WaitSection,
    screenshot_dir: Option<PathBuf>,
}

impl VerificationEngine {
    pub fn new(waits: WaitSection, screenshot_dir: Option<PathBuf>) -> Self {
        Self {
            waits,
            screenshot_dir,
        }
    }

    pub async fn verify(
        &self,
        session: &mut dyn PinSession,
        mode: DispatchMode,
        title: &str,
    ) -> PublisherResult<VerificationLevel> {
        match self.poll_confirmation(session, mode).await {
            Ok(true) => return Ok(VerificationLevel::Direct),
            Ok(false) => {
                debug!("no direct confirmation inside the budget, probing for a leftover draft");
            }
            Err(err) => {
                warn!(error = %err, "confirmation poll failed");
                self.capture(session, "unconfirmed").await;
                return Ok(VerificationLevel::Unconfirmed);
            }
        }

        match self.draft_probe(session, title).await {
            Ok(false) => Ok(VerificationLevel::DraftGone),
            Ok(true) => {
                self.capture(session, "draft").await;
                Err(PublishError::DraftStillPresent)
            }
            Err(err) => {
                warn!(error = %err, "draft probe inconclusive");
                self.capture(session, "unconfirmed").await;
                Ok(VerificationLevel::Unconfirmed)
            }
        }
    }

    async fn poll_confirmation(
        &self,
        session: &mut dyn PinSession,
        mode: DispatchMode,
    ) -> BrowserResult<bool> {
        let budget = match mode {
            DispatchMode::Scheduled => Duration::from_secs(self.waits.schedule_verify_seconds),
            DispatchMode::Immediate => Duration::from_secs(self.waits.immediate_verify_seconds),
        };
        let success_text = match mode {
            DispatchMode::Scheduled => platform::SCHEDULED_TEXT,
            DispatchMode::Immediate => platform::SAVED_TEXT,
        };
        let deadline = Instant::now() + budget;
        loop {
            if session.has_text(success_text).await? {
                info!(confirmation = success_text, "publish confirmed on page");
                return Ok(true);
            }
            if session.is_visible(platform::DIALOG).await? {
                self.confirm_dialog(session, mode).await?;
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval()).await;
        }
    }

    /// An intervening confirmation dialog is clicked through only when
    /// it offers a control consistent with the dispatched mode. A
    /// scheduled publish never clicks an immediate-publish label, even
    /// inside a dialog; the loop just keeps polling past it.
    async fn confirm_dialog(
        &self,
        session: &mut dyn PinSession,
        mode: DispatchMode,
    ) -> BrowserResult<()> {
        let actions = session.list_actions(Some(platform::DIALOG)).await?;
        if actions.is_empty() {
            return Ok(());
        }
        let affirmative = match mode {
            DispatchMode::Scheduled => actions.iter().find(|action| {
                action.label.to_ascii_lowercase().contains("schedule")
                    && !is_immediate_label(&action.label)
            }),
            DispatchMode::Immediate => actions
                .iter()
                .find(|action| is_immediate_label(&action.label)),
        };
        match affirmative {
            Some(action) => {
                debug!(label = %action.label, "confirming dialog");
                session.click_action(action.token).await?;
            }
            None => {
                let labels: Vec<&str> =
                    actions.iter().map(|action| action.label.as_str()).collect();
                debug!(?labels, "dialog offers no control for this mode, leaving it");
            }
        }
        Ok(())
    }

    /// Re-opens the creation view and looks for a draft carrying the
    /// leading characters of the submitted title. Present means the
    /// submission never left the account; absent is a weak positive.
    async fn draft_probe(
        &self,
        session: &mut dyn PinSession,
        title: &str,
    ) -> BrowserResult<bool> {
        let probe: String = title
            .chars()
            .take(platform::DRAFT_TITLE_PROBE_CHARS)
            .collect();
        if probe.is_empty() {
            return Ok(false);
        }

        session.goto(platform::BUILDER_URL).await?;
        let range = self.waits.settle_range_ms;
        session.settle((range[0], range[1])).await?;

        let actions = session.list_actions(None).await?;
        if actions.iter().any(|action| action.label.contains(&probe)) {
            return Ok(true);
        }
        session.has_text(&probe).await
    }

    /// Best effort; verification outcomes never change because a
    /// screenshot could not be written.
    async fn capture(&self, session: &mut dyn PinSession, label: &str) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let bytes = match session.screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "debug screenshot capture failed");
                return;
            }
        };
        if let Err(err) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %err, dir = %dir.display(), "screenshot directory unavailable");
            return;
        }
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("publish-{label}-{stamp}.png"));
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => info!(path = %path.display(), "debug screenshot written"),
            Err(err) => warn!(error = %err, "debug screenshot write failed"),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.waits.poll_interval_ms)
    }
}
