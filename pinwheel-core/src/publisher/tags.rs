use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::WaitSection;
use crate::publisher::platform;
use crate::publisher::session::PinSession;

/// Attaches topic tags one at a time: type the tag, wait for the
/// suggestion list, take the top suggestion with Enter, then confirm
/// the chip rendered. Any miss is a warning; tagging never fails a
/// publish.
pub struct TagAnnotator {
    waits: WaitSection,
}

impl TagAnnotator {
    pub fn new(waits: WaitSection) -> Self {
        Self { waits }
    }

    pub async fn annotate(
        &self,
        session: &mut dyn PinSession,
        tags: &[String],
        warnings: &mut Vec<String>,
    ) {
        if tags.is_empty() {
            return;
        }

        let input = match platform::tag_field()
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await
        {
            Ok(Some(probe)) => probe.selector.clone(),
            Ok(None) => {
                warn!(count = tags.len(), "tag input not found, skipping tags");
                warnings.push(format!("tag input not found, {} tags skipped", tags.len()));
                return;
            }
            Err(err) => {
                warnings.push(format!("tag input lookup failed: {err}"));
                return;
            }
        };

        for tag in tags {
            if !self.annotate_one(session, &input, tag).await {
                warnings.push(format!("tag \"{tag}\" could not be confirmed"));
            }
        }
    }

    async fn annotate_one(
        &self,
        session: &mut dyn PinSession,
        input: &str,
        tag: &str,
    ) -> bool {
        if !matches!(session.type_text(input, tag).await, Ok(true)) {
            return false;
        }

        if !self
            .wait_condition(session, platform::TAG_SUGGESTIONS, self.suggestion_timeout())
            .await
        {
            // The list can populate without ever matching the probe on
            // older markup; give the fetch a moment and commit anyway.
            let range = self.waits.settle_range_ms;
            let _ = session.settle((range[0], range[1])).await;
        }
        if !matches!(session.press_enter(input).await, Ok(true)) {
            let _ = session.fill(input, "").await;
            return false;
        }

        let confirmed = self.wait_chip(session, tag).await;
        if confirmed {
            debug!(tag, "tag chip confirmed");
        } else {
            // Leave the input clean so the leftover text cannot bleed
            // into the next tag.
            let _ = session.fill(input, "").await;
        }
        confirmed
    }

    async fn wait_condition(
        &self,
        session: &mut dyn PinSession,
        selector: &str,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if matches!(session.is_visible(selector).await, Ok(true)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval()).await;
        }
    }

    async fn wait_chip(&self, session: &mut dyn PinSession, tag: &str) -> bool {
        let deadline = Instant::now() + self.chip_timeout();
        loop {
            if matches!(session.has_text(tag).await, Ok(true)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.poll_interval()).await;
        }
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.waits.field_timeout_seconds)
    }

    fn suggestion_timeout(&self) -> Duration {
        Duration::from_millis(self.waits.suggestion_timeout_ms)
    }

    fn chip_timeout(&self) -> Duration {
        Duration::from_millis(self.waits.chip_timeout_ms)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.waits.poll_interval_ms)
    }
}
