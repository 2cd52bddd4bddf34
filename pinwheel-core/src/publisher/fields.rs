use std::time::Duration;

use tracing::{debug, warn};

use crate::config::WaitSection;
use crate::publisher::locator::FieldLocator;
use crate::publisher::platform;
use crate::publisher::request::PublishRequest;
use crate::publisher::session::PinSession;

/// Fills title, description, and outbound link on the builder form.
/// Nothing here aborts a publish: a field that cannot be found or
/// written is reported as a warning and left blank, matching how the
/// form itself treats optional metadata.
pub struct FieldFiller {
    waits: WaitSection,
}

impl FieldFiller {
    pub fn new(waits: WaitSection) -> Self {
        Self { waits }
    }

    pub async fn fill(
        &self,
        session: &mut dyn PinSession,
        request: &PublishRequest,
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        let title = request.effective_title();
        self.fill_one(session, &platform::title_field(), title, &mut warnings)
            .await;

        let description = request.effective_description();
        if !description.is_empty() {
            self.fill_description(session, description, &mut warnings)
                .await;
        }

        if let Some(link) = request.link.as_deref().filter(|value| !value.is_empty()) {
            self.fill_one(session, &platform::link_field(), link, &mut warnings)
                .await;
        }

        warnings
    }

    async fn fill_one(
        &self,
        session: &mut dyn PinSession,
        locator: &FieldLocator,
        value: &str,
        warnings: &mut Vec<String>,
    ) -> bool {
        let probe = match locator
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await
        {
            Ok(Some(probe)) => probe,
            Ok(None) => {
                warn!(field = locator.field, "field not found on builder form");
                warnings.push(format!("{} field not found, left blank", locator.field));
                return false;
            }
            Err(err) => {
                warn!(field = locator.field, error = %err, "field lookup failed");
                warnings.push(format!("{} field lookup failed: {err}", locator.field));
                return false;
            }
        };

        match session.fill(&probe.selector, value).await {
            Ok(true) => {
                debug!(field = locator.field, probe = probe.name, "field filled");
                self.pace(session).await;
                true
            }
            Ok(false) => {
                warnings.push(format!(
                    "{} field vanished before it could be written ({})",
                    locator.field, probe.name
                ));
                false
            }
            Err(err) => {
                warn!(field = locator.field, error = %err, "field write failed");
                warnings.push(format!("{} field write failed: {err}", locator.field));
                false
            }
        }
    }

    /// The description editor mounts lazily; clicking its container
    /// swaps the placeholder for the editable surface, so a miss gets
    /// one click-then-retry pass before giving up.
    async fn fill_description(
        &self,
        session: &mut dyn PinSession,
        description: &str,
        warnings: &mut Vec<String>,
    ) {
        let locator = platform::description_field();
        let mut probed = locator.first_visible(session).await.ok().flatten().is_some();
        if !probed {
            if let Ok(Some(container)) = platform::description_container()
                .first_visible(session)
                .await
            {
                let _ = session.click(&container.selector).await;
                self.pace(session).await;
                probed = true;
            }
        }
        if !probed {
            warnings.push("description field not found, left blank".to_string());
            return;
        }
        self.fill_one(session, &locator, description, warnings).await;
    }

    async fn pace(&self, session: &mut dyn PinSession) {
        let range = self.waits.settle_range_ms;
        let _ = session.settle((range[0], range[1])).await;
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.waits.field_timeout_seconds)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.waits.poll_interval_ms)
    }
}
