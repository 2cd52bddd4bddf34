use std::time::Duration;

use tracing::{debug, warn};

use crate::config::WaitSection;
use crate::publisher::platform;
use crate::publisher::session::PinSession;

/// Drives the board picker: open the dropdown, narrow it with the
/// search box when one renders, click the named row. A board that
/// cannot be reached leaves the pin on the account default, reported
/// as a warning.
pub struct CollectionSelector {
    waits: WaitSection,
}

impl CollectionSelector {
    pub fn new(waits: WaitSection) -> Self {
        Self { waits }
    }

    pub async fn select(
        &self,
        session: &mut dyn PinSession,
        name: &str,
        warnings: &mut Vec<String>,
    ) -> bool {
        let picker = match platform::board_picker()
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await
        {
            Ok(Some(probe)) => probe.selector.clone(),
            Ok(None) => {
                warnings.push(format!("board picker not found, \"{name}\" not selected"));
                return false;
            }
            Err(err) => {
                warnings.push(format!("board picker lookup failed: {err}"));
                return false;
            }
        };
        if !matches!(session.click(&picker).await, Ok(true)) {
            warnings.push(format!("board picker did not open, \"{name}\" not selected"));
            return false;
        }
        self.pace(session).await;

        // The search box only renders for accounts above a handful of
        // boards; skipping it is not a failure.
        match platform::board_search().first_visible(session).await {
            Ok(Some(search)) => {
                let selector = search.selector.clone();
                if matches!(session.fill(&selector, name).await, Ok(true)) {
                    self.pace(session).await;
                }
            }
            Ok(None) => {}
            Err(err) => {
                debug!(error = %err, "board search probe failed, scanning full list");
            }
        }

        let option = match platform::board_option(name)
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await
        {
            Ok(Some(probe)) => probe.selector.clone(),
            Ok(None) => {
                warn!(board = name, "board row never rendered");
                warnings.push(format!("board \"{name}\" not found in the picker"));
                return false;
            }
            Err(err) => {
                warnings.push(format!("board \"{name}\" lookup failed: {err}"));
                return false;
            }
        };
        match session.click(&option).await {
            Ok(true) => {
                debug!(board = name, "board selected");
                self.pace(session).await;
                true
            }
            _ => {
                warnings.push(format!("board \"{name}\" row could not be clicked"));
                false
            }
        }
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
