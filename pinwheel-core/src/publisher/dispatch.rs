use tracing::{debug, info};

use crate::publisher::error::{PublishError, PublisherResult};
use crate::publisher::platform;
use crate::publisher::session::{ActionControl, PinSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Immediate,
    Scheduled,
}

impl DispatchMode {
    fn wanted_labels(&self) -> &'static [&'static str] {
        match self {
            DispatchMode::Scheduled => &[platform::SCHEDULE_ACTION],
            DispatchMode::Immediate => platform::IMMEDIATE_ACTIONS,
        }
    }
}

/// Resolves and clicks the submit control. The one hard rule: when a
/// schedule was planned, an immediate-publish label is never clicked,
/// whatever the resolution found.
pub struct ActionDispatcher;

impl ActionDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub async fn dispatch(
        &self,
        session: &mut dyn PinSession,
        mode: DispatchMode,
    ) -> PublisherResult<String> {
        let actions = session.list_actions(None).await?;
        debug!(candidates = actions.len(), mode = ?mode, "resolving submit control");

        let wanted = mode.wanted_labels();
        let resolved = resolve(&actions, wanted).ok_or_else(|| {
            PublishError::ActionNotFound(format!(
                "{wanted:?} among {} visible candidates",
                actions.len()
            ))
        })?;

        if mode == DispatchMode::Scheduled && is_immediate_label(&resolved.label) {
            return Err(PublishError::ActionSafetyAbort {
                label: resolved.label.clone(),
            });
        }

        session.click_action(resolved.token).await?;
        info!(label = %resolved.label, "submit control clicked");
        Ok(resolved.label.clone())
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Exact label match across the whole wanted list before any fuzzy
/// pass, so "Save draft" can never shadow a real "Publish".
fn resolve<'a>(actions: &'a [ActionControl], wanted: &[&str]) -> Option<&'a ActionControl> {
    for label in wanted {
        if let Some(action) = actions.iter().find(|action| action.label == *label) {
            return Some(action);
        }
    }
    for label in wanted {
        let needle = label.to_ascii_lowercase();
        if let Some(action) = actions
            .iter()
            .find(|action| action.label.to_ascii_lowercase().contains(&needle))
        {
            return Some(action);
        }
    }
    None
}

pub fn is_immediate_label(label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    platform::IMMEDIATE_ACTIONS
        .iter()
        .any(|immediate| lower.contains(&immediate.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(token: u32, label: &str) -> ActionControl {
        ActionControl {
            token,
            label: label.to_string(),
        }
    }

    #[test]
    fn exact_match_outranks_substring_across_the_list() {
        let actions = vec![control(0, "Save draft"), control(1, "Publish")];
        let resolved = resolve(&actions, &["Publish", "Save"]).unwrap();
        assert_eq!(resolved.label, "Publish");
    }

    #[test]
    fn substring_fallback_is_case_insensitive() {
        let actions = vec![control(0, "SCHEDULE PIN")];
        let resolved = resolve(&actions, &["Schedule"]).unwrap();
        assert_eq!(resolved.token, 0);
    }

    #[test]
    fn no_candidate_resolves_to_none() {
        let actions = vec![control(0, "Cancel"), control(1, "Back")];
        assert!(resolve(&actions, &["Publish", "Save"]).is_none());
    }

    #[test]
    fn immediate_labels_are_recognised_in_any_case() {
        assert!(is_immediate_label("Publish"));
        assert!(is_immediate_label("save"));
        assert!(is_immediate_label("Save to board"));
        assert!(!is_immediate_label("Schedule"));
    }
}
