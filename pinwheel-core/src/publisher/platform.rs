//! Platform-facing constants: entry URLs, landmark selectors, and the
//! probe chains for every field the publishing flow touches. The
//! platform ships no stable automation surface, so each field carries
//! several candidates ordered from the current markup to older
//! fallbacks.

use chrono::NaiveDate;

use crate::publisher::locator::{escape_attr_value, FieldLocator, Probe};

pub const HOME_URL: &str = "https://www.pinterest.com/";
pub const LOGIN_URL: &str = "https://www.pinterest.com/login/";
pub const BUILDER_URL: &str = "https://www.pinterest.com/pin-creation-tool/";

/// Visible only for signed-in accounts.
pub const AUTH_MARKER: &str = "div[data-test-id=\"header-profile\"]";
/// Root of the creation form.
pub const BUILDER_MARKER: &str = "div[data-test-id=\"pin-builder\"]";
pub const FILE_INPUT: &str = "input[type=\"file\"]";
pub const DIALOG: &str = "div[role=\"dialog\"]";

pub const SCHEDULED_TEXT: &str = "Scheduled for";
pub const SAVED_TEXT: &str = "Saved to";
pub const PIN_PATH_FRAGMENT: &str = "/pin/";

pub const SCHEDULE_ACTION: &str = "Schedule";
pub const IMMEDIATE_ACTIONS: &[&str] = &["Publish", "Save"];
/// Label of the radio control that switches the form into scheduling
/// mode, used when none of the structural probes match.
pub const SCHEDULE_TOGGLE_LABEL: &str = "Publish at a later date";

/// How many leading characters of the title identify a leftover draft
/// row during verification.
pub const DRAFT_TITLE_PROBE_CHARS: usize = 20;

pub fn email_field() -> FieldLocator {
    FieldLocator::new(
        "email",
        vec![
            Probe::new("name-id", "input[name=\"id\"]"),
            Probe::new("type-email", "input[type=\"email\"]"),
            Probe::new("dom-id", "#email"),
        ],
    )
}

pub fn password_field() -> FieldLocator {
    FieldLocator::new(
        "password",
        vec![
            Probe::new("name-password", "input[name=\"password\"]"),
            Probe::new("type-password", "input[type=\"password\"]"),
            Probe::new("dom-id", "#password"),
        ],
    )
}

pub fn login_submit() -> FieldLocator {
    FieldLocator::new(
        "login-submit",
        vec![
            Probe::new("register-button", "div[data-test-id=\"registerFormSubmitButton\"] button"),
            Probe::new("type-submit", "button[type=\"submit\"]"),
        ],
    )
}

pub fn title_field() -> FieldLocator {
    FieldLocator::new(
        "title",
        vec![
            Probe::new("input-id", "input[id*=\"title\"]"),
            Probe::new("textarea-id", "textarea[id*=\"title\"]"),
            Probe::new("test-id-textarea", "[data-test-id*=\"title\"] textarea"),
            Probe::new("test-id-input", "[data-test-id*=\"title\"] input"),
            Probe::new("aria", "[aria-label*=\"Title\"]"),
            Probe::new("aria-lower", "[aria-label*=\"title\"]"),
        ],
    )
}

pub fn description_field() -> FieldLocator {
    FieldLocator::new(
        "description",
        vec![
            Probe::new(
                "editable",
                "div[data-test-id*=\"description\"] div[contenteditable=\"true\"]",
            ),
            Probe::new("textarea-id", "textarea[id*=\"description\"]"),
            Probe::new("aria", "[aria-label*=\"Description\"]"),
        ],
    )
}

/// Clicked first when the editable surface has not mounted yet; the
/// builder swaps the placeholder for the real editor on focus.
pub fn description_container() -> FieldLocator {
    FieldLocator::new(
        "description-container",
        vec![Probe::new("test-id", "div[data-test-id*=\"description\"]")],
    )
}

pub fn link_field() -> FieldLocator {
    FieldLocator::new(
        "link",
        vec![
            Probe::new("test-id", "input[data-test-id=\"pin-draft-link\"]"),
            Probe::new("placeholder-link", "input[placeholder*=\"link\"]"),
            Probe::new("placeholder-url", "input[placeholder*=\"url\"]"),
        ],
    )
}

pub fn board_picker() -> FieldLocator {
    FieldLocator::new(
        "board-picker",
        vec![Probe::new(
            "select-button",
            "[data-test-id=\"board-dropdown-select-button\"]",
        )],
    )
}

pub fn board_search() -> FieldLocator {
    FieldLocator::new(
        "board-search",
        vec![
            Probe::new("test-id", "[data-test-id=\"board-dropdown-search-input\"]"),
            Probe::new("aria", "input[aria-label=\"Search\"]"),
            Probe::new("placeholder", "input[placeholder*=\"Search\"]"),
        ],
    )
}

pub fn board_option(name: &str) -> FieldLocator {
    let escaped = escape_attr_value(name);
    FieldLocator::new(
        "board-option",
        vec![
            Probe::new("title", format!("div[title=\"{escaped}\"]")),
            Probe::new("aria", format!("div[aria-label=\"{escaped}\"]")),
            Probe::new("row", format!("div[data-test-id=\"board-row-{escaped}\"]")),
        ],
    )
}

pub fn schedule_toggle() -> FieldLocator {
    FieldLocator::new(
        "schedule-toggle",
        vec![
            Probe::new("radio", "[data-test-id=\"schedule-pin-radio\"]"),
            Probe::new("input-later", "input[name=\"publish-option\"][value=\"later\"]"),
        ],
    )
}

pub fn date_field() -> FieldLocator {
    FieldLocator::new(
        "schedule-date",
        vec![
            Probe::new("input-id", "input[id*=\"date\"]"),
            Probe::new("input-name", "input[name=\"date\"]"),
            Probe::new("aria", "[aria-label*=\"Choose a date\"]"),
            Probe::new("test-id", "[data-test-id*=\"schedule-date\"] input"),
        ],
    )
}

/// Matches the calendar popover cell for a concrete day, labelled like
/// "February 19, 2026".
pub fn calendar_day(date: NaiveDate) -> FieldLocator {
    let label = date.format("%B %-d, %Y").to_string();
    let escaped = escape_attr_value(&label);
    FieldLocator::new(
        "calendar-day",
        vec![
            Probe::new("cell", format!("td[aria-label*=\"{escaped}\"]")),
            Probe::new("exact", format!("[aria-label=\"{escaped}\"]")),
        ],
    )
}

pub fn time_field() -> FieldLocator {
    FieldLocator::new(
        "schedule-time",
        vec![
            Probe::new("input-id", "input[id*=\"time\"]"),
            Probe::new("input-name", "input[name=\"time\"]"),
            Probe::new("aria", "[aria-label*=\"Choose a time\"]"),
            Probe::new("test-id", "[data-test-id*=\"schedule-time\"] input"),
        ],
    )
}

pub const TIME_LISTBOX: &str = "div[role=\"listbox\"]";

pub fn time_option(label: &str) -> FieldLocator {
    let escaped = escape_attr_value(label);
    FieldLocator::new(
        "time-option",
        vec![
            Probe::new("title", format!("div[role=\"option\"][title=\"{escaped}\"]")),
            Probe::new("aria", format!("div[role=\"option\"][aria-label=\"{escaped}\"]")),
        ],
    )
}

pub fn tag_field() -> FieldLocator {
    FieldLocator::new(
        "tag-input",
        vec![
            Probe::new("interest-id", "input[id*=\"documented_user_interest\"]"),
            Probe::new("placeholder", "input[placeholder*=\"Search for a tag\"]"),
            Probe::new("search-bar", "[data-test-id=\"tagged-topics-search-bar\"] input"),
        ],
    )
}

pub const TAG_SUGGESTIONS: &str = "div[role=\"listbox\"] div[role=\"option\"]";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_option_escapes_quotes_in_names() {
        let locator = board_option("Recipes \"2026\"");
        assert!(locator.probes()[0]
            .selector
            .contains("div[title=\"Recipes \\\"2026\\\"\"]"));
    }

    #[test]
    fn calendar_day_label_is_unpadded() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        let locator = calendar_day(date);
        assert!(locator.probes()[0].selector.contains("February 3, 2026"));
    }
}
