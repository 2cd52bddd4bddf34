use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{PublishError, PublisherResult};

/// The platform truncates longer values server-side; trimming up front
/// keeps the draft-title verification probe aligned with what was stored.
pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub media_url: String,
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub collection: Option<String>,
    pub tags: Vec<String>,
    pub schedule: Option<ScheduleSpec>,
}

impl PublishRequest {
    pub fn new(media_url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            media_url: media_url.into(),
            title: title.into(),
            description: String::new(),
            link: None,
            collection: None,
            tags: Vec::new(),
            schedule: None,
        }
    }

    pub fn validate(&self) -> PublisherResult<()> {
        if self.title.trim().is_empty() {
            return Err(PublishError::InvalidRequest("title is empty".into()));
        }
        let parsed = Url::parse(&self.media_url)
            .map_err(|err| PublishError::InvalidRequest(format!("media url: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https" | "file") {
            return Err(PublishError::InvalidRequest(format!(
                "unsupported media url scheme: {}",
                parsed.scheme()
            )));
        }
        Ok(())
    }

    pub fn effective_title(&self) -> &str {
        truncate_chars(&self.title, TITLE_MAX_CHARS)
    }

    pub fn effective_description(&self) -> &str {
        truncate_chars(&self.description, DESCRIPTION_MAX_CHARS)
    }
}

/// Splits a comma-separated tag string into cleaned entries, preserving
/// order and dropping blanks.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ScheduleSpec {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Parses the wizard wire format: `2026-02-19` plus `2:30 PM`
    /// (a zero-padded hour is accepted too).
    pub fn parse(date: &str, time: &str) -> PublisherResult<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|err| PublishError::InvalidRequest(format!("schedule date: {err}")))?;
        let time = NaiveTime::parse_from_str(&time.trim().to_uppercase(), "%I:%M %p")
            .map_err(|err| PublishError::InvalidRequest(format!("schedule time: {err}")))?;
        Ok(Self { date, time })
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    Scheduled,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Published => "published",
            PublishStatus::Scheduled => "scheduled",
            PublishStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "published" => Ok(PublishStatus::Published),
            "scheduled" => Ok(PublishStatus::Scheduled),
            "failed" => Ok(PublishStatus::Failed),
            other => Err(format!("unknown publish status: {other}")),
        }
    }
}

/// How strongly the outcome was confirmed. `Unconfirmed` means the
/// dispatch happened but no indicator was observed; callers must treat
/// it as "not confirmed", never as a guaranteed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Direct,
    DraftGone,
    Unconfirmed,
    Skipped,
}

impl VerificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationLevel::Direct => "direct",
            VerificationLevel::DraftGone => "draft_gone",
            VerificationLevel::Unconfirmed => "unconfirmed",
            VerificationLevel::Skipped => "skipped",
        }
    }

    pub fn confirmed(&self) -> bool {
        matches!(self, VerificationLevel::Direct | VerificationLevel::DraftGone)
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPhase {
    Idle,
    Staging,
    Authenticating,
    FillingFields,
    SelectingCollection,
    Tagging,
    Scheduling,
    Dispatching,
    Verifying,
    Done,
    Failed,
}

impl PublishPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishPhase::Idle => "idle",
            PublishPhase::Staging => "staging",
            PublishPhase::Authenticating => "authenticating",
            PublishPhase::FillingFields => "filling_fields",
            PublishPhase::SelectingCollection => "selecting_collection",
            PublishPhase::Tagging => "tagging",
            PublishPhase::Scheduling => "scheduling",
            PublishPhase::Dispatching => "dispatching",
            PublishPhase::Verifying => "verifying",
            PublishPhase::Done => "done",
            PublishPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final report for one publish operation. Built once when the pipeline
/// ends and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub status: PublishStatus,
    pub remote_url: Option<String>,
    pub error: Option<String>,
    pub verification: VerificationLevel,
    pub scheduled_for: Option<NaiveDateTime>,
    pub dispatched_action: Option<String>,
    pub warnings: Vec<String>,
    pub failed_phase: Option<PublishPhase>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl PublishReport {
    pub fn failed(
        error: &PublishError,
        phase: PublishPhase,
        warnings: Vec<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: PublishStatus::Failed,
            remote_url: None,
            error: Some(error.to_string()),
            verification: VerificationLevel::Skipped,
            scheduled_for: None,
            dispatched_action: None,
            warnings,
            failed_phase: Some(phase),
            elapsed,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status != PublishStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let title = "é".repeat(120);
        let request = PublishRequest::new("file:///tmp/a.png", title);
        assert_eq!(request.effective_title().chars().count(), TITLE_MAX_CHARS);

        let short = PublishRequest::new("file:///tmp/a.png", "short");
        assert_eq!(short.effective_title(), "short");
    }

    #[test]
    fn tag_splitting_drops_blanks_and_trims() {
        let tags = split_tags("home decor, , minimalism ,  cozy  ");
        assert_eq!(tags, vec!["home decor", "minimalism", "cozy"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn schedule_parse_accepts_unpadded_and_padded_hours() {
        let padded = ScheduleSpec::parse("2026-02-19", "02:30 PM").unwrap();
        let unpadded = ScheduleSpec::parse("2026-02-19", "2:30 pm").unwrap();
        assert_eq!(padded, unpadded);
        assert_eq!(
            padded.naive(),
            NaiveDate::from_ymd_opt(2026, 2, 19)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn schedule_parse_rejects_garbage() {
        assert!(ScheduleSpec::parse("19/02/2026", "2:30 PM").is_err());
        assert!(ScheduleSpec::parse("2026-02-19", "25:99").is_err());
    }

    #[test]
    fn request_validation_checks_url_scheme() {
        let mut request = PublishRequest::new("ftp://host/image.png", "title");
        assert!(request.validate().is_err());
        request.media_url = "https://cdn.example.com/image.png".into();
        assert!(request.validate().is_ok());
        request.title = "  ".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PublishStatus::Published,
            PublishStatus::Scheduled,
            PublishStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PublishStatus>().unwrap(), status);
        }
    }
}
