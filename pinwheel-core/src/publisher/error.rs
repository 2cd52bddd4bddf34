use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;

pub type PublisherResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("asset unavailable after {attempts} attempts: {url}")]
    AssetUnavailable { url: String, attempts: u32 },
    #[error("media upload failed: {0}")]
    Upload(String),
    #[error("scheduling controls did not activate: {0}")]
    SchedulingActivation(String),
    #[error("no publish control matched '{0}'")]
    ActionNotFound(String),
    #[error("refusing immediate control '{label}' while a schedule is set")]
    ActionSafetyAbort { label: String },
    #[error("draft still present after dispatch")]
    DraftStillPresent,
    #[error("publish cancelled")]
    Cancelled,
    #[error("publish deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
