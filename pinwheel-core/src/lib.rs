pub mod browser;
pub mod config;
pub mod error;
pub mod publisher;

pub use browser::{
    BrowserAutomation, BrowserContext, BrowserError, BrowserLauncher, BrowserResult,
    LaunchOverrides, ViewportSpec,
};
pub use config::{load_publisher_config, PublisherConfig};
pub use error::{ConfigError, Result};
pub use publisher::{
    CancelToken, PinPublisher, PinSession, PublishError, PublishPhase, PublishReport,
    PublishRequest, PublishStatus, PublisherResult, ScheduleSpec, SessionFactory, StoredCookie,
    VerificationLevel,
};
