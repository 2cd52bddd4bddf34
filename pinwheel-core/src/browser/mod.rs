mod automation;
mod error;

pub use automation::{
    BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides, ViewportSpec,
};
pub use error::{BrowserError, BrowserResult};
