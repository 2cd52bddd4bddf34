//! The publishing pipeline: one `publish` call drives staging,
//! authentication, form filling, optional scheduling, dispatch, and
//! verification against a live browser session.

pub mod auth;
pub mod collection;
pub mod dispatch;
pub mod error;
pub mod fields;
pub mod locator;
pub mod platform;
pub mod request;
pub mod schedule;
pub mod session;
pub mod stage;
pub mod tags;
pub mod verify;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserError, BrowserLauncher};
use crate::config::PublisherConfig;

pub use auth::{Authenticator, SessionState, SessionStore};
pub use collection::CollectionSelector;
pub use dispatch::{ActionDispatcher, DispatchMode};
pub use error::{PublishError, PublisherResult};
pub use fields::FieldFiller;
pub use locator::{FieldLocator, Probe};
pub use request::{
    split_tags, PublishPhase, PublishReport, PublishRequest, PublishStatus, ScheduleSpec,
    VerificationLevel,
};
pub use schedule::{SchedulePlan, SchedulingPlanner};
pub use session::{
    ActionControl, BrowserSessionFactory, CdpSession, PinSession, SessionFactory, StoredCookie,
};
pub use stage::{AssetStager, StagedAsset};
pub use tags::TagAnnotator;
pub use verify::VerificationEngine;

/// Cooperative cancellation flag, checked at stage boundaries. Cloning
/// shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

struct PublishProgress {
    phase: PublishPhase,
    warnings: Vec<String>,
}

impl PublishProgress {
    fn enter(&mut self, phase: PublishPhase, cancel: &CancelToken) -> PublisherResult<()> {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        self.phase = phase;
        info!(phase = %phase, "stage transition");
        Ok(())
    }
}

/// Front door of the crate. Owns every pipeline component; each
/// `publish` call gets its own browser instance through the session
/// factory and leaves nothing behind on any exit path.
pub struct PinPublisher {
    config: Arc<PublisherConfig>,
    sessions: Arc<dyn SessionFactory>,
    store: SessionStore,
    stager: AssetStager,
    authenticator: Authenticator,
    fields: FieldFiller,
    collections: CollectionSelector,
    tags: TagAnnotator,
    scheduler: SchedulingPlanner,
    dispatcher: ActionDispatcher,
    verifier: VerificationEngine,
}

impl PinPublisher {
    pub fn new(config: PublisherConfig) -> PublisherResult<Self> {
        let config = Arc::new(config);
        let launcher = BrowserLauncher::new(config.clone());
        let sessions: Arc<dyn SessionFactory> = Arc::new(BrowserSessionFactory::new(launcher));
        Self::with_sessions(config, sessions)
    }

    /// Wires the pipeline over an externally supplied session factory.
    pub fn with_sessions(
        config: Arc<PublisherConfig>,
        sessions: Arc<dyn SessionFactory>,
    ) -> PublisherResult<Self> {
        let waits = config.waits.clone();
        Ok(Self {
            store: SessionStore::new(&config.account.session_state_path),
            stager: AssetStager::new(config.asset.clone())?,
            authenticator: Authenticator::new(config.account.clone(), waits.clone()),
            fields: FieldFiller::new(waits.clone()),
            collections: CollectionSelector::new(waits.clone()),
            tags: TagAnnotator::new(waits.clone()),
            scheduler: SchedulingPlanner::new(config.scheduling.clone(), waits.clone()),
            dispatcher: ActionDispatcher::new(),
            verifier: VerificationEngine::new(
                waits,
                config.observability.screenshot_dir.clone().map(PathBuf::from),
            ),
            config,
            sessions,
        })
    }

    pub async fn publish(&self, request: PublishRequest) -> PublishReport {
        self.publish_with_cancel(request, CancelToken::new()).await
    }

    /// Never returns an error: every failure folds into a `Failed`
    /// report carrying the phase it died in and the warnings gathered
    /// up to that point.
    pub async fn publish_with_cancel(
        &self,
        request: PublishRequest,
        cancel: CancelToken,
    ) -> PublishReport {
        let started = Instant::now();
        let mut progress = PublishProgress {
            phase: PublishPhase::Idle,
            warnings: Vec::new(),
        };
        info!(
            title = %request.effective_title(),
            scheduled = request.schedule.is_some(),
            "publish requested"
        );

        let outcome = self.run(&request, &cancel, &mut progress).await;
        let elapsed = started.elapsed();
        match outcome {
            Ok(mut report) => {
                report.warnings = progress.warnings;
                report.elapsed = elapsed;
                info!(
                    status = %report.status,
                    verification = %report.verification,
                    elapsed = ?elapsed,
                    "publish finished"
                );
                report
            }
            Err(err) => {
                error!(phase = %progress.phase, error = %err, "publish failed");
                PublishReport::failed(&err, progress.phase, progress.warnings, elapsed)
            }
        }
    }

    async fn run(
        &self,
        request: &PublishRequest,
        cancel: &CancelToken,
        progress: &mut PublishProgress,
    ) -> PublisherResult<PublishReport> {
        request.validate()?;
        let plan = self
            .scheduler
            .plan(request.schedule.as_ref(), Local::now().naive_local());

        // Media is staged before any browser exists, so an unreachable
        // asset fails the publish with zero browser side effects.
        progress.enter(PublishPhase::Staging, cancel)?;
        let asset = self.stager.stage(&request.media_url).await?;

        progress.enter(PublishPhase::Authenticating, cancel)?;
        let mut session = self.sessions.create().await?;

        let overall = Duration::from_secs(self.config.waits.overall_timeout_seconds);
        let outcome = timeout(
            overall,
            self.run_stages(session.as_mut(), request, &asset, &plan, cancel, progress),
        )
        .await;
        let closed = session.close().await;

        let outcome = match outcome {
            Ok(inner) => inner,
            Err(_) => Err(PublishError::DeadlineExceeded(overall)),
        };
        match (outcome, closed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(report), Err(close_err)) => {
                // The publish itself landed; a leaked browser is an
                // operational warning, not a failed pin.
                warn!(error = %close_err, "browser close failed after a successful publish");
                progress
                    .warnings
                    .push(format!("browser close failed: {close_err}"));
                Ok(report)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "browser close failed after an error");
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        session: &mut dyn PinSession,
        request: &PublishRequest,
        asset: &StagedAsset,
        plan: &SchedulePlan,
        cancel: &CancelToken,
        progress: &mut PublishProgress,
    ) -> PublisherResult<PublishReport> {
        let fresh_login = self
            .authenticator
            .ensure_authenticated(session, &self.store)
            .await?;
        debug!(fresh_login, "session authenticated");

        session.goto(platform::BUILDER_URL).await?;
        let builder = FieldLocator::new(
            "builder",
            vec![Probe::new("root", platform::BUILDER_MARKER)],
        );
        if builder
            .wait_visible(session, self.field_timeout(), self.poll_interval())
            .await?
            .is_none()
        {
            return Err(BrowserError::Timeout("creation form never rendered".to_string()).into());
        }

        session
            .upload_file(platform::FILE_INPUT, asset.path())
            .await
            .map_err(|err| PublishError::Upload(err.to_string()))?;
        info!(bytes = asset.bytes, digest = %&asset.sha256[..12], "media handed to the form");
        // The form exposes no reliable processed signal; a fixed settle
        // is the only safe wait here.
        sleep(Duration::from_secs(self.config.waits.upload_settle_seconds)).await;

        progress.enter(PublishPhase::FillingFields, cancel)?;
        let field_warnings = self.fields.fill(session, request).await;
        progress.warnings.extend(field_warnings);

        progress.enter(PublishPhase::SelectingCollection, cancel)?;
        let board = request
            .collection
            .clone()
            .or_else(|| self.config.account.default_collection.clone())
            .filter(|name| !name.is_empty());
        if let Some(board) = board {
            self.collections
                .select(session, &board, &mut progress.warnings)
                .await;
        }

        progress.enter(PublishPhase::Tagging, cancel)?;
        let tags = normalize_tags(&request.tags);
        self.tags
            .annotate(session, &tags, &mut progress.warnings)
            .await;

        let (mode, scheduled_for) = match plan {
            SchedulePlan::Immediate => (DispatchMode::Immediate, None),
            SchedulePlan::At { effective, bumped } => {
                progress.enter(PublishPhase::Scheduling, cancel)?;
                self.scheduler
                    .apply(session, *effective, &mut progress.warnings)
                    .await?;
                if *bumped {
                    progress
                        .warnings
                        .push(format!("requested slot was too close, scheduled for {effective}"));
                }
                (DispatchMode::Scheduled, Some(*effective))
            }
        };

        progress.enter(PublishPhase::Dispatching, cancel)?;
        let action = self.dispatcher.dispatch(session, mode).await?;

        progress.enter(PublishPhase::Verifying, cancel)?;
        let verification = self
            .verifier
            .verify(session, mode, request.effective_title())
            .await?;

        let remote_url = if mode == DispatchMode::Immediate {
            match session.current_url().await {
                Ok(url) if url.contains(platform::PIN_PATH_FRAGMENT) => Some(url),
                _ => None,
            }
        } else {
            None
        };

        // Cookies rotate during long sessions; re-save while we can.
        if let Err(err) = self.authenticator.snapshot(session, &self.store).await {
            warn!(error = %err, "session snapshot failed");
        }

        progress.phase = PublishPhase::Done;
        let status = match mode {
            DispatchMode::Scheduled => PublishStatus::Scheduled,
            DispatchMode::Immediate => PublishStatus::Published,
        };
        Ok(PublishReport {
            status,
            remote_url,
            error: None,
            verification,
            scheduled_for,
            dispatched_action: Some(action),
            warnings: Vec::new(),
            failed_phase: None,
            elapsed: Duration::ZERO,
        })
    }

    fn field_timeout(&self) -> Duration {
        Duration::from_secs(self.config.waits.field_timeout_seconds)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.waits.poll_interval_ms)
    }
}

/// Accepts both list entries and comma-separated strings inside them.
fn normalize_tags(raw: &[String]) -> Vec<String> {
    raw.iter().flat_map(|entry| split_tags(entry)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn tag_normalisation_flattens_comma_entries() {
        let raw = vec!["home decor, cozy".to_string(), "diy".to_string()];
        assert_eq!(normalize_tags(&raw), vec!["home decor", "cozy", "diy"]);
    }
}
