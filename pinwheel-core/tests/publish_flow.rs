use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex;
use url::Url;

use pinwheel_core::browser::{BrowserError, BrowserResult};
use pinwheel_core::config::{PublisherConfig, WaitSection};
use pinwheel_core::publisher::locator::{FieldLocator, Probe};
use pinwheel_core::publisher::platform;
use pinwheel_core::publisher::{
    ActionControl, CancelToken, PinPublisher, PinSession, PublishPhase, PublishRequest,
    PublishStatus, ScheduleSpec, SessionFactory, StoredCookie, VerificationLevel,
};

const PNG_BYTES: [u8; 12] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];

#[derive(Clone)]
enum PageOp {
    Show(String),
    Hide(String),
    AddText(String),
    SetUrl(String),
    AddAction(u32, String),
}

#[derive(Default)]
struct FakePage {
    visible: HashSet<String>,
    values: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
    texts: Vec<String>,
    actions: Vec<ActionControl>,
    dialog_actions: Vec<ActionControl>,
    url: String,
    gotos: Vec<String>,
    visibility_queries: Vec<String>,
    clicks: Vec<String>,
    clicked_actions: Vec<String>,
    typed: Vec<(String, String)>,
    uploads: Vec<PathBuf>,
    installed_cookies: Vec<StoredCookie>,
    jar: Vec<StoredCookie>,
    goto_effects: HashMap<String, Vec<PageOp>>,
    click_effects: HashMap<String, Vec<PageOp>>,
    action_effects: HashMap<String, Vec<PageOp>>,
    enter_commits: HashSet<String>,
    closed_sessions: usize,
}

impl FakePage {
    fn show(&mut self, selector: impl Into<String>) {
        self.visible.insert(selector.into());
    }

    fn apply(&mut self, ops: Vec<PageOp>) {
        for op in ops {
            match op {
                PageOp::Show(selector) => {
                    self.visible.insert(selector);
                }
                PageOp::Hide(selector) => {
                    self.visible.remove(&selector);
                }
                PageOp::AddText(text) => self.texts.push(text),
                PageOp::SetUrl(url) => self.url = url,
                PageOp::AddAction(token, label) => self.actions.push(ActionControl { token, label }),
            }
        }
    }
}

struct FakeSession {
    page: Arc<Mutex<FakePage>>,
}

#[async_trait(?Send)]
impl PinSession for FakeSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        let mut page = self.page.lock().await;
        page.gotos.push(url.to_string());
        page.url = url.to_string();
        let ops = page.goto_effects.get(url).cloned().unwrap_or_default();
        page.apply(ops);
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.page.lock().await.url.clone())
    }

    async fn is_visible(&mut self, selector: &str) -> BrowserResult<bool> {
        let mut page = self.page.lock().await;
        page.visibility_queries.push(selector.to_string());
        Ok(page.visible.contains(selector))
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        let mut page = self.page.lock().await;
        page.clicks.push(selector.to_string());
        if !page.visible.contains(selector) {
            return Ok(false);
        }
        let ops = page.click_effects.get(selector).cloned().unwrap_or_default();
        page.apply(ops);
        Ok(true)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        let mut page = self.page.lock().await;
        if !page.visible.contains(selector) {
            return Ok(false);
        }
        page.values.insert(selector.to_string(), value.to_string());
        Ok(true)
    }

    async fn type_text(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        let mut page = self.page.lock().await;
        if !page.visible.contains(selector) {
            return Ok(false);
        }
        page.typed.push((selector.to_string(), value.to_string()));
        page.values
            .entry(selector.to_string())
            .or_default()
            .push_str(value);
        Ok(true)
    }

    async fn press_enter(&mut self, selector: &str) -> BrowserResult<bool> {
        let mut page = self.page.lock().await;
        if !page.visible.contains(selector) {
            return Ok(false);
        }
        if page.enter_commits.contains(selector) {
            if let Some(value) = page.values.remove(selector) {
                if !value.is_empty() {
                    page.texts.push(value);
                }
            }
        }
        Ok(true)
    }

    async fn input_value(&mut self, selector: &str) -> BrowserResult<Option<String>> {
        Ok(self.page.lock().await.values.get(selector).cloned())
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> BrowserResult<Option<String>> {
        Ok(self
            .page
            .lock()
            .await
            .attributes
            .get(&(selector.to_string(), name.to_string()))
            .cloned())
    }

    async fn has_text(&mut self, needle: &str) -> BrowserResult<bool> {
        Ok(self
            .page
            .lock()
            .await
            .texts
            .iter()
            .any(|text| text.contains(needle)))
    }

    async fn upload_file(&mut self, selector: &str, path: &Path) -> BrowserResult<()> {
        let mut page = self.page.lock().await;
        if !page.visible.contains(selector) {
            return Err(BrowserError::Script(format!(
                "file input not found: {selector}"
            )));
        }
        page.uploads.push(path.to_path_buf());
        Ok(())
    }

    async fn list_actions(&mut self, scope: Option<&str>) -> BrowserResult<Vec<ActionControl>> {
        let page = self.page.lock().await;
        if scope == Some(platform::DIALOG) {
            Ok(page.dialog_actions.clone())
        } else {
            Ok(page.actions.clone())
        }
    }

    async fn click_action(&mut self, token: u32) -> BrowserResult<()> {
        let mut page = self.page.lock().await;
        let label = page
            .actions
            .iter()
            .chain(page.dialog_actions.iter())
            .find(|action| action.token == token)
            .map(|action| action.label.clone());
        match label {
            Some(label) => {
                page.clicked_actions.push(label.clone());
                let ops = page.action_effects.get(&label).cloned().unwrap_or_default();
                page.apply(ops);
                Ok(())
            }
            None => Err(BrowserError::Script(format!("unknown action token {token}"))),
        }
    }

    async fn scroll_within(&mut self, _selector: &str, _delta_y: f64) -> BrowserResult<bool> {
        Ok(true)
    }

    async fn install_cookies(&mut self, cookies: &[StoredCookie]) -> BrowserResult<()> {
        self.page
            .lock()
            .await
            .installed_cookies
            .extend_from_slice(cookies);
        Ok(())
    }

    async fn read_cookies(&mut self) -> BrowserResult<Vec<StoredCookie>> {
        Ok(self.page.lock().await.jar.clone())
    }

    async fn settle(&mut self, _range_ms: (u64, u64)) -> BrowserResult<()> {
        Ok(())
    }

    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        Ok(b"png".to_vec())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        self.page.lock().await.closed_sessions += 1;
        Ok(())
    }
}

struct FakeFactory {
    page: Arc<Mutex<FakePage>>,
    created: AtomicUsize,
}

impl FakeFactory {
    fn new(page: Arc<Mutex<FakePage>>) -> Self {
        Self {
            page,
            created: AtomicUsize::new(0),
        }
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait(?Send)]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> BrowserResult<Box<dyn PinSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: Arc::clone(&self.page),
        }))
    }
}

fn sel(locator: &FieldLocator, index: usize) -> String {
    locator.probes()[index].selector.clone()
}

fn test_config(dir: &TempDir) -> PublisherConfig {
    let mut config = PublisherConfig {
        waits: WaitSection {
            poll_interval_ms: 10,
            field_timeout_seconds: 1,
            login_timeout_seconds: 1,
            upload_settle_seconds: 0,
            suggestion_timeout_ms: 50,
            chip_timeout_ms: 50,
            schedule_verify_seconds: 2,
            immediate_verify_seconds: 2,
            overall_timeout_seconds: 60,
            settle_range_ms: [0, 0],
        },
        ..PublisherConfig::default()
    };
    config.account.email = Some("pins@example.com".to_string());
    config.account.password = Some("hunter2".to_string());
    config.account.session_state_path = dir
        .path()
        .join("session.json")
        .to_string_lossy()
        .into_owned();
    config.asset.max_retries = 2;
    config.asset.retry_delay_seconds = 0;
    config
}

fn media_fixture(dir: &TempDir) -> String {
    let path = dir.path().join("media.png");
    std::fs::write(&path, PNG_BYTES).unwrap();
    Url::from_file_path(&path).unwrap().to_string()
}

fn sample_cookie() -> StoredCookie {
    StoredCookie {
        name: "_session".to_string(),
        value: "abc123".to_string(),
        domain: ".pinterest.com".to_string(),
        path: "/".to_string(),
        expires: Some(1_990_000_000.0),
        http_only: true,
        secure: true,
        same_site: Some("Lax".to_string()),
    }
}

/// Visible login form plus a submit that reveals the profile chrome.
fn wire_login(page: &mut FakePage) {
    let email = sel(&platform::email_field(), 0);
    let password = sel(&platform::password_field(), 0);
    let submit = sel(&platform::login_submit(), 0);
    page.goto_effects.insert(
        platform::LOGIN_URL.to_string(),
        vec![
            PageOp::Show(email),
            PageOp::Show(password),
            PageOp::Show(submit.clone()),
        ],
    );
    page.click_effects.insert(
        submit,
        vec![
            PageOp::Show(platform::AUTH_MARKER.to_string()),
            PageOp::SetUrl(platform::HOME_URL.to_string()),
        ],
    );
}

/// Creation form with every metadata field present.
fn wire_builder(page: &mut FakePage) {
    page.goto_effects.insert(
        platform::BUILDER_URL.to_string(),
        vec![
            PageOp::Show(platform::BUILDER_MARKER.to_string()),
            PageOp::Show(platform::FILE_INPUT.to_string()),
            PageOp::Show(sel(&platform::title_field(), 0)),
            PageOp::Show(sel(&platform::description_field(), 0)),
            PageOp::Show(sel(&platform::link_field(), 0)),
            PageOp::Show(sel(&platform::tag_field(), 0)),
        ],
    );
}

/// Schedule toggle revealing date and time inputs; the date input
/// advertises a month-first placeholder, the time input opens a
/// dropdown holding the 10:30 AM slot.
fn wire_scheduling(page: &mut FakePage) {
    let toggle = sel(&platform::schedule_toggle(), 0);
    let date = sel(&platform::date_field(), 0);
    let time = sel(&platform::time_field(), 0);
    page.show(toggle.clone());
    page.click_effects.insert(
        toggle,
        vec![PageOp::Show(date.clone()), PageOp::Show(time.clone())],
    );
    page.attributes.insert(
        (date.clone(), "placeholder".to_string()),
        "mm/dd/yyyy".to_string(),
    );
    let option = sel(&platform::time_option("10:30 AM"), 0);
    page.click_effects.insert(
        time,
        vec![
            PageOp::Show(platform::TIME_LISTBOX.to_string()),
            PageOp::Show(option),
        ],
    );
}

fn scheduled_request(dir: &TempDir) -> PublishRequest {
    let mut request = PublishRequest::new(media_fixture(dir), "Cozy reading corner makeover guide");
    request.description = "Warm light and a good chair.".to_string();
    request.schedule = Some(ScheduleSpec::parse("2099-06-15", "10:30 AM").unwrap());
    request
}

fn publisher_with(dir: &TempDir, page: Arc<Mutex<FakePage>>) -> (PinPublisher, Arc<FakeFactory>) {
    let factory = Arc::new(FakeFactory::new(page));
    let publisher = PinPublisher::with_sessions(
        Arc::new(test_config(dir)),
        Arc::clone(&factory) as Arc<dyn SessionFactory>,
    )
    .unwrap();
    (publisher, factory)
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_publish_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        wire_login(&mut page);
        wire_builder(&mut page);
        wire_scheduling(&mut page);
        page.jar = vec![sample_cookie()];
        page.actions = vec![
            ActionControl {
                token: 0,
                label: "Cancel".to_string(),
            },
            ActionControl {
                token: 1,
                label: "Schedule".to_string(),
            },
        ];
        page.action_effects.insert(
            "Schedule".to_string(),
            vec![PageOp::AddText("Scheduled for Jun 15, 2099".to_string())],
        );
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(scheduled_request(&dir)).await;

    assert!(report.succeeded(), "report failed: {:?}", report.error);
    assert_eq!(report.status, PublishStatus::Scheduled);
    assert_eq!(report.verification, VerificationLevel::Direct);
    assert_eq!(report.dispatched_action.as_deref(), Some("Schedule"));
    assert_eq!(
        report.scheduled_for.map(|at| at.to_string()),
        Some("2099-06-15 10:30:00".to_string())
    );
    assert!(report.remote_url.is_none());

    let page = page.lock().await;
    assert_eq!(page.uploads.len(), 1);
    assert_eq!(
        page.values.get(&sel(&platform::date_field(), 0)).unwrap(),
        "06/15/2099"
    );
    assert!(page.clicked_actions.contains(&"Schedule".to_string()));
    assert_eq!(page.closed_sessions, 1);
    assert!(dir.path().join("session.json").exists(), "cookies not saved");
}

#[tokio::test(start_paused = true)]
async fn test_immediate_publish_returns_remote_url() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        page.jar = vec![sample_cookie()];
        page.enter_commits.insert(sel(&platform::tag_field(), 0));
        page.show(platform::TAG_SUGGESTIONS);
        page.actions = vec![ActionControl {
            token: 0,
            label: "Save".to_string(),
        }];
        page.action_effects.insert(
            "Save".to_string(),
            vec![
                PageOp::AddText("Saved to Your board".to_string()),
                PageOp::SetUrl("https://www.pinterest.com/pin/987654/".to_string()),
            ],
        );
    }

    let mut request = PublishRequest::new(media_fixture(&dir), "Autumn porch ideas");
    request.link = Some("https://blog.example.com/autumn".to_string());
    request.tags = vec!["cozy, fall decor".to_string()];

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(request).await;

    assert!(report.succeeded(), "report failed: {:?}", report.error);
    assert_eq!(report.status, PublishStatus::Published);
    assert_eq!(report.verification, VerificationLevel::Direct);
    assert_eq!(
        report.remote_url.as_deref(),
        Some("https://www.pinterest.com/pin/987654/")
    );
    assert!(report.scheduled_for.is_none());

    let page = page.lock().await;
    // Both comma-separated tags were committed as chips.
    assert!(page.texts.iter().any(|text| text == "cozy"));
    assert!(page.texts.iter().any(|text| text == "fall decor"));
    // No credential login happened: the saved marker was accepted.
    assert!(page.gotos.iter().all(|url| url != platform::LOGIN_URL));
    assert!(page.typed.iter().all(|(sel, _)| !sel.contains("password")));
}

#[tokio::test(start_paused = true)]
async fn test_missing_schedule_ui_fails_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        // No toggle, no labelled fallback: only an immediate control.
        page.actions = vec![ActionControl {
            token: 0,
            label: "Save".to_string(),
        }];
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(scheduled_request(&dir)).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed_phase, Some(PublishPhase::Scheduling));
    let error = report.error.unwrap();
    assert!(error.contains("publish-later"), "unexpected error: {error}");

    let page = page.lock().await;
    assert!(
        page.clicked_actions.is_empty(),
        "no control may be clicked once scheduling activation fails"
    );
    assert_eq!(page.closed_sessions, 1, "browser must be torn down on failure");
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_mode_never_clicks_an_immediate_control() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        wire_scheduling(&mut page);
        // The only resolvable control mixes both verbs.
        page.actions = vec![ActionControl {
            token: 0,
            label: "Schedule & Publish now".to_string(),
        }];
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(scheduled_request(&dir)).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed_phase, Some(PublishPhase::Dispatching));
    let error = report.error.unwrap();
    assert!(
        error.contains("Schedule & Publish now"),
        "abort should name the label: {error}"
    );
    assert!(page.lock().await.clicked_actions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_controls_fail_at_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        // Nothing on the form reads as a publish verb.
        page.actions = vec![
            ActionControl {
                token: 0,
                label: "Cancel".to_string(),
            },
            ActionControl {
                token: 1,
                label: "Back".to_string(),
            },
        ];
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let request = PublishRequest::new(media_fixture(&dir), "Entryway bench ideas");
    let report = publisher.publish(request).await;

    assert!(!report.succeeded());
    assert_eq!(report.status, PublishStatus::Failed);
    assert_eq!(report.failed_phase, Some(PublishPhase::Dispatching));
    let error = report.error.unwrap();
    assert!(
        error.contains("no publish control matched"),
        "unexpected error: {error}"
    );

    let page = page.lock().await;
    assert!(page.clicked_actions.is_empty());
    assert_eq!(page.closed_sessions, 1, "browser must be torn down on failure");
}

#[tokio::test(start_paused = true)]
async fn test_dialog_confirmation_still_counts_as_direct() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        page.actions = vec![ActionControl {
            token: 0,
            label: "Save".to_string(),
        }];
        page.action_effects.insert(
            "Save".to_string(),
            vec![PageOp::Show(platform::DIALOG.to_string())],
        );
        page.dialog_actions = vec![ActionControl {
            token: 10,
            label: "Publish".to_string(),
        }];
        page.action_effects.insert(
            "Publish".to_string(),
            vec![
                PageOp::AddText("Saved to Your board".to_string()),
                PageOp::Hide(platform::DIALOG.to_string()),
            ],
        );
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let request = PublishRequest::new(media_fixture(&dir), "Window seat nook");
    let report = publisher.publish(request).await;

    assert!(report.succeeded(), "report failed: {:?}", report.error);
    assert_eq!(report.verification, VerificationLevel::Direct);
    let page = page.lock().await;
    assert_eq!(page.clicked_actions, vec!["Save", "Publish"]);
}

#[tokio::test(start_paused = true)]
async fn test_draft_absence_reports_weak_success() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        wire_scheduling(&mut page);
        // Dispatch works but the page never shows confirmation text.
        page.actions = vec![ActionControl {
            token: 1,
            label: "Schedule".to_string(),
        }];
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(scheduled_request(&dir)).await;

    assert!(report.succeeded());
    assert_eq!(report.status, PublishStatus::Scheduled);
    assert_eq!(report.verification, VerificationLevel::DraftGone);
    // The fallback re-opened the creation view.
    let page = page.lock().await;
    assert!(
        page.gotos
            .iter()
            .filter(|url| url.as_str() == platform::BUILDER_URL)
            .count()
            >= 2
    );
}

#[tokio::test(start_paused = true)]
async fn test_surviving_draft_fails_the_publish() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        wire_scheduling(&mut page);
        page.actions = vec![ActionControl {
            token: 1,
            label: "Schedule".to_string(),
        }];
        // Clicking leaves a draft row carrying the submitted title.
        page.action_effects.insert(
            "Schedule".to_string(),
            vec![PageOp::AddAction(
                7,
                "Cozy reading corner makeover guide".to_string(),
            )],
        );
    }

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(scheduled_request(&dir)).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed_phase, Some(PublishPhase::Verifying));
    assert!(report.error.unwrap().to_lowercase().contains("draft"));
}

#[tokio::test(start_paused = true)]
async fn test_precancelled_token_stops_before_staging() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    let (publisher, factory) = publisher_with(&dir, Arc::clone(&page));

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = publisher
        .publish_with_cancel(scheduled_request(&dir), cancel)
        .await;

    assert!(!report.succeeded());
    assert!(report.error.unwrap().to_lowercase().contains("cancelled"));
    assert_eq!(factory.created(), 0, "no browser may launch after cancel");
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_media_fails_without_a_browser() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    let (publisher, factory) = publisher_with(&dir, Arc::clone(&page));

    // Nothing listens on port 1; the fetch fails on every attempt.
    let request = PublishRequest::new("http://127.0.0.1:1/pin.png", "Unreachable media");
    let report = publisher.publish(request).await;

    assert!(!report.succeeded());
    assert_eq!(report.failed_phase, Some(PublishPhase::Staging));
    assert!(report.error.unwrap().contains("2 attempts"));
    assert_eq!(factory.created(), 0);
    assert_eq!(page.lock().await.gotos.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_saved_session_skips_login_across_publishes() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        wire_builder(&mut page);
        page.jar = vec![sample_cookie()];
        page.actions = vec![ActionControl {
            token: 0,
            label: "Save".to_string(),
        }];
        page.action_effects.insert(
            "Save".to_string(),
            vec![PageOp::AddText("Saved to Your board".to_string())],
        );
    }

    let (publisher, factory) = publisher_with(&dir, Arc::clone(&page));
    let first = publisher
        .publish(PublishRequest::new(media_fixture(&dir), "First pin"))
        .await;
    let second = publisher
        .publish(PublishRequest::new(media_fixture(&dir), "Second pin"))
        .await;

    assert!(first.succeeded());
    assert!(second.succeeded());
    assert_eq!(factory.created(), 2, "each publish gets its own session");

    let page = page.lock().await;
    assert!(page.gotos.iter().all(|url| url != platform::LOGIN_URL));
    assert!(page.typed.is_empty(), "no credentials were ever typed");
    // The second run installed the cookies snapshotted by the first.
    assert!(!page.installed_cookies.is_empty());
    assert_eq!(page.closed_sessions, 2);
}

#[tokio::test(start_paused = true)]
async fn test_field_failures_downgrade_to_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(Mutex::new(FakePage::default()));
    {
        let mut page = page.lock().await;
        page.show(platform::AUTH_MARKER);
        // Builder renders, but none of the metadata fields do.
        page.goto_effects.insert(
            platform::BUILDER_URL.to_string(),
            vec![
                PageOp::Show(platform::BUILDER_MARKER.to_string()),
                PageOp::Show(platform::FILE_INPUT.to_string()),
            ],
        );
        page.actions = vec![ActionControl {
            token: 0,
            label: "Save".to_string(),
        }];
        page.action_effects.insert(
            "Save".to_string(),
            vec![PageOp::AddText("Saved to Your board".to_string())],
        );
    }

    let mut request = PublishRequest::new(media_fixture(&dir), "Minimal shelf styling");
    request.description = "Less, but better.".to_string();
    request.link = Some("https://blog.example.com/shelves".to_string());

    let (publisher, _factory) = publisher_with(&dir, Arc::clone(&page));
    let report = publisher.publish(request).await;

    assert!(report.succeeded(), "metadata misses must not fail a publish");
    assert_eq!(report.status, PublishStatus::Published);
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("title field not found")));
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("description field not found")));
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("link field not found")));
}

#[tokio::test(start_paused = true)]
async fn test_locator_stops_probing_after_first_match() {
    let page = Arc::new(Mutex::new(FakePage::default()));
    let locator = FieldLocator::new(
        "title",
        vec![
            Probe::new("by-test-id", "div[data-test-id='pin-title'] input"),
            Probe::new("by-placeholder", "input[placeholder='Add your title']"),
            Probe::new("by-aria", "[aria-label='Title'] input"),
        ],
    );
    page.lock().await.show(sel(&locator, 0));
    let mut session = FakeSession {
        page: Arc::clone(&page),
    };

    let matched = locator.first_visible(&mut session).await.unwrap().unwrap();
    assert_eq!(matched.name, "by-test-id");
    assert_eq!(
        page.lock().await.visibility_queries,
        vec![sel(&locator, 0)],
        "later probes must not be evaluated once one matches"
    );

    page.lock().await.visibility_queries.clear();
    let matched = locator
        .wait_visible(
            &mut session,
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(matched.name, "by-test-id");
    assert_eq!(page.lock().await.visibility_queries, vec![sel(&locator, 0)]);
}
