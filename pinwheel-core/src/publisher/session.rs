use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::{
    GetDocumentParams, QuerySelectorParams, SetFileInputFilesParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite};
use chromiumoxide::page::ScreenshotParams;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::browser::{
    BrowserAutomation, BrowserContext, BrowserError, BrowserLauncher, BrowserResult,
};

/// One clickable control on the page, tagged during enumeration so it
/// can be clicked later without re-matching its text.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionControl {
    pub token: u32,
    pub label: String,
}

/// Cookie snapshot persisted in the session blob. `expires` is kept for
/// bookkeeping; installation relies on the platform re-issuing session
/// cookies when stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

/// Everything the publishing flow needs from a live page. The
/// production implementation drives CDP; tests script this trait.
#[async_trait(?Send)]
pub trait PinSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()>;
    async fn current_url(&mut self) -> BrowserResult<String>;
    async fn is_visible(&mut self, selector: &str) -> BrowserResult<bool>;
    async fn click(&mut self, selector: &str) -> BrowserResult<bool>;
    /// Sets the value directly and dispatches input/change so reactive
    /// frameworks observe the edit. Returns false when nothing matched.
    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool>;
    /// Character-by-character entry with a typing cadence, for inputs
    /// that only react to real keystrokes.
    async fn type_text(&mut self, selector: &str, value: &str) -> BrowserResult<bool>;
    async fn press_enter(&mut self, selector: &str) -> BrowserResult<bool>;
    async fn input_value(&mut self, selector: &str) -> BrowserResult<Option<String>>;
    async fn attribute(&mut self, selector: &str, name: &str) -> BrowserResult<Option<String>>;
    async fn has_text(&mut self, needle: &str) -> BrowserResult<bool>;
    async fn upload_file(&mut self, selector: &str, path: &Path) -> BrowserResult<()>;
    /// Enumerates visible clickable controls, optionally scoped to a
    /// container selector.
    async fn list_actions(&mut self, scope: Option<&str>) -> BrowserResult<Vec<ActionControl>>;
    async fn click_action(&mut self, token: u32) -> BrowserResult<()>;
    async fn scroll_within(&mut self, selector: &str, delta_y: f64) -> BrowserResult<bool>;
    async fn install_cookies(&mut self, cookies: &[StoredCookie]) -> BrowserResult<()>;
    async fn read_cookies(&mut self) -> BrowserResult<Vec<StoredCookie>>;
    async fn settle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()>;
    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>>;
    async fn close(&mut self) -> BrowserResult<()>;
}

#[async_trait(?Send)]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> BrowserResult<Box<dyn PinSession>>;
}

pub struct BrowserSessionFactory {
    launcher: BrowserLauncher,
}

impl BrowserSessionFactory {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait(?Send)]
impl SessionFactory for BrowserSessionFactory {
    async fn create(&self) -> BrowserResult<Box<dyn PinSession>> {
        let automation = self.launcher.launch().await?;
        let context = automation.new_context().await?;
        Ok(Box::new(CdpSession {
            automation: Some(automation),
            context,
        }))
    }
}

/// Production session over one Chromium instance. Owns the browser so
/// `close` tears the whole instance down, not just the page.
pub struct CdpSession {
    automation: Option<BrowserAutomation>,
    context: BrowserContext,
}

#[derive(Debug, Deserialize)]
struct RawAction {
    index: u32,
    text: String,
}

impl CdpSession {
    pub fn new(automation: BrowserAutomation, context: BrowserContext) -> Self {
        Self {
            automation: Some(automation),
            context,
        }
    }

    async fn eval_bool(&self, script: String) -> BrowserResult<bool> {
        self.context
            .page()
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("boolean payload: {err}")))
    }

    async fn eval_opt_string(&self, script: String) -> BrowserResult<Option<String>> {
        self.context
            .page()
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("string payload: {err}")))
    }
}

#[async_trait(?Send)]
impl PinSession for CdpSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        self.context.goto(url).await
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.context.page().url().await?.unwrap_or_default())
    }

    async fn is_visible(&mut self, selector: &str) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ return false; }}
    if (!el) return false;
    const rect = el.getBoundingClientRect();
    if (!rect || rect.width < 2 || rect.height < 2) return false;
    const style = window.getComputedStyle(el);
    return style.visibility !== 'hidden' && style.display !== 'none';
}})()"#,
            sel = js_string(selector)
        );
        self.eval_bool(script).await
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<bool> {
        match self.context.page().find_element(selector).await {
            Ok(element) => {
                element.click().await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ return false; }}
    if (!el) return false;
    if (typeof el.focus === 'function') el.focus();
    if ('value' in el) {{
        el.value = {value};
    }} else {{
        el.textContent = {value};
    }}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
            sel = js_string(selector),
            value = js_string(value)
        );
        self.eval_bool(script).await
    }

    async fn type_text(&mut self, selector: &str, value: &str) -> BrowserResult<bool> {
        let element = match self.context.page().find_element(selector).await {
            Ok(element) => element,
            Err(_) => return Ok(false),
        };
        element.click().await?;
        let mut rng = rand::thread_rng();
        for ch in value.chars() {
            element.type_str(ch.to_string()).await?;
            let cadence = rng.gen_range(35..=110);
            sleep(Duration::from_millis(cadence)).await;
        }
        Ok(true)
    }

    async fn press_enter(&mut self, selector: &str) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ return false; }}
    if (!el) return false;
    const init = {{ key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true }};
    el.dispatchEvent(new KeyboardEvent('keydown', init));
    el.dispatchEvent(new KeyboardEvent('keyup', init));
    return true;
}})()"#,
            sel = js_string(selector)
        );
        self.eval_bool(script).await
    }

    async fn input_value(&mut self, selector: &str) -> BrowserResult<Option<String>> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ return null; }}
    if (!el) return null;
    if ('value' in el && el.value !== undefined) return String(el.value);
    return (el.innerText || el.textContent || '').trim();
}})()"#,
            sel = js_string(selector)
        );
        self.eval_opt_string(script).await
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> BrowserResult<Option<String>> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ return null; }}
    if (!el) return null;
    return el.getAttribute({name});
}})()"#,
            sel = js_string(selector),
            name = js_string(name)
        );
        self.eval_opt_string(script).await
    }

    async fn has_text(&mut self, needle: &str) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    const text = (document.body && document.body.innerText) ? document.body.innerText : '';
    return text.includes({needle});
}})()"#,
            needle = js_string(needle)
        );
        self.eval_bool(script).await
    }

    async fn upload_file(&mut self, selector: &str, path: &Path) -> BrowserResult<()> {
        // Some builders keep the input hidden; make it addressable first.
        let reveal = format!(
            r#"(() => {{
    const nodes = document.querySelectorAll({sel});
    nodes.forEach((input) => {{
        if (input && input.style) {{
            input.style.display = 'block';
            input.style.opacity = '1';
            input.style.visibility = 'visible';
        }}
    }});
    return nodes.length;
}})()"#,
            sel = js_string(selector)
        );
        let _ = self.context.page().evaluate(reveal).await;

        let doc = self
            .context
            .page()
            .execute(GetDocumentParams::builder().depth(0).build())
            .await?;
        let root_node_id = doc.result.root.node_id;

        let query = QuerySelectorParams::new(root_node_id, selector);
        let query_result = self.context.page().execute(query).await?;
        let node_id = query_result.result.node_id;
        if *node_id.inner() <= 0 {
            return Err(BrowserError::Script(format!(
                "file input not found: {selector}"
            )));
        }

        let file = path.to_string_lossy().to_string();
        let mut set_files = SetFileInputFilesParams::new(vec![file]);
        set_files.node_id = Some(node_id);
        self.context.page().execute(set_files).await?;
        Ok(())
    }

    async fn list_actions(&mut self, scope: Option<&str>) -> BrowserResult<Vec<ActionControl>> {
        let scope_js = match scope {
            Some(selector) => js_string(selector),
            None => "null".to_string(),
        };
        let script = format!(
            r#"(() => {{
    document.querySelectorAll('[data-pinwheel-action]').forEach((node) => {{
        node.removeAttribute('data-pinwheel-action');
    }});
    const scopeSel = {scope};
    let root = document;
    if (scopeSel) {{
        try {{ root = document.querySelector(scopeSel); }} catch (_) {{ root = null; }}
        if (!root) return [];
    }}
    const results = [];
    let idx = 0;
    root.querySelectorAll('button, [role="button"]').forEach((node) => {{
        const rect = node.getBoundingClientRect();
        if (!rect || rect.width < 4 || rect.height < 4) return;
        const text = (node.innerText || node.textContent || '').trim();
        if (!text) return;
        node.setAttribute('data-pinwheel-action', String(idx));
        results.push({{ index: idx, text }});
        idx += 1;
    }});
    return results;
}})()"#,
            scope = scope_js
        );
        let value = self
            .context
            .page()
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("action list payload: {err}")))?;
        let raw: Vec<RawAction> = serde_json::from_value(value)
            .map_err(|err| BrowserError::Script(format!("action list decode: {err}")))?;
        Ok(raw
            .into_iter()
            .map(|action| ActionControl {
                token: action.index,
                label: action.text,
            })
            .collect())
    }

    async fn click_action(&mut self, token: u32) -> BrowserResult<()> {
        let selector = format!("[data-pinwheel-action='{token}']");
        let element = self
            .context
            .page()
            .find_element(selector.as_str())
            .await
            .map_err(|err| BrowserError::Script(format!("action token {token} stale: {err}")))?;
        element.click().await?;
        Ok(())
    }

    async fn scroll_within(&mut self, selector: &str, delta_y: f64) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    let el = null;
    try {{ el = document.querySelector({sel}); }} catch (_) {{ el = null; }}
    if (el) {{
        el.scrollTop += {delta};
        return true;
    }}
    window.scrollBy({{ top: {delta}, behavior: 'smooth' }});
    return false;
}})()"#,
            sel = js_string(selector),
            delta = delta_y
        );
        self.eval_bool(script).await
    }

    async fn install_cookies(&mut self, cookies: &[StoredCookie]) -> BrowserResult<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            if let Some(same_site) = cookie.same_site.as_deref().and_then(parse_same_site) {
                builder = builder.same_site(same_site);
            }
            params.push(builder.build().map_err(BrowserError::Configuration)?);
        }
        self.context.page().set_cookies(params).await?;
        Ok(())
    }

    async fn read_cookies(&mut self) -> BrowserResult<Vec<StoredCookie>> {
        let cookies = self.context.page().get_cookies().await?;
        Ok(cookies
            .iter()
            .map(|cookie| StoredCookie {
                name: cookie.name.clone(),
                value: cookie.value.clone(),
                domain: cookie.domain.clone(),
                path: cookie.path.clone(),
                expires: cookie_expiry(cookie.expires),
                http_only: cookie.http_only,
                secure: cookie.secure,
                same_site: cookie.same_site.as_ref().map(same_site_label),
            })
            .collect())
    }

    async fn settle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()> {
        if range_ms.0 == 0 && range_ms.1 == 0 {
            return Ok(());
        }
        let lower = range_ms.0.min(range_ms.1);
        let upper = range_ms.0.max(range_ms.1);
        let millis = rand::thread_rng().gen_range(lower..=upper);
        sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        let params = ScreenshotParams::builder().build();
        Ok(self.context.page().screenshot(params).await?)
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if let Some(automation) = self.automation.take() {
            automation.shutdown().await?;
        }
        Ok(())
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

// -1 marks a session cookie in the CDP payload.
fn cookie_expiry(stamp: f64) -> Option<f64> {
    Some(stamp).filter(|stamp| *stamp >= 0.0)
}

fn parse_same_site(label: &str) -> Option<CookieSameSite> {
    match label {
        "Strict" => Some(CookieSameSite::Strict),
        "Lax" => Some(CookieSameSite::Lax),
        "None" => Some(CookieSameSite::None),
        _ => None,
    }
}

fn same_site_label(same_site: &CookieSameSite) -> String {
    match same_site {
        CookieSameSite::Strict => "Strict".to_string(),
        CookieSameSite::Lax => "Lax".to_string(),
        CookieSameSite::None => "None".to_string(),
    }
}
