use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::browser::BrowserResult;
use crate::publisher::session::PinSession;

/// One candidate selector for a field, named after the page structure
/// it expects so log lines say which variant matched.
#[derive(Debug, Clone)]
pub struct Probe {
    pub name: &'static str,
    pub selector: String,
}

impl Probe {
    pub fn new(name: &'static str, selector: impl Into<String>) -> Self {
        Self {
            name,
            selector: selector.into(),
        }
    }
}

/// Ordered probe chain for one logical field. Probes are tried most
/// specific first; the first visible match wins and later probes are
/// never evaluated.
#[derive(Debug, Clone)]
pub struct FieldLocator {
    pub field: &'static str,
    probes: Vec<Probe>,
}

impl FieldLocator {
    pub fn new(field: &'static str, probes: Vec<Probe>) -> Self {
        Self { field, probes }
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Single pass over the chain, returning the first probe whose
    /// selector is currently visible.
    pub async fn first_visible(
        &self,
        session: &mut dyn PinSession,
    ) -> BrowserResult<Option<&Probe>> {
        for probe in &self.probes {
            if session.is_visible(&probe.selector).await? {
                return Ok(Some(probe));
            }
        }
        Ok(None)
    }

    /// Polls the chain until a probe becomes visible or the deadline
    /// passes. The whole chain is re-walked each tick so an earlier,
    /// more specific probe can still win once it renders.
    pub async fn wait_visible(
        &self,
        session: &mut dyn PinSession,
        timeout: Duration,
        interval: Duration,
    ) -> BrowserResult<Option<&Probe>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(probe) = self.first_visible(session).await? {
                return Ok(Some(probe));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(interval).await;
        }
    }
}

/// Escapes a value for embedding inside a double-quoted CSS attribute
/// selector.
pub fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_escaping_handles_quotes_and_backslashes() {
        assert_eq!(escape_attr_value("plain"), "plain");
        assert_eq!(escape_attr_value(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_attr_value(r"a\b"), r"a\\b");
    }

    #[test]
    fn probe_chain_preserves_declaration_order() {
        let locator = FieldLocator::new(
            "title",
            vec![
                Probe::new("by-id", "input#title"),
                Probe::new("by-aria", "[aria-label='Title']"),
            ],
        );
        let names: Vec<&str> = locator.probes().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["by-id", "by-aria"]);
    }
}
