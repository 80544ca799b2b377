//! Balance adapter for the puzzle web page
//!
//! Every action is a short script evaluated in the page. Scripts answer with
//! `{"ok": true, "value": ...}` or `{"ok": false, "error": "..."}` so a missing
//! element surfaces as an adapter error instead of a silent no-op.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::balance::{BalanceAdapter, Side};
use crate::{BarId, SolverError};

const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(30);

const RESET_BUTTON: &str = "button#reset";
const WEIGH_BUTTON: &str = "button#weigh";
const RESULT_ITEMS: &str = "div.game-info ol li";
const LAST_RESULT: &str = "div.game-info ol li:last-child";

fn slot_selector(side: Side, slot: usize) -> String {
    format!(r#"input[data-side="{side}"][data-index="{slot}"]"#)
}

fn coin_selector(bar: BarId) -> String {
    format!("button#coin_{bar}")
}

/// Click `el` with `window.alert` swapped out; the script returns the alert
/// text, or `''` when the page raised none. A real alert would block the tab.
const CLICK_CAPTURING_ALERT: &str = "let message = ''; \
    const original = window.alert; \
    window.alert = (m) => { message = String(m); }; \
    try { el.click(); } finally { window.alert = original; } \
    return message;";

/// Something that can run JavaScript in the page and return its result
#[async_trait::async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run_script(&self, code: &str, timeout: Duration) -> Result<String, SolverError>;
}

#[async_trait::async_trait]
impl<T: ScriptRunner + ?Sized> ScriptRunner for Arc<T> {
    async fn run_script(&self, code: &str, timeout: Duration) -> Result<String, SolverError> {
        (**self).run_script(code, timeout).await
    }
}

#[derive(Debug, Deserialize)]
struct ScriptReply {
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    error: Option<String>,
}

/// Drives the real puzzle page through a [`ScriptRunner`]
pub struct BrowserBalance<R: ScriptRunner> {
    runner: R,
    eval_timeout: Duration,
}

impl<R: ScriptRunner> BrowserBalance<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
        }
    }

    pub fn with_eval_timeout(mut self, timeout: Duration) -> Self {
        self.eval_timeout = timeout;
        self
    }

    async fn eval(&self, code: String) -> Result<serde_json::Value, SolverError> {
        debug!(script_preview = %code.chars().take(160).collect::<String>(), "Evaluating page script");
        let raw = self.runner.run_script(&code, self.eval_timeout).await?;
        let reply: ScriptReply = serde_json::from_str(&raw).map_err(|e| {
            SolverError::Adapter(format!("unexpected script reply {raw:?}: {e}"))
        })?;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(SolverError::Adapter(
                reply.error.unwrap_or_else(|| "page script failed".into()),
            ))
        }
    }

    async fn click(&self, selector: &str) -> Result<(), SolverError> {
        self.eval(on_element(selector, "el.click(); return null;"))
            .await
            .map(|_| ())
    }

    async fn click_for_alert(&self, selector: &str) -> Result<String, SolverError> {
        match self.eval(on_element(selector, CLICK_CAPTURING_ALERT)).await? {
            serde_json::Value::String(alert) => Ok(alert),
            other => Err(SolverError::Adapter(format!(
                "captured alert was not a string: {other}"
            ))),
        }
    }
}

/// Wrap `body` so it runs with `el` bound to the element matching `selector`
fn on_element(selector: &str, body: &str) -> String {
    let literal = js_string(selector);
    format!(
        r#"(() => {{
  const el = document.querySelector({literal});
  if (!el) return JSON.stringify({{ ok: false, error: "No element matches " + {literal} }});
  const run = () => {{ {body} }};
  return JSON.stringify({{ ok: true, value: run() }});
}})()"#
    )
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

#[async_trait::async_trait]
impl<R: ScriptRunner> BalanceAdapter for BrowserBalance<R> {
    #[instrument(level = "debug", skip(self))]
    async fn reset_balance(&self) -> Result<(), SolverError> {
        self.click(RESET_BUTTON).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn place_on_pan(&self, side: Side, slot: usize, bar: BarId) -> Result<(), SolverError> {
        // React tracks the native value setter; assigning `el.value` alone is ignored.
        let body = format!(
            "const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set; \
             setter.call(el, {value}); \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             return null;",
            value = js_string(&bar.to_string())
        );
        self.eval(on_element(&slot_selector(side, slot), &body))
            .await
            .map(|_| ())
    }

    #[instrument(level = "debug", skip(self))]
    async fn trigger_weigh(&self) -> Result<(), SolverError> {
        // The page rejects bad pan contents with an alert instead of a result.
        let alert = self.click_for_alert(WEIGH_BUTTON).await?;
        if alert.is_empty() {
            Ok(())
        } else {
            warn!(alert = %alert, "Weighing rejected by the page");
            Err(SolverError::Adapter(alert))
        }
    }

    async fn latest_result_text(&self) -> Result<String, SolverError> {
        let literal = js_string(LAST_RESULT);
        let code = format!(
            "(() => {{ const el = document.querySelector({literal}); \
             return JSON.stringify({{ ok: true, value: el ? (el.textContent || '') : '' }}); }})()"
        );
        match self.eval(code).await? {
            serde_json::Value::String(text) => Ok(text),
            other => Err(SolverError::Adapter(format!(
                "result text was not a string: {other}"
            ))),
        }
    }

    async fn result_count(&self) -> Result<usize, SolverError> {
        let literal = js_string(RESULT_ITEMS);
        let code = format!(
            "(() => JSON.stringify({{ ok: true, value: document.querySelectorAll({literal}).length }}))()"
        );
        let value = self.eval(code).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| SolverError::Adapter(format!("result count was not a number: {value}")))
    }

    #[instrument(level = "debug", skip(self))]
    async fn click_accuse(&self, bar: BarId) -> Result<String, SolverError> {
        self.click_for_alert(&coin_selector(bar)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records scripts and answers from a queue
    struct ScriptedPage {
        seen: Mutex<Vec<String>>,
        replies: Mutex<Vec<String>>,
    }

    impl ScriptedPage {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ScriptRunner for ScriptedPage {
        async fn run_script(&self, code: &str, _timeout: Duration) -> Result<String, SolverError> {
            self.seen.lock().unwrap().push(code.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| SolverError::Adapter("no scripted reply".into()))
        }
    }

    #[tokio::test]
    async fn place_targets_slot_input() {
        let page = ScriptedPage::new(&[r#"{"ok":true,"value":null}"#]);
        let balance = BrowserBalance::new(page.clone());
        balance.place_on_pan(Side::Right, 3, 7).await.unwrap();
        let script = &page.seen()[0];
        assert!(script.contains(r#"input[data-side=\"right\"][data-index=\"3\"]"#));
        assert!(script.contains(r#"setter.call(el, "7")"#));
    }

    #[tokio::test]
    async fn reads_count_and_latest_text() {
        let page = ScriptedPage::new(&[
            r#"{"ok":true,"value":2}"#,
            r#"{"ok":true,"value":"[0,1] < [2,3]"}"#,
        ]);
        let balance = BrowserBalance::new(page.clone());
        assert_eq!(balance.result_count().await.unwrap(), 2);
        assert_eq!(balance.latest_result_text().await.unwrap(), "[0,1] < [2,3]");
        assert!(page.seen()[0].contains("div.game-info ol li"));
        assert!(page.seen()[1].contains("li:last-child"));
    }

    #[tokio::test]
    async fn missing_element_is_an_adapter_error() {
        let page = ScriptedPage::new(&[r#"{"ok":false,"error":"No element matches button#weigh"}"#]);
        let balance = BrowserBalance::new(page.clone());
        match balance.trigger_weigh().await {
            Err(SolverError::Adapter(msg)) => assert!(msg.contains("button#weigh")),
            other => panic!("Expected Adapter error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn accusation_returns_captured_alert() {
        let page = ScriptedPage::new(&[r#"{"ok":true,"value":"Yay! You find it!"}"#]);
        let balance = BrowserBalance::new(page.clone());
        assert_eq!(balance.click_accuse(5).await.unwrap(), "Yay! You find it!");
        assert!(page.seen()[0].contains("button#coin_5"));
        assert!(page.seen()[0].contains("window.alert"));
    }

    #[tokio::test]
    async fn weigh_captures_validation_alert() {
        let page = ScriptedPage::new(&[
            r#"{"ok":true,"value":""}"#,
            r#"{"ok":true,"value":"Inputs are invalid: Right side has duplicates"}"#,
        ]);
        let balance = BrowserBalance::new(page.clone());
        balance.trigger_weigh().await.unwrap();
        assert!(page.seen()[0].contains("button#weigh"));
        assert!(page.seen()[0].contains("window.alert = (m)"));

        assert_eq!(
            balance.trigger_weigh().await,
            Err(SolverError::Adapter(
                "Inputs are invalid: Right side has duplicates".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn non_json_reply_is_rejected() {
        let page = ScriptedPage::new(&["undefined"]);
        let balance = BrowserBalance::new(page.clone());
        assert!(matches!(
            balance.reset_balance().await,
            Err(SolverError::Adapter(_))
        ));
    }
}
