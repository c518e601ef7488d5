use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scout_logging::scout_debug;
use serde_json::{json, Value};

use super::client::CdpConnection;
use super::error::CdpError;
use super::protocol::Key;

const LOAD_POLL: Duration = Duration::from_millis(100);

/// A flattened session attached to a single page target.
pub struct PageSession {
    target_id: String,
    session_id: String,
    connection: Arc<CdpConnection>,
    load_timeout: Duration,
}

impl PageSession {
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        connection: Arc<CdpConnection>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            target_id,
            session_id,
            connection,
            load_timeout,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.connection
            .call(method, params, Some(&self.session_id))
            .await
    }

    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        self.call("DOM.enable", None).await?;
        scout_debug!("Enabled CDP domains for target {}", self.target_id);
        Ok(())
    }

    /// Evaluate an expression and return its value; promises are awaited.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }
        Ok(result["result"]["value"].clone())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({ "url": url })))
            .await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{url}: {error}")));
        }
        self.wait_for_load().await?;
        scout_debug!("Navigated to {}", url);
        Ok(())
    }

    /// Poll `document.readyState` until the page is interactive.
    pub async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = Instant::now();
        loop {
            // Evaluation fails briefly while a new document replaces the old one.
            if let Ok(state) = self.evaluate("document.readyState").await {
                if matches!(state.as_str(), Some("complete" | "interactive")) {
                    return Ok(());
                }
            }
            if start.elapsed() > self.load_timeout {
                return Err(CdpError::Timeout("page load".to_string()));
            }
            tokio::time::sleep(LOAD_POLL).await;
        }
    }

    pub async fn current_url(&self) -> Result<String, CdpError> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Viewport screenshot as base64 JPEG.
    pub async fn screenshot_jpeg(&self, quality: u8) -> Result<String, CdpError> {
        let result = self
            .call(
                "Page.captureScreenshot",
                Some(json!({ "format": "jpeg", "quality": quality })),
            )
            .await?;
        result["data"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CdpError::InvalidResponse("missing screenshot data".to_string()))
    }

    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    pub async fn press_key(&self, key: Key) -> Result<(), CdpError> {
        let mut down = json!({
            "type": "keyDown",
            "key": key.name(),
            "code": key.name(),
            "windowsVirtualKeyCode": key.virtual_key_code(),
        });
        if let Some(text) = key.text() {
            down["text"] = json!(text);
        }
        self.call("Input.dispatchKeyEvent", Some(down)).await?;
        self.call(
            "Input.dispatchKeyEvent",
            Some(json!({
                "type": "keyUp",
                "key": key.name(),
                "code": key.name(),
                "windowsVirtualKeyCode": key.virtual_key_code(),
            })),
        )
        .await?;
        Ok(())
    }

    /// Attach a local file to the first `<input type=file>` matching `selector`.
    pub async fn set_file_input(&self, selector: &str, path: &Path) -> Result<(), CdpError> {
        let document = self.call("DOM.getDocument", Some(json!({ "depth": 0 }))).await?;
        let root = document["root"]["nodeId"]
            .as_i64()
            .ok_or_else(|| CdpError::InvalidResponse("missing document node".to_string()))?;
        let found = self
            .call(
                "DOM.querySelector",
                Some(json!({ "nodeId": root, "selector": selector })),
            )
            .await?;
        let node_id = found["nodeId"].as_i64().unwrap_or(0);
        if node_id == 0 {
            return Err(CdpError::ElementNotFound(selector.to_string()));
        }
        self.call(
            "DOM.setFileInputFiles",
            Some(json!({
                "nodeId": node_id,
                "files": [path.to_string_lossy()],
            })),
        )
        .await?;
        Ok(())
    }
}
