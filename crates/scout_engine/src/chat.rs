use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use scout_logging::{scout_debug, scout_warn};
use tempfile::NamedTempFile;

use crate::browser::BrowserDriver;
use crate::cdp::{CdpError, Key};
use crate::clock::Clock;
use crate::completion::{ChatObservation, ChatSurface, CompletionDetector};
use crate::error::ScoutError;
use crate::tabs::TabManager;

/// A conversational assistant reachable through `ask`.
#[async_trait::async_trait]
pub trait ChatAssistant: Send + Sync {
    /// Start a fresh conversation so earlier rows do not leak into replies.
    async fn new_thread(&self) -> Result<(), ScoutError>;

    /// Send `prompt`, optionally with a base64 JPEG attached, and return the
    /// finished reply. Fails with `ResponseTimeout` when the reply never
    /// settles.
    async fn ask(&self, prompt: &str, image_jpeg_base64: Option<&str>)
        -> Result<String, ScoutError>;
}

const OBSERVE_SCRIPT: &str = r#"(() => {
    const sels = ["div[data-message-author-role='assistant']", "article[data-message-author-role='assistant']"];
    let count = 0, last = "";
    for (const sel of sels) {
        const nodes = document.querySelectorAll(sel);
        if (nodes.length) {
            const t = nodes[nodes.length - 1].innerText || "";
            if (t.length >= last.length) last = t;
            count = Math.max(count, nodes.length);
        }
    }
    const streaming = Array.from(document.querySelectorAll('button')).some(b => {
        const txt = (b.innerText || '').trim().toLowerCase();
        const aria = (b.getAttribute('aria-label') || '').trim().toLowerCase();
        return txt.includes('stop') || aria.includes('stop');
    });
    return {streaming, count, last};
})()"#;

const FOCUS_COMPOSER_SCRIPT: &str = r##"(() => {
    const sels = ["#prompt-textarea", "textarea[data-testid='prompt-textarea']",
        "div[contenteditable='true'][role='textbox']", "div[contenteditable='true']", "textarea"];
    for (const sel of sels) {
        const el = document.querySelector(sel);
        if (!el) continue;
        el.scrollIntoView({block: 'center'});
        el.focus();
        document.execCommand('selectAll', false, null);
        document.execCommand('delete', false, null);
        return true;
    }
    return false;
})()"##;

const CLICK_SEND_SCRIPT: &str = r#"(() => {
    const btn = document.querySelector("button[data-testid='send-button']")
        || Array.from(document.querySelectorAll('button')).find(b =>
            (b.getAttribute('aria-label') || '').toLowerCase().includes('send'));
    if (!btn || btn.disabled) return false;
    btn.click();
    return true;
})()"#;

const NEW_CHAT_SCRIPT: &str = r#"(() => {
    const btn = document.querySelector("[data-testid='create-new-chat-button'], button[data-testid='new-chat-button']")
        || Array.from(document.querySelectorAll('a, button')).find(b => (b.innerText || '').trim() === 'New chat');
    if (!btn) return false;
    btn.click();
    return true;
})()"#;

const COMPOSER_READY_SCRIPT: &str =
    r##"!!document.querySelector("#prompt-textarea, div[contenteditable='true'], textarea")"##;

const FILE_INPUT_SELECTOR: &str = "input[type='file']";

/// Reads the transcript of one chat tab.
struct ChatTabSurface<'a> {
    browser: &'a dyn BrowserDriver,
    tab: &'a str,
}

#[async_trait::async_trait]
impl ChatSurface for ChatTabSurface<'_> {
    async fn observe(&self) -> Result<ChatObservation, ScoutError> {
        let value = self.browser.evaluate(self.tab, OBSERVE_SCRIPT).await?;
        Ok(ChatObservation {
            streaming: value["streaming"].as_bool().unwrap_or(false),
            reply_count: value["count"].as_u64().unwrap_or(0) as usize,
            last_reply: value["last"].as_str().unwrap_or_default().to_string(),
        })
    }
}

/// [`ChatAssistant`] driving a chat web UI in a browser tab.
pub struct BrowserChat {
    browser: Arc<dyn BrowserDriver>,
    tabs: Arc<TabManager>,
    detector: CompletionDetector,
    clock: Arc<dyn Clock>,
    response_timeout: Duration,
}

impl BrowserChat {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        tabs: Arc<TabManager>,
        detector: CompletionDetector,
        clock: Arc<dyn Clock>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            browser,
            tabs,
            detector,
            clock,
            response_timeout,
        }
    }

    async fn attach_image(&self, tab: &str, image_jpeg_base64: &str) -> Result<NamedTempFile, ScoutError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(image_jpeg_base64)
            .map_err(|e| CdpError::InvalidResponse(format!("screenshot is not base64: {e}")))?;
        let mut file = tempfile::Builder::new()
            .prefix("scout-shot-")
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| ScoutError::Browser(CdpError::InvalidResponse(e.to_string())))?;
        file.write_all(&bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ScoutError::Browser(CdpError::InvalidResponse(e.to_string())))?;
        self.browser
            .set_file_input(tab, FILE_INPUT_SELECTOR, file.path())
            .await?;
        // Give the composer time to show the attachment.
        self.clock.sleep(Duration::from_secs(1)).await;
        Ok(file)
    }
}

#[async_trait::async_trait]
impl ChatAssistant for BrowserChat {
    async fn new_thread(&self) -> Result<(), ScoutError> {
        let chat = self.tabs.chat().await?;
        self.tabs.switch_to(&chat).await?;
        let clicked = self
            .browser
            .evaluate(&chat.id, NEW_CHAT_SCRIPT)
            .await?
            .as_bool()
            .unwrap_or(false);
        if !clicked {
            scout_debug!("New chat button not found; reloading chat");
            let url = self.tabs.urls().chat_url.clone();
            self.browser.navigate(&chat.id, &url).await?;
        }

        let start = self.clock.now();
        while self.clock.elapsed_since(start) < Duration::from_secs(8) {
            let ready = self.browser.evaluate(&chat.id, COMPOSER_READY_SCRIPT).await;
            if matches!(ready, Ok(v) if v.as_bool() == Some(true)) {
                return Ok(());
            }
            self.clock.sleep(Duration::from_millis(200)).await;
        }
        scout_warn!("Chat composer did not appear after starting a new thread");
        Ok(())
    }

    async fn ask(
        &self,
        prompt: &str,
        image_jpeg_base64: Option<&str>,
    ) -> Result<String, ScoutError> {
        let chat = self.tabs.chat().await?;
        self.tabs.switch_to(&chat).await?;
        let surface = ChatTabSurface {
            browser: self.browser.as_ref(),
            tab: &chat.id,
        };
        let baseline = surface.observe().await?.reply_count;

        let _attachment = match image_jpeg_base64 {
            Some(image) => Some(self.attach_image(&chat.id, image).await?),
            None => None,
        };

        let focused = self
            .browser
            .evaluate(&chat.id, FOCUS_COMPOSER_SCRIPT)
            .await?
            .as_bool()
            .unwrap_or(false);
        if !focused {
            return Err(CdpError::ElementNotFound("chat composer".to_string()).into());
        }
        self.browser.insert_text(&chat.id, prompt).await?;
        self.browser.press_key(&chat.id, Key::Enter).await?;
        self.clock.sleep(Duration::from_millis(200)).await;

        let after = surface.observe().await?;
        if !after.streaming && after.reply_count <= baseline {
            scout_debug!("Prompt not picked up by Enter; clicking send");
            self.browser.evaluate(&chat.id, CLICK_SEND_SCRIPT).await?;
        }

        self.detector
            .wait_for_response_complete(&surface, baseline, self.response_timeout)
            .await
    }
}
