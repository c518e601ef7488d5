use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use scout_logging::scout_debug;
use serde_json::Value;

use crate::cdp::{CdpClient, CdpError, CdpSettings, Key, PageSession};

/// One open page as seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    pub title: String,
}

/// Everything the engine asks of a browser. Tabs are addressed by id.
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, CdpError>;
    async fn open_tab(&self, url: &str) -> Result<TabInfo, CdpError>;
    async fn activate(&self, tab: &str) -> Result<(), CdpError>;
    async fn close_tab(&self, tab: &str) -> Result<(), CdpError>;
    async fn navigate(&self, tab: &str, url: &str) -> Result<(), CdpError>;
    async fn current_url(&self, tab: &str) -> Result<String, CdpError>;
    /// Serialized DOM once the document is interactive.
    async fn page_html(&self, tab: &str) -> Result<String, CdpError>;
    async fn evaluate(&self, tab: &str, expression: &str) -> Result<Value, CdpError>;
    /// Click the `index`-th anchor in document order.
    async fn click_link(&self, tab: &str, index: usize) -> Result<(), CdpError>;
    /// Hover, focus and if needed click the menu toggle labelled `label`.
    async fn expand_menu(&self, tab: &str, label: &str) -> Result<bool, CdpError>;
    async fn insert_text(&self, tab: &str, text: &str) -> Result<(), CdpError>;
    async fn press_key(&self, tab: &str, key: Key) -> Result<(), CdpError>;
    async fn set_file_input(&self, tab: &str, selector: &str, path: &Path)
        -> Result<(), CdpError>;
    /// Viewport screenshot as base64 JPEG.
    async fn screenshot_jpeg(&self, tab: &str) -> Result<String, CdpError>;
}

const SCREENSHOT_QUALITY: u8 = 70;

/// [`BrowserDriver`] over the Chrome DevTools Protocol.
pub struct CdpBrowser {
    client: CdpClient,
    sessions: tokio::sync::Mutex<HashMap<String, Arc<PageSession>>>,
}

impl CdpBrowser {
    pub async fn connect(settings: CdpSettings) -> Result<Self, CdpError> {
        let client = CdpClient::connect(settings).await?;
        Ok(Self {
            client,
            sessions: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    async fn session(&self, tab: &str) -> Result<Arc<PageSession>, CdpError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(tab) {
            return Ok(session.clone());
        }
        let session = Arc::new(self.client.attach(tab).await?);
        sessions.insert(tab.to_string(), session.clone());
        Ok(session)
    }

    async fn forget(&self, tab: &str) {
        self.sessions.lock().await.remove(tab);
    }
}

/// Quote `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

#[async_trait::async_trait]
impl BrowserDriver for CdpBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>, CdpError> {
        let pages = self.client.discovery().list_pages().await?;
        let live: Vec<TabInfo> = pages
            .into_iter()
            .map(|p| TabInfo {
                id: p.id,
                url: p.url,
                title: p.title,
            })
            .collect();
        self.sessions
            .lock()
            .await
            .retain(|id, _| live.iter().any(|t| &t.id == id));
        Ok(live)
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo, CdpError> {
        let page = self.client.discovery().open_page(url).await?;
        let session = self.session(&page.id).await?;
        session.wait_for_load().await?;
        Ok(TabInfo {
            id: page.id,
            url: page.url,
            title: page.title,
        })
    }

    async fn activate(&self, tab: &str) -> Result<(), CdpError> {
        self.client.discovery().activate(tab).await
    }

    async fn close_tab(&self, tab: &str) -> Result<(), CdpError> {
        self.forget(tab).await;
        self.client.discovery().close(tab).await
    }

    async fn navigate(&self, tab: &str, url: &str) -> Result<(), CdpError> {
        self.session(tab).await?.navigate(url).await
    }

    async fn current_url(&self, tab: &str) -> Result<String, CdpError> {
        self.session(tab).await?.current_url().await
    }

    async fn page_html(&self, tab: &str) -> Result<String, CdpError> {
        let session = self.session(tab).await?;
        session.wait_for_load().await?;
        let html = session
            .evaluate("document.documentElement.outerHTML")
            .await?;
        Ok(html.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&self, tab: &str, expression: &str) -> Result<Value, CdpError> {
        self.session(tab).await?.evaluate(expression).await
    }

    async fn click_link(&self, tab: &str, index: usize) -> Result<(), CdpError> {
        let script = format!(
            r#"(() => {{
                const a = document.querySelectorAll('a')[{index}];
                if (!a) return false;
                a.scrollIntoView({{block: 'center'}});
                a.click();
                return true;
            }})()"#
        );
        let clicked = self.evaluate(tab, &script).await?;
        if clicked.as_bool() != Some(true) {
            return Err(CdpError::ElementNotFound(format!("link #{index}")));
        }
        scout_debug!("Clicked link #{} in {}", index, tab);
        Ok(())
    }

    async fn expand_menu(&self, tab: &str, label: &str) -> Result<bool, CdpError> {
        let script = format!(
            r#"(() => {{
                const want = {label}.trim().toLowerCase();
                const nodes = Array.from(document.querySelectorAll(
                    'a, button, [role="button"], [aria-haspopup], [aria-expanded]'));
                const el = nodes.find(n => (n.innerText || n.textContent || n.getAttribute('aria-label') || '')
                    .trim().toLowerCase() === want);
                if (!el) return false;
                el.scrollIntoView({{block: 'center'}});
                const r = el.getBoundingClientRect();
                const opts = {{bubbles: true, cancelable: true, view: window,
                    clientX: r.left + r.width / 2, clientY: r.top + r.height / 2}};
                ['pointerover', 'mouseover', 'mouseenter'].forEach(t => el.dispatchEvent(new MouseEvent(t, opts)));
                if (el.parentElement) el.parentElement.dispatchEvent(new MouseEvent('mouseover', opts));
                if (el.focus) el.focus();
                const href = (el.getAttribute('href') || '').trim();
                if (el.tagName !== 'A' || href === '' || href === '#' || href.startsWith('javascript:')) {{
                    el.click();
                }}
                return true;
            }})()"#,
            label = js_string(label)
        );
        Ok(self.evaluate(tab, &script).await?.as_bool() == Some(true))
    }

    async fn insert_text(&self, tab: &str, text: &str) -> Result<(), CdpError> {
        self.session(tab).await?.insert_text(text).await
    }

    async fn press_key(&self, tab: &str, key: Key) -> Result<(), CdpError> {
        self.session(tab).await?.press_key(key).await
    }

    async fn set_file_input(
        &self,
        tab: &str,
        selector: &str,
        path: &Path,
    ) -> Result<(), CdpError> {
        self.session(tab).await?.set_file_input(selector, path).await
    }

    async fn screenshot_jpeg(&self, tab: &str) -> Result<String, CdpError> {
        self.session(tab)
            .await?
            .screenshot_jpeg(SCREENSHOT_QUALITY)
            .await
    }
}
