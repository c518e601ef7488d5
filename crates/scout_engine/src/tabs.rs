use std::future::Future;
use std::sync::{Arc, Mutex};

use scout_logging::{scout_debug, scout_warn};
use url::Url;

use crate::browser::{BrowserDriver, TabInfo};
use crate::error::ScoutError;

/// What a tab is used for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TabKind {
    Sheet,
    Chat,
    Site { host: String },
}

impl TabKind {
    pub fn site_for(url: &str) -> Self {
        TabKind::Site {
            host: host_of(url),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        match self {
            TabKind::Sheet => host == "docs.google.com" && parsed.path().contains("/spreadsheets/"),
            TabKind::Chat => host.contains("chatgpt.com") || host.contains("openai.com"),
            TabKind::Site { host: expected } => hosts_match(&host, expected),
        }
    }

    fn label(&self) -> &str {
        match self {
            TabKind::Sheet => "spreadsheet",
            TabKind::Chat => "chat",
            TabKind::Site { host } => host,
        }
    }
}

/// Equal, or one is a subdomain of the other.
fn hosts_match(host: &str, expected: &str) -> bool {
    if host.is_empty() || expected.is_empty() {
        return false;
    }
    let expected = expected.to_ascii_lowercase();
    host == expected
        || host.ends_with(&format!(".{expected}"))
        || expected.ends_with(&format!(".{host}"))
}

/// Lowercase host of `url`; bare hosts are accepted.
pub(crate) fn host_of(url: &str) -> String {
    let trimmed = url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabHandle {
    pub id: String,
    pub kind: TabKind,
}

/// Where to open the fixed tabs when none exists yet.
#[derive(Debug, Clone)]
pub struct TabUrls {
    pub sheet_url: String,
    pub chat_url: String,
}

impl TabUrls {
    pub fn new(sheet_url: impl Into<String>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            chat_url: "https://chatgpt.com/".to_string(),
        }
    }
}

/// Finds, opens and switches between the spreadsheet, chat and site tabs.
pub struct TabManager {
    browser: Arc<dyn BrowserDriver>,
    urls: TabUrls,
    known: Mutex<Vec<TabHandle>>,
    active: Mutex<Option<String>>,
}

impl TabManager {
    pub fn new(browser: Arc<dyn BrowserDriver>, urls: TabUrls) -> Self {
        Self {
            browser,
            urls,
            known: Mutex::new(Vec::new()),
            active: Mutex::new(None),
        }
    }

    pub fn urls(&self) -> &TabUrls {
        &self.urls
    }

    /// Existing tab for `kind` without opening anything. A cached handle wins
    /// while its tab still exists and still matches; sites otherwise prefer
    /// the longest matching URL.
    pub async fn find(&self, kind: &TabKind) -> Result<Option<TabHandle>, ScoutError> {
        let tabs = self.browser.list_tabs().await?;
        let cached = self.cached(kind);
        if let Some(id) = cached {
            if tabs.iter().any(|t| t.id == id && kind.matches(&t.url)) {
                return Ok(Some(TabHandle {
                    id,
                    kind: kind.clone(),
                }));
            }
            scout_debug!("Cached {} tab {} is stale", kind.label(), id);
        }

        let mut matching = tabs.iter().filter(|t| kind.matches(&t.url));
        let best: Option<&TabInfo> = match kind {
            TabKind::Site { .. } => matching.fold(None, |best: Option<&TabInfo>, t| match best {
                Some(b) if b.url.len() >= t.url.len() => Some(b),
                _ => Some(t),
            }),
            _ => matching.next(),
        };
        Ok(best.map(|t| self.remember(kind, &t.id)))
    }

    /// Existing tab for `kind`, or a new one at `open_url`.
    pub async fn get_or_open(
        &self,
        kind: &TabKind,
        open_url: &str,
    ) -> Result<TabHandle, ScoutError> {
        if let Some(handle) = self.find(kind).await? {
            return Ok(handle);
        }
        scout_debug!("Opening {} tab at {}", kind.label(), open_url);
        match self.browser.open_tab(open_url).await {
            Ok(tab) => Ok(self.remember(kind, &tab.id)),
            Err(e) => {
                scout_warn!("Could not open {} tab: {}", kind.label(), e);
                match kind {
                    TabKind::Site { .. } => Err(ScoutError::NavigationFailure(open_url.to_string())),
                    _ => Err(ScoutError::TabLost(kind.label().to_string())),
                }
            }
        }
    }

    pub async fn sheet(&self) -> Result<TabHandle, ScoutError> {
        let url = self.urls.sheet_url.clone();
        self.get_or_open(&TabKind::Sheet, &url).await
    }

    pub async fn chat(&self) -> Result<TabHandle, ScoutError> {
        let url = self.urls.chat_url.clone();
        self.get_or_open(&TabKind::Chat, &url).await
    }

    pub async fn switch_to(&self, handle: &TabHandle) -> Result<(), ScoutError> {
        self.browser.activate(&handle.id).await?;
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle.id.clone());
        Ok(())
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Host of the active tab, empty when none is active.
    pub async fn current_host(&self) -> Result<String, ScoutError> {
        let Some(id) = self.active_id() else {
            return Ok(String::new());
        };
        let url = self.browser.current_url(&id).await?;
        Ok(host_of(&url))
    }

    /// Run `op` with the spreadsheet tab in front, then bring back whatever
    /// tab was active before.
    pub async fn with_sheet<T, F, Fut>(&self, op: F) -> Result<T, ScoutError>
    where
        F: FnOnce(TabHandle) -> Fut,
        Fut: Future<Output = Result<T, ScoutError>>,
    {
        let previous = self.active_id();
        let sheet = self.sheet().await?;
        self.switch_to(&sheet).await?;
        let result = op(sheet.clone()).await;

        if let Some(prev) = previous.filter(|p| p != &sheet.id) {
            if let Err(e) = self.browser.activate(&prev).await {
                scout_debug!("Previous tab {} not restored: {}", prev, e);
            } else {
                *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(prev);
            }
        }
        result
    }

    /// Close a site tab. Spreadsheet and chat tabs are never closed.
    pub async fn close_site(&self, handle: &TabHandle) -> Result<(), ScoutError> {
        if !matches!(handle.kind, TabKind::Site { .. }) {
            return Ok(());
        }
        if let Some(sheet) = self.cached(&TabKind::Sheet) {
            if sheet == handle.id {
                return Ok(());
            }
        }
        self.browser.close_tab(&handle.id).await?;
        self.known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|h| h.id != handle.id);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_deref() == Some(handle.id.as_str()) {
            *active = None;
        }
        Ok(())
    }

    fn cached(&self, kind: &TabKind) -> Option<String> {
        self.known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|h| &h.kind == kind)
            .map(|h| h.id.clone())
    }

    fn remember(&self, kind: &TabKind, id: &str) -> TabHandle {
        let handle = TabHandle {
            id: id.to_string(),
            kind: kind.clone(),
        };
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        known.retain(|h| &h.kind != kind);
        known.push(handle.clone());
        handle
    }
}
