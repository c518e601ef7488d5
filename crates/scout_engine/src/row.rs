use std::sync::{Arc, Mutex};

use scout_logging::{scout_debug, scout_info, scout_warn};

use crate::artifacts::ArtifactStore;
use crate::browser::BrowserDriver;
use crate::chat::ChatAssistant;
use crate::error::ScoutError;
use crate::extract::{ExtractedFacts, TextFactExtractor};
use crate::links::{LinkInventoryBuilder, PageInventory};
use crate::navigate::NavigationResolver;
use crate::prompts::{build_nav_prompt, build_staff_csv_prompt};
use crate::reply::{parse_nav_reply, parse_staff_reply, NavSuggestion};
use crate::tabs::{TabHandle, TabKind, TabManager};

/// Turns one input URL into facts ready for write-back.
#[async_trait::async_trait]
pub trait RowHandler: Send + Sync {
    /// Errors other than fatal ones come back as [`ScoutError::Row`].
    async fn process_row(
        &self,
        job_id: &str,
        row: usize,
        url: &str,
    ) -> Result<ExtractedFacts, ScoutError>;
}

#[derive(Debug, Clone)]
pub struct RowSettings {
    /// Link texts offered to the assistant.
    pub nav_link_limit: usize,
    /// Close the site tab once the row is done.
    pub close_site_tab: bool,
    /// Extra attempts after an assistant timeout.
    pub chat_retries: usize,
}

impl Default for RowSettings {
    fn default() -> Self {
        Self {
            nav_link_limit: 60,
            close_site_tab: true,
            chat_retries: 1,
        }
    }
}

/// The browser-backed [`RowHandler`]: load the site, ask the assistant where
/// the staff page is, go there and read the facts.
pub struct RowProcessor {
    browser: Arc<dyn BrowserDriver>,
    tabs: Arc<TabManager>,
    chat: Arc<dyn ChatAssistant>,
    resolver: NavigationResolver,
    inventory: LinkInventoryBuilder,
    extractor: TextFactExtractor,
    artifacts: Option<ArtifactStore>,
    settings: RowSettings,
    last_site: Mutex<Option<TabHandle>>,
}

impl RowProcessor {
    pub fn new(
        browser: Arc<dyn BrowserDriver>,
        tabs: Arc<TabManager>,
        chat: Arc<dyn ChatAssistant>,
        resolver: NavigationResolver,
        settings: RowSettings,
    ) -> Self {
        Self {
            browser,
            tabs,
            chat,
            resolver,
            inventory: LinkInventoryBuilder::new(),
            extractor: TextFactExtractor::new(),
            artifacts: None,
            settings,
            last_site: Mutex::new(None),
        }
    }

    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    async fn run(&self, job_id: &str, row: usize, url: &str) -> Result<ExtractedFacts, ScoutError> {
        let target = with_scheme(url);
        self.close_previous_site().await;

        let kind = TabKind::site_for(&target);
        let mut site = self.open_site(&kind, &target).await?;
        let landing = self.read_page(&site).await?;

        let suggestion = self.suggest_navigation(job_id, row, &site, &landing).await?;
        match &suggestion {
            Some(s) => scout_info!("Row {}: assistant suggests '{}'", row, display(s)),
            None => scout_info!("Row {}: no navigation suggestion", row),
        }

        let moved = self
            .resolver
            .resolve_and_navigate(self.browser.as_ref(), &site.id, &landing, suggestion.as_ref())
            .await?;
        if !moved {
            scout_debug!("Row {}: extracting from the landing page", row);
        }

        // A click may have opened the staff page in another tab.
        if let Some(handle) = self.tabs.find(&kind).await? {
            if handle.id != site.id {
                scout_debug!("Row {}: following site to tab {}", row, handle.id);
                site = handle;
                self.remember_site(Some(site.clone()));
                self.tabs.switch_to(&site).await?;
            }
        }
        if moved {
            let host = self.tabs.current_host().await?;
            if !host.is_empty() && !kind.matches(&format!("https://{host}/")) {
                scout_info!("Row {}: staff page is on {}", row, host);
            }
        }

        let staff_page = if moved {
            self.read_page(&site).await?
        } else {
            landing.clone()
        };
        let mut facts = self
            .extractor
            .extract(&staff_page)
            .merge_missing(self.extractor.extract(&landing));

        if !facts.is_conclusive() {
            scout_debug!("Row {}: text extraction inconclusive; asking assistant", row);
            let shot = self.screenshot(job_id, row, &site, "staff").await;
            if let Some(reply) = self.ask(&build_staff_csv_prompt(), shot.as_deref()).await? {
                facts = facts.merge_missing(parse_staff_reply(&reply));
            }
        }

        if self.settings.close_site_tab {
            if let Err(e) = self.tabs.close_site(&site).await {
                scout_debug!("Row {}: site tab not closed: {}", row, e);
            }
            self.remember_site(None);
        }
        scout_info!("Row {}: {}", row, facts.summary());
        Ok(facts)
    }

    async fn open_site(&self, kind: &TabKind, target: &str) -> Result<TabHandle, ScoutError> {
        let site = match self.tabs.find(kind).await? {
            Some(existing) => {
                self.browser.navigate(&existing.id, target).await?;
                existing
            }
            None => self.tabs.get_or_open(kind, target).await?,
        };
        self.remember_site(Some(site.clone()));
        self.tabs.switch_to(&site).await?;
        Ok(site)
    }

    async fn read_page(&self, site: &TabHandle) -> Result<PageInventory, ScoutError> {
        let html = self.browser.page_html(&site.id).await?;
        let url = self.browser.current_url(&site.id).await?;
        Ok(self.inventory.build(&html, &url))
    }

    async fn suggest_navigation(
        &self,
        job_id: &str,
        row: usize,
        site: &TabHandle,
        landing: &PageInventory,
    ) -> Result<Option<NavSuggestion>, ScoutError> {
        let shot = self.screenshot(job_id, row, site, "landing").await;
        self.chat.new_thread().await?;
        let prompt = build_nav_prompt(&nav_labels(landing, self.settings.nav_link_limit));
        let reply = self.ask(&prompt, shot.as_deref()).await?;
        let suggestion = reply.as_deref().and_then(parse_nav_reply);

        // The site tab must be in front again for clicks and screenshots.
        self.tabs.switch_to(site).await?;
        Ok(suggestion)
    }

    /// Ask with retries on timeout; `None` once the retries are spent.
    async fn ask(&self, prompt: &str, image: Option<&str>) -> Result<Option<String>, ScoutError> {
        for attempt in 0..=self.settings.chat_retries {
            match self.chat.ask(prompt, image).await {
                Ok(reply) => return Ok(Some(reply)),
                Err(ScoutError::ResponseTimeout(after)) => {
                    scout_warn!("Assistant timed out after {:?} (attempt {})", after, attempt + 1);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn screenshot(&self, job_id: &str, row: usize, site: &TabHandle, label: &str) -> Option<String> {
        let shot = match self.browser.screenshot_jpeg(&site.id).await {
            Ok(shot) => shot,
            Err(e) => {
                scout_debug!("Screenshot of row {} failed: {}", row, e);
                return None;
            }
        };
        if let Some(store) = &self.artifacts {
            if let Err(e) = store.write_screenshot(job_id, row, label, &shot) {
                scout_warn!("Could not store screenshot for row {}: {}", row, e);
            }
        }
        Some(shot)
    }

    async fn close_previous_site(&self) {
        let previous = self.last_site.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = previous {
            if let Err(e) = self.tabs.close_site(&handle).await {
                scout_debug!("Stale site tab {} not closed: {}", handle.id, e);
            }
        }
    }

    fn remember_site(&self, handle: Option<TabHandle>) {
        *self.last_site.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }
}

#[async_trait::async_trait]
impl RowHandler for RowProcessor {
    async fn process_row(
        &self,
        job_id: &str,
        row: usize,
        url: &str,
    ) -> Result<ExtractedFacts, ScoutError> {
        match self.run(job_id, row, url).await {
            Ok(facts) => Ok(facts),
            Err(e) if e.is_fatal() || matches!(e, ScoutError::Row { .. }) => Err(e),
            Err(e) => Err(ScoutError::row(row, e.to_string())),
        }
    }
}

/// Link labels offered to the assistant, dropdown entries as "Parent > Child".
fn nav_labels(page: &PageInventory, limit: usize) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for link in page.links.iter().filter(|l| !l.hidden && !l.text.is_empty()) {
        let label = match &link.parent_menu {
            Some(parent) if parent != &link.text => format!("{} > {}", parent, link.text),
            _ => link.text.clone(),
        };
        if labels.contains(&label) {
            continue;
        }
        labels.push(label);
        if labels.len() >= limit {
            break;
        }
    }
    labels
}

fn display(s: &NavSuggestion) -> String {
    match &s.parent {
        Some(parent) => format!("{} > {}", parent, s.label),
        None => s.label.clone(),
    }
}

fn with_scheme(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
