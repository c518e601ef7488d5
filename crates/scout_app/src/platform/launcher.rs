//! Wires engine components for a spreadsheet and starts the worker task.

use std::sync::Arc;

use scout_engine::{
    ArtifactStore, BatchOrchestrator, BrowserChat, BrowserDriver, BrowserSheet, CdpBrowser,
    Clock, CompletionDetector, DetectorSettings, JobControl, NavigationResolver,
    NavigationSettings, RowProcessor, RowSettings, ScoutError, Spreadsheet, SystemClock,
    TabManager, TabUrls,
};
use scout_logging::{scout_info, scout_warn};
use tokio::sync::Mutex;

use super::config::ScoutConfig;

/// What the HTTP layer needs from the engine.
#[async_trait::async_trait]
pub trait JobLauncher: Send + Sync {
    /// Fails with `AccessCheckFailure` unless the sheet can be read and
    /// edited.
    async fn check_access(&self, sheet_url: &str) -> Result<(), ScoutError>;

    /// Start the worker for `job` in the background.
    async fn launch(&self, sheet_url: &str, job: JobControl) -> Result<(), ScoutError>;
}

/// [`JobLauncher`] driving a real browser over CDP. The connection is made
/// on first use and dropped again when it fails.
pub struct BrowserLauncher {
    config: ScoutConfig,
    clock: Arc<dyn Clock>,
    browser: Mutex<Option<Arc<CdpBrowser>>>,
}

struct Wiring {
    sheet: Arc<BrowserSheet>,
    orchestrator: BatchOrchestrator,
}

impl BrowserLauncher {
    pub fn new(config: ScoutConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            browser: Mutex::new(None),
        }
    }

    async fn browser(&self) -> Result<Arc<CdpBrowser>, ScoutError> {
        let mut cached = self.browser.lock().await;
        if let Some(browser) = cached.as_ref() {
            return Ok(browser.clone());
        }
        let browser = Arc::new(CdpBrowser::connect(self.config.cdp.clone()).await?);
        scout_info!("Connected to browser at {}", self.config.cdp.endpoint);
        *cached = Some(browser.clone());
        Ok(browser)
    }

    async fn forget_browser(&self) {
        self.browser.lock().await.take();
    }

    async fn wire(&self, sheet_url: &str) -> Result<Wiring, ScoutError> {
        let browser: Arc<dyn BrowserDriver> = self.browser().await?;
        let clock = self.clock.clone();
        let tabs = Arc::new(TabManager::new(browser.clone(), TabUrls::new(sheet_url)));

        let sheet = Arc::new(BrowserSheet::new(
            browser.clone(),
            tabs.clone(),
            clock.clone(),
            self.config.layout.clone(),
        )?);
        let chat = Arc::new(BrowserChat::new(
            browser.clone(),
            tabs.clone(),
            CompletionDetector::new(clock.clone(), DetectorSettings::default()),
            clock.clone(),
            self.config.response_timeout,
        ));
        let resolver = NavigationResolver::new(clock.clone(), NavigationSettings::default());
        let mut rows = RowProcessor::new(browser, tabs, chat, resolver, RowSettings::default());
        if let Some(dir) = &self.config.artifacts_dir {
            rows = rows.with_artifacts(ArtifactStore::new(dir.clone()));
        }

        let orchestrator = BatchOrchestrator::new(
            sheet.clone(),
            Arc::new(rows),
            clock,
            self.config.layout.clone(),
            self.config.orchestrator.clone(),
        );
        Ok(Wiring { sheet, orchestrator })
    }
}

#[async_trait::async_trait]
impl JobLauncher for BrowserLauncher {
    async fn check_access(&self, sheet_url: &str) -> Result<(), ScoutError> {
        let result = match self.wire(sheet_url).await {
            Ok(wiring) => wiring.sheet.probe_access().await,
            Err(e) => Err(e),
        };
        if let Err(ScoutError::Browser(e)) = &result {
            scout_warn!("Browser connection dropped: {}", e);
            self.forget_browser().await;
        }
        result.map_err(|e| match e {
            ScoutError::AccessCheckFailure(_) => e,
            other => ScoutError::AccessCheckFailure(other.to_string()),
        })
    }

    async fn launch(&self, sheet_url: &str, job: JobControl) -> Result<(), ScoutError> {
        let Wiring { orchestrator, .. } = self.wire(sheet_url).await?;
        scout_info!("Launching job {} for {}", job.job_id(), sheet_url);
        tokio::spawn(async move {
            orchestrator.run(job).await;
        });
        Ok(())
    }
}
