//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use scout_engine::{column_index, CdpSettings, OrchestratorSettings, SheetLayout};
use scout_logging::LogDestination;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "clinic-scout",
    version,
    about = "Fills a spreadsheet of clinic websites with phone, owner and doctor count"
)]
pub struct Args {
    /// Address of the control surface.
    #[arg(long, env = "SCOUT_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Remote debugging endpoint of the browser to drive.
    #[arg(long, env = "SCOUT_CDP_ENDPOINT", default_value = "http://127.0.0.1:9222")]
    pub cdp_endpoint: String,

    /// Rows per batch before a cooldown.
    #[arg(long, env = "SCOUT_BATCH_LIMIT", default_value_t = 80)]
    pub batch_limit: usize,

    #[arg(long, env = "SCOUT_COOLDOWN_SECS", default_value_t = 300)]
    pub cooldown_secs: u64,

    /// How long to wait for one assistant reply.
    #[arg(long, env = "SCOUT_RESPONSE_TIMEOUT_SECS", default_value_t = 20)]
    pub response_timeout_secs: u64,

    /// Spreadsheet column holding the clinic URLs.
    #[arg(long, env = "SCOUT_INPUT_COLUMN", default_value = "Z", value_parser = parse_column)]
    pub input_column: String,

    /// Where process logs go: terminal, file or both.
    #[arg(long, env = "SCOUT_LOG", default_value = "terminal", value_parser = parse_destination)]
    pub log: LogDestination,

    #[arg(long, env = "SCOUT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, env = "SCOUT_VERBOSE")]
    pub verbose: bool,

    /// Keep per-row screenshots in this directory.
    #[arg(long, env = "SCOUT_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,
}

fn parse_column(raw: &str) -> Result<String, String> {
    column_index(raw)
        .map(|_| raw.trim().to_ascii_uppercase())
        .ok_or_else(|| format!("'{raw}' is not a column name"))
}

fn parse_destination(raw: &str) -> Result<LogDestination, String> {
    LogDestination::parse(raw).ok_or_else(|| format!("'{raw}' is not one of terminal, file, both"))
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn scout_config(&self) -> ScoutConfig {
        ScoutConfig {
            cdp: CdpSettings {
                endpoint: self.cdp_endpoint.clone(),
                ..CdpSettings::default()
            },
            layout: SheetLayout {
                input_column: self.input_column.clone(),
                ..SheetLayout::default()
            },
            orchestrator: OrchestratorSettings {
                batch_limit: self.batch_limit,
                cooldown_secs: self.cooldown_secs,
                ..OrchestratorSettings::default()
            },
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            artifacts_dir: self.artifacts_dir.clone(),
        }
    }
}

/// Engine settings assembled from [`Args`].
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub cdp: CdpSettings,
    pub layout: SheetLayout,
    pub orchestrator: OrchestratorSettings,
    pub response_timeout: Duration,
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            cdp: CdpSettings::default(),
            layout: SheetLayout::default(),
            orchestrator: OrchestratorSettings::default(),
            response_timeout: Duration::from_secs(20),
            artifacts_dir: None,
        }
    }
}
