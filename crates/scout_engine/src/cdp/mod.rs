//! Chrome DevTools Protocol client.
//!
//! The browser must be started with remote debugging enabled, for example
//! `chrome --remote-debugging-port=9222`. Targets are discovered over the
//! HTTP `/json/*` endpoints; commands travel over the browser WebSocket with
//! flattened per-page sessions.
mod client;
mod error;
mod protocol;
mod session;

use std::time::Duration;

pub use client::{CdpClient, CdpConnection, CdpDiscovery};
pub use error::CdpError;
pub use protocol::{BrowserVersion, CdpRequest, CdpResponse, Key, PageInfo};
pub use session::PageSession;

#[derive(Debug, Clone)]
pub struct CdpSettings {
    /// Debugging endpoint, e.g. `http://127.0.0.1:9222`.
    pub endpoint: String,
    pub http_timeout: Duration,
    pub command_timeout: Duration,
    pub page_load_timeout: Duration,
}

impl Default for CdpSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9222".to_string(),
            http_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            page_load_timeout: Duration::from_secs(30),
        }
    }
}
