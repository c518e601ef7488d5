//! Clinic scout: HTTP control surface over the scout engine.
pub mod platform;

pub use platform::config::{Args, ScoutConfig};
pub use platform::jobs::{JobStore, JobStoreError};
pub use platform::launcher::{BrowserLauncher, JobLauncher};
pub use platform::server::{router, AppState};
