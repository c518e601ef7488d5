use std::time::Duration;

use thiserror::Error;

use crate::cdp::CdpError;

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error("no reply from the assistant within {0:?}")]
    ResponseTimeout(Duration),
    #[error("could not navigate to '{0}'")]
    NavigationFailure(String),
    #[error("{0} tab lost")]
    TabLost(String),
    #[error("access check failed: {0}")]
    AccessCheckFailure(String),
    #[error("browser error: {0}")]
    Browser(#[from] CdpError),
    #[error("spreadsheet error: {0}")]
    Sheet(String),
}

impl ScoutError {
    pub(crate) fn row(row: usize, message: impl Into<String>) -> Self {
        Self::Row {
            row,
            message: message.into(),
        }
    }

    /// Errors that end the whole job rather than a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TabLost(_) | Self::Sheet(_) | Self::AccessCheckFailure(_)
        )
    }
}
