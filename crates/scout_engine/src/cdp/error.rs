use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("browser not available at {0}; start it with --remote-debugging-port")]
    BrowserNotAvailable(String),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("protocol error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("session closed")]
    SessionClosed,

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}
