//! CDP error types.

use formscout_protocols::BrowserError;
use thiserror::Error;

/// CDP client errors.
#[derive(Debug, Error)]
pub enum CdpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not running with remote debugging on the endpoint.
    #[error("Chrome not available at {0}")]
    ChromeNotAvailable(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
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

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

/// Chrome's wording when a page's JavaScript world went away mid-call.
fn is_lost_context(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("context was destroyed")
        || lower.contains("cannot find context")
        || lower.contains("target closed")
        || lower.contains("no target with given id")
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg)
            | CdpError::ChromeNotAvailable(msg)
            | CdpError::WebSocket(msg)
            | CdpError::Http(msg) => BrowserError::Connection(msg),
            CdpError::NavigationFailed(msg) => BrowserError::Navigation(msg),
            CdpError::Timeout(msg) => BrowserError::Timeout(msg),
            CdpError::SessionClosed => BrowserError::Context("session closed".to_string()),
            CdpError::JavaScript(msg) if is_lost_context(&msg) => BrowserError::Context(msg),
            CdpError::JavaScript(msg) => BrowserError::Script(msg),
            CdpError::Protocol { message, .. } if is_lost_context(&message) => {
                BrowserError::Context(message)
            }
            CdpError::Protocol { code, message } => {
                BrowserError::Protocol(format!("{} (code: {})", message, code))
            }
            CdpError::Serialization(e) => BrowserError::Protocol(e.to_string()),
            CdpError::InvalidResponse(msg) => BrowserError::Protocol(msg),
        }
    }
}
