//! Browser automation errors.

use thiserror::Error;

use super::ErrorCategory;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Element interaction failed: {0}")]
    ElementInteraction(String),

    #[error("Element not visible: {0}")]
    NotVisible(String),

    #[error("Page context lost: {0}")]
    Context(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Browser pool is closed")]
    PoolClosed,

    #[error("Operation cancelled")]
    Cancelled,
}

impl BrowserError {
    /// Map onto the failure taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            BrowserError::Navigation(_) | BrowserError::Timeout(_) => ErrorCategory::Navigation,
            BrowserError::ElementInteraction(_) => ErrorCategory::ElementInteraction,
            BrowserError::NotVisible(_) => ErrorCategory::VisibilityFailure,
            BrowserError::Context(_) | BrowserError::Script(_) => ErrorCategory::Context,
            BrowserError::Cancelled => ErrorCategory::Cancelled,
            BrowserError::Launch(_)
            | BrowserError::Connection(_)
            | BrowserError::Protocol(_)
            | BrowserError::PoolClosed => ErrorCategory::Other,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable_navigation() {
        let err = BrowserError::Timeout("page load".to_string());
        assert_eq!(err.category(), ErrorCategory::Navigation);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_launch_not_retryable() {
        let err = BrowserError::Launch("chrome missing".to_string());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("chrome missing"));
    }

    #[test]
    fn test_script_error_is_context() {
        let err = BrowserError::Script("Execution context was destroyed".to_string());
        assert_eq!(err.category(), ErrorCategory::Context);
    }

    #[test]
    fn test_cancelled_not_retryable() {
        assert!(!BrowserError::Cancelled.is_retryable());
    }
}
