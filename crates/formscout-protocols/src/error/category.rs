//! Failure taxonomy used for retry decisions and failure knowledge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse failure category.
///
/// Navigation, ElementInteraction and Context failures are retryable;
/// Storage failures surface to the caller; Embedding failures are
/// non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Navigation,
    ElementInteraction,
    Context,
    VisibilityFailure,
    Storage,
    Embedding,
    Cancelled,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Navigation => "navigation",
            ErrorCategory::ElementInteraction => "element_interaction",
            ErrorCategory::Context => "context",
            ErrorCategory::VisibilityFailure => "visibility_failure",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Embedding => "embedding",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Other => "other",
        }
    }

    /// Whether failures of this category are retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Navigation
                | ErrorCategory::ElementInteraction
                | ErrorCategory::Context
                | ErrorCategory::VisibilityFailure
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(ErrorCategory::Navigation.is_retryable());
        assert!(ErrorCategory::ElementInteraction.is_retryable());
        assert!(ErrorCategory::Context.is_retryable());
        assert!(!ErrorCategory::Storage.is_retryable());
        assert!(!ErrorCategory::Embedding.is_retryable());
        assert!(!ErrorCategory::Cancelled.is_retryable());
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ErrorCategory::VisibilityFailure).unwrap();
        assert_eq!(json, "\"visibility_failure\"");
    }
}
