//! Site analysis scheduler errors.

use thiserror::Error;

use super::{BrowserError, KnowledgeError};

/// Errors that abort a scheduler run. Per-site failures never surface here;
/// they are recorded in the run report instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Run cancelled")]
    Cancelled,
}
