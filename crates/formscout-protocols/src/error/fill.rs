//! Form fill errors.

use thiserror::Error;

use super::{BrowserError, KnowledgeError};

#[derive(Debug, Error)]
pub enum FillError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Page has no fillable fields")]
    EmptyPlan,

    #[error("Fill cancelled")]
    Cancelled,
}
