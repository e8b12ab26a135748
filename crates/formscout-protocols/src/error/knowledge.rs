//! Knowledge store errors.

use thiserror::Error;

/// Persistence layer failure. Never retried automatically.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Index file error: {0}")]
    IndexFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Knowledge record not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for KnowledgeError {
    fn from(e: serde_json::Error) -> Self {
        KnowledgeError::Serialization(e.to_string())
    }
}

impl KnowledgeError {
    pub fn is_storage(&self) -> bool {
        matches!(self, KnowledgeError::Storage(_))
    }
}
