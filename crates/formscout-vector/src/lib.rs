//! Vector layer for the FormScout knowledge base.
//!
//! Turns knowledge text into fixed-length vectors with a cheap,
//! deterministic hashing codec (no model download, no network) and keeps
//! them in a brute-force cosine-similarity index that snapshots to disk.

mod embedding;
mod index;
mod snapshot;

pub use embedding::{Embedding, EmbeddingCodec, EmbeddingError, HashEmbeddingCodec, tokenize};
pub use index::{IndexEntry, SearchResult, VectorIndex};
pub use snapshot::IndexFileError;
