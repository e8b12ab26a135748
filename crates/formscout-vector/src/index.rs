//! Vector index for similarity search.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::embedding::Embedding;

/// Search result from the index.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub kind: String,
    pub score: f32,
}

/// A stored vector plus the metadata needed to filter searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub kind: String,
    pub stored_at: DateTime<Utc>,
}

impl IndexEntry {
    pub fn embedding(&self) -> Embedding {
        Embedding::new(self.vector.clone())
    }
}

/// In-memory vector index using brute-force search.
pub struct VectorIndex {
    dimension: usize,
    pub(crate) entries: RwLock<HashMap<String, IndexEntry>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace a vector.
    pub fn insert(&self, id: impl Into<String>, kind: impl Into<String>, embedding: Embedding) {
        let entry = IndexEntry {
            vector: embedding.vector,
            kind: kind.into(),
            stored_at: Utc::now(),
        };
        self.entries.write().insert(id.into(), entry);
    }

    pub fn remove(&self, id: &str) -> Option<IndexEntry> {
        self.entries.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Search for vectors whose similarity is strictly above `threshold`,
    /// optionally restricted to one kind. Results are sorted descending.
    pub fn search(
        &self,
        query: &Embedding,
        kind: Option<&str>,
        limit: usize,
        threshold: f32,
    ) -> Vec<SearchResult> {
        if query.is_zero() {
            return Vec::new();
        }

        let entries = self.entries.read();
        let mut results: Vec<SearchResult> = entries
            .iter()
            .filter(|(_, entry)| kind.is_none_or(|k| entry.kind == k))
            .filter_map(|(id, entry)| {
                let score = query.cosine_similarity(&entry.embedding());
                (score > threshold).then(|| SearchResult {
                    id: id.clone(),
                    kind: entry.kind.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        results.truncate(limit);
        results
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
