//! The knowledge record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{KnowledgeKind, KnowledgePayload};

/// Free-form metadata attached to a record. Opaque to the store.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Usage statistics indexed by the store for every kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Confidence in the record (0.0 - 1.0).
    pub confidence_score: f32,
    pub usage_count: u64,
    /// Observed success rate when the record was applied (0.0 - 1.0).
    pub success_rate: f32,
}

impl Default for KnowledgeStats {
    fn default() -> Self {
        Self {
            confidence_score: 0.5,
            usage_count: 0,
            success_rate: 0.0,
        }
    }
}

/// A stored unit of learned information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Content-derived ID (assigned by the store if not provided).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub payload: KnowledgePayload,

    #[serde(default)]
    pub stats: KnowledgeStats,

    #[serde(default)]
    pub metadata: Metadata,

    /// Embedding computed by the store from the payload text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub access_count: u64,
}

impl KnowledgeRecord {
    pub fn new(payload: KnowledgePayload) -> Self {
        Self {
            id: None,
            payload,
            stats: KnowledgeStats::default(),
            metadata: Metadata::new(),
            embedding: Vec::new(),
            created_at: Utc::now(),
            last_accessed: None,
            access_count: 0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.stats.confidence_score = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_success_rate(mut self, rate: f32) -> Self {
        self.stats.success_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> KnowledgeKind {
        self.payload.kind()
    }

    /// The record's ID, or the content-derived one if none was assigned.
    pub fn resolved_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.content_id())
    }

    /// Stable identifier derived from the kind and the canonical payload
    /// serialization. Statistics and metadata do not participate, so the
    /// same insight always maps onto the same record.
    pub fn content_id(&self) -> String {
        let mut payload = self.payload.clone();
        payload.normalize();
        let canonical = serde_json::to_string(&payload).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(self.kind().as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical.as_bytes());
        let hex = format!("{:x}", hasher.finalize());
        format!("kn-{}", &hex[..16])
    }
}
