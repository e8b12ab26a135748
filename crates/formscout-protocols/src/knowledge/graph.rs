//! Knowledge graph artifacts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::KnowledgeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    SimilarTo,
    Causes,
    Prevents,
    Requires,
    Enhances,
    Replaces,
    Sequence,
    Correlation,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::SimilarTo => "similar_to",
            RelationshipType::Causes => "causes",
            RelationshipType::Prevents => "prevents",
            RelationshipType::Requires => "requires",
            RelationshipType::Enhances => "enhances",
            RelationshipType::Replaces => "replaces",
            RelationshipType::Sequence => "sequence",
            RelationshipType::Correlation => "correlation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            RelationshipType::SimilarTo,
            RelationshipType::Causes,
            RelationshipType::Prevents,
            RelationshipType::Requires,
            RelationshipType::Enhances,
            RelationshipType::Replaces,
            RelationshipType::Sequence,
            RelationshipType::Correlation,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge between two records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRelationship {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: RelationshipType,
    /// Always at or above the relationship threshold when persisted.
    pub strength: f32,
    pub confidence: f32,
}

/// Group of same-kind records with high internal cohesion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeCluster {
    pub id: String,
    pub kind: KnowledgeKind,
    /// At least two members.
    pub member_ids: BTreeSet<String>,
    pub cohesion_score: f32,
    /// Capped at 5.0.
    pub acceleration_factor: f32,
}

/// Ordered chain of records between two high-importance nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub node_ids: Vec<String>,
    /// Sum of inverse edge strengths along the path.
    pub total_cost: f32,
    pub efficiency: f32,
}

impl LearningPath {
    pub fn start(&self) -> Option<&str> {
        self.node_ids.first().map(String::as_str)
    }

    pub fn end(&self) -> Option<&str> {
        self.node_ids.last().map(String::as_str)
    }

    pub fn hops(&self) -> usize {
        self.node_ids.len().saturating_sub(1)
    }
}
