//! Recommendation composition over clusters, learning paths and
//! similarity matches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use formscout_protocols::{KnowledgeError, KnowledgeKind, KnowledgeRecord};

use crate::store::KnowledgeStore;

const TOP_CLUSTERS: usize = 3;
const TOP_PATHS: usize = 3;

/// What the caller is trying to do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationContext {
    /// Free text describing the situation, matched by similarity.
    pub query: String,
    /// Restrict to records for this platform (records without one pass).
    pub platform: Option<String>,
    pub kind: Option<KnowledgeKind>,
    pub limit: usize,
}

impl RecommendationContext {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            ..Default::default()
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_kind(mut self, kind: KnowledgeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    fn accepts(&self, record: &KnowledgeRecord) -> bool {
        if self.kind.is_some_and(|k| k != record.kind()) {
            return false;
        }
        match (&self.platform, record.payload.platform_type()) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Cluster,
    LearningPath,
    Similarity,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub record: KnowledgeRecord,
    /// Source score scaled by the record's own confidence.
    pub confidence: f32,
    pub source: RecommendationSource,
    pub reason: String,
}

struct Candidate {
    id: String,
    score: f32,
    source: RecommendationSource,
    reason: String,
}

impl KnowledgeStore {
    /// Merge cluster, learning-path and similarity suggestions into one
    /// deduplicated list sorted by confidence.
    pub async fn recommend(
        &self,
        context: &RecommendationContext,
    ) -> Result<Vec<Recommendation>, KnowledgeError> {
        if context.limit == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();

        if let Some(graph) = self.graph_snapshot() {
            for cluster in graph
                .top_clusters(graph.clusters.len())
                .into_iter()
                .filter(|c| context.kind.is_none_or(|k| k == c.kind))
                .take(TOP_CLUSTERS)
            {
                for id in &cluster.member_ids {
                    candidates.push(Candidate {
                        id: id.clone(),
                        score: cluster.cohesion_score,
                        source: RecommendationSource::Cluster,
                        reason: format!(
                            "member of {} (acceleration {:.2})",
                            cluster.id, cluster.acceleration_factor
                        ),
                    });
                }
            }

            for path in graph.top_paths(TOP_PATHS) {
                for id in &path.node_ids {
                    candidates.push(Candidate {
                        id: id.clone(),
                        score: path.efficiency.clamp(0.0, 1.0),
                        source: RecommendationSource::LearningPath,
                        reason: format!(
                            "on learning path {} -> {}",
                            path.start().unwrap_or_default(),
                            path.end().unwrap_or_default()
                        ),
                    });
                }
            }
        }

        let similar = self
            .find_by_similarity(&context.query, context.kind, context.limit)
            .await?;

        let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
        let mut records = self.load_records(&ids).await?;
        for m in similar {
            let id = m.record.resolved_id();
            candidates.push(Candidate {
                id: id.clone(),
                score: m.similarity,
                source: RecommendationSource::Similarity,
                reason: format!("similar to query ({:.2})", m.similarity),
            });
            records.insert(id, m.record);
        }

        let mut best: HashMap<String, Recommendation> = HashMap::new();
        for candidate in candidates {
            let Some(record) = records.get(&candidate.id) else {
                continue;
            };
            if !context.accepts(record) {
                continue;
            }
            let confidence = candidate.score * record.stats.confidence_score;
            let replace = best
                .get(&candidate.id)
                .is_none_or(|existing| confidence > existing.confidence);
            if replace {
                best.insert(
                    candidate.id,
                    Recommendation {
                        record: record.clone(),
                        confidence,
                        source: candidate.source,
                        reason: candidate.reason,
                    },
                );
            }
        }

        let mut recommendations: Vec<Recommendation> = best.into_values().collect();
        recommendations.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        recommendations.truncate(context.limit);
        Ok(recommendations)
    }
}
