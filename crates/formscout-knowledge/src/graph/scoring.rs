//! Pairwise relationship strength and per-node importance.

use formscout_protocols::{KnowledgeKind, KnowledgeRecord, KnowledgeStats};
use formscout_vector::Embedding;

/// Usage counts at or above this saturate the usage terms.
const USAGE_SATURATION: f32 = 100.0;

/// The parts of a record the graph scores on.
#[derive(Debug, Clone)]
pub struct NodeFeatures {
    pub id: String,
    pub kind: KnowledgeKind,
    pub platform: Option<String>,
    pub embedding: Embedding,
    pub stats: KnowledgeStats,
}

impl NodeFeatures {
    pub fn from_record(record: &KnowledgeRecord) -> Self {
        Self {
            id: record.resolved_id(),
            kind: record.kind(),
            platform: record.payload.platform_type().map(str::to_string),
            embedding: Embedding::new(record.embedding.clone()),
            stats: record.stats,
        }
    }
}

/// Log-scaled usage in [0, 1].
pub fn usage_weight(usage: u64) -> f32 {
    ((1.0 + usage as f32).ln() / (1.0 + USAGE_SATURATION).ln()).min(1.0)
}

/// Strength of the relationship between two nodes, in [0, 1].
///
/// 0.4 cosine similarity, 0.2 shared platform, 0.1 confidence closeness,
/// up to 0.2 combined usage, 0.1 success-rate closeness.
pub fn relationship_strength(a: &NodeFeatures, b: &NodeFeatures) -> f32 {
    let similarity = a.embedding.cosine_similarity(&b.embedding).max(0.0);

    let same_platform = match (&a.platform, &b.platform) {
        (Some(pa), Some(pb)) if pa.eq_ignore_ascii_case(pb) => 0.2,
        _ => 0.0,
    };

    let confidence_closeness =
        0.1 * (1.0 - (a.stats.confidence_score - b.stats.confidence_score).abs());
    let usage = 0.2 * usage_weight(a.stats.usage_count + b.stats.usage_count);
    let success_closeness = 0.1 * (1.0 - (a.stats.success_rate - b.stats.success_rate).abs());

    (0.4 * similarity + same_platform + confidence_closeness + usage + success_closeness)
        .clamp(0.0, 1.0)
}

/// `degree / (total_nodes - 1)`, zero for a single-node graph.
pub fn centrality(degree: usize, total_nodes: usize) -> f32 {
    if total_nodes < 2 {
        return 0.0;
    }
    (degree as f32 / (total_nodes - 1) as f32).min(1.0)
}

/// Importance of a node, in [0, 1].
pub fn importance(centrality: f32, stats: &KnowledgeStats) -> f32 {
    (0.5 * centrality
        + 0.1 * usage_weight(stats.usage_count)
        + 0.3 * stats.success_rate
        + 0.2 * stats.confidence_score)
        .clamp(0.0, 1.0)
}

/// Speed-up a cluster is expected to give, capped at 5.
pub fn acceleration_factor(cohesion: f32, members: usize, mean_success: f32) -> f32 {
    (1.0 + cohesion * (1.0 + members as f32).ln() + mean_success).min(5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: KnowledgeKind, platform: Option<&str>, vector: Vec<f32>) -> NodeFeatures {
        NodeFeatures {
            id: id.to_string(),
            kind,
            platform: platform.map(str::to_string),
            embedding: Embedding::new(vector),
            stats: KnowledgeStats::default(),
        }
    }

    #[test]
    fn test_usage_weight_bounds() {
        assert_eq!(usage_weight(0), 0.0);
        assert!(usage_weight(10) > 0.0 && usage_weight(10) < 1.0);
        assert!((usage_weight(100) - 1.0).abs() < 1e-6);
        assert_eq!(usage_weight(10_000), 1.0);
    }

    #[test]
    fn test_identical_nodes_same_platform() {
        let a = node("a", KnowledgeKind::SitePattern, Some("typeform"), vec![1.0, 0.0]);
        let b = node("b", KnowledgeKind::SitePattern, Some("Typeform"), vec![1.0, 0.0]);
        // 0.4 + 0.2 + 0.1 + 0 + 0.1
        assert!((relationship_strength(&a, &b) - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_unrelated_nodes() {
        let a = node("a", KnowledgeKind::SitePattern, Some("typeform"), vec![1.0, 0.0]);
        let b = node("b", KnowledgeKind::ErrorSolution, None, vec![0.0, 1.0]);
        assert!((relationship_strength(&a, &b) - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_strength_clamped() {
        let mut a = node("a", KnowledgeKind::SitePattern, Some("x"), vec![1.0]);
        let mut b = node("b", KnowledgeKind::SitePattern, Some("x"), vec![1.0]);
        a.stats.usage_count = 500;
        b.stats.usage_count = 500;
        let s = relationship_strength(&a, &b);
        assert!(s <= 1.0);
        assert!((s - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_centrality() {
        assert_eq!(centrality(0, 1), 0.0);
        assert_eq!(centrality(2, 3), 1.0);
        assert!((centrality(1, 5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_importance() {
        let stats = KnowledgeStats {
            confidence_score: 1.0,
            usage_count: 0,
            success_rate: 1.0,
        };
        assert!((importance(0.0, &stats) - 0.5).abs() < 1e-6);
        assert!((importance(1.0, &stats) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_acceleration_capped() {
        assert!((acceleration_factor(0.0, 2, 0.0) - 1.0).abs() < 1e-6);
        assert_eq!(acceleration_factor(1.0, 1_000, 1.0), 5.0);
    }
}
