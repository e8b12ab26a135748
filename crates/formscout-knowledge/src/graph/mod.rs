//! Knowledge graph built over every stored record.
//!
//! A rebuild is a full recomputation: pairwise relationship strengths,
//! typed edges above the threshold, per-node centrality and importance,
//! per-kind clusters and learning paths between the most important nodes.
//! The result replaces the persisted relationships and clusters wholesale.

mod paths;
mod rules;
mod scoring;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use formscout_protocols::{
    KnowledgeCluster, KnowledgeError, KnowledgeKind, KnowledgeRecord, KnowledgeRelationship,
    LearningPath,
};

use crate::store::KnowledgeStore;

pub use paths::{Adjacency, ShortestPath, shortest_path};
pub use rules::{Orientation, RELATIONSHIP_RULES, RelationshipRule, infer_relationship};
pub use scoring::{
    NodeFeatures, acceleration_factor, centrality, importance, relationship_strength,
    usage_weight,
};

/// Nodes above this importance are eligible as learning path endpoints.
pub const IMPORTANCE_THRESHOLD: f32 = 0.5;

/// A record as seen by the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: KnowledgeKind,
    pub platform: Option<String>,
    pub degree: usize,
    pub centrality: f32,
    pub importance: f32,
    pub confidence: f32,
}

/// Output of one rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<KnowledgeRelationship>,
    pub clusters: Vec<KnowledgeCluster>,
    /// Sorted by efficiency, best first.
    pub paths: Vec<LearningPath>,
    pub built_at: DateTime<Utc>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            clusters: Vec::new(),
            paths: Vec::new(),
            built_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Clusters ordered by acceleration factor, best first.
    pub fn top_clusters(&self, n: usize) -> Vec<&KnowledgeCluster> {
        let mut clusters: Vec<_> = self.clusters.iter().collect();
        clusters.sort_by(|a, b| {
            b.acceleration_factor
                .partial_cmp(&a.acceleration_factor)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        clusters.truncate(n);
        clusters
    }

    pub fn top_paths(&self, n: usize) -> &[LearningPath] {
        &self.paths[..n.min(self.paths.len())]
    }
}

/// Compute a snapshot from records. Pure; does not touch storage.
pub fn build_snapshot(records: &[KnowledgeRecord], threshold: f32, top_n: usize) -> GraphSnapshot {
    let mut features: Vec<NodeFeatures> = records.iter().map(NodeFeatures::from_record).collect();
    features.sort_by(|a, b| a.id.cmp(&b.id));
    features.dedup_by(|a, b| a.id == b.id);
    let total = features.len();

    let mut edges = Vec::new();
    let mut adjacency = Adjacency::default();
    for i in 0..total {
        for j in (i + 1)..total {
            let (a, b) = (&features[i], &features[j]);
            let strength = relationship_strength(a, b);
            if strength < threshold {
                continue;
            }
            let (relationship_type, orientation) = infer_relationship(a.kind, b.kind);
            let (source, target) = match orientation {
                Orientation::Forward => (a, b),
                Orientation::Reversed => (b, a),
            };
            edges.push(KnowledgeRelationship {
                source_id: source.id.clone(),
                target_id: target.id.clone(),
                relationship_type,
                strength,
                confidence: (a.stats.confidence_score + b.stats.confidence_score) / 2.0,
            });
            adjacency.add_edge(i, j, strength);
        }
    }

    let nodes: Vec<GraphNode> = features
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let degree = adjacency.degree(idx);
            let centrality = centrality(degree, total);
            GraphNode {
                id: f.id.clone(),
                kind: f.kind,
                platform: f.platform.clone(),
                degree,
                centrality,
                importance: importance(centrality, &f.stats),
                confidence: f.stats.confidence_score,
            }
        })
        .collect();

    let clusters = build_clusters(&features, &edges);
    let paths = build_paths(&nodes, &adjacency, top_n);

    GraphSnapshot {
        nodes,
        edges,
        clusters,
        paths,
        built_at: Utc::now(),
    }
}

fn build_clusters(features: &[NodeFeatures], edges: &[KnowledgeRelationship]) -> Vec<KnowledgeCluster> {
    let mut by_kind: BTreeMap<KnowledgeKind, Vec<&NodeFeatures>> = BTreeMap::new();
    for f in features {
        by_kind.entry(f.kind).or_default().push(f);
    }

    by_kind
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(kind, members)| {
            let member_ids: BTreeSet<String> = members.iter().map(|m| m.id.clone()).collect();
            let m = member_ids.len();
            let internal = edges
                .iter()
                .filter(|e| member_ids.contains(&e.source_id) && member_ids.contains(&e.target_id))
                .count();
            let max_pairs = m * (m - 1) / 2;
            let cohesion = (internal as f32 / max_pairs as f32).min(1.0);
            let mean_success =
                members.iter().map(|f| f.stats.success_rate).sum::<f32>() / m as f32;

            KnowledgeCluster {
                id: format!("cluster-{}", kind.as_str()),
                kind,
                member_ids,
                cohesion_score: cohesion,
                acceleration_factor: acceleration_factor(cohesion, m, mean_success),
            }
        })
        .collect()
}

fn build_paths(nodes: &[GraphNode], adjacency: &Adjacency, top_n: usize) -> Vec<LearningPath> {
    let mut important: Vec<usize> = (0..nodes.len())
        .filter(|&i| nodes[i].importance > IMPORTANCE_THRESHOLD)
        .collect();
    important.sort_by(|&a, &b| {
        nodes[b]
            .importance
            .partial_cmp(&nodes[a].importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| nodes[a].id.cmp(&nodes[b].id))
    });
    important.truncate(top_n);

    let mut paths = Vec::new();
    for (pos, &start) in important.iter().enumerate() {
        for &goal in &important[pos + 1..] {
            let Some(found) = shortest_path(adjacency, start, goal) else {
                continue;
            };
            let hops = found.strengths.len().max(1) as f32;
            paths.push(LearningPath {
                node_ids: found.nodes.iter().map(|&i| nodes[i].id.clone()).collect(),
                total_cost: found.total_cost,
                efficiency: found.mean_strength() / hops,
            });
        }
    }

    paths.sort_by(|a, b| {
        b.efficiency
            .partial_cmp(&a.efficiency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_ids.cmp(&b.node_ids))
    });
    paths
}

/// Rebuilds the graph over a store and installs the result on it.
pub struct KnowledgeGraph {
    store: Arc<KnowledgeStore>,
    relationship_threshold: f32,
    top_n: usize,
}

impl KnowledgeGraph {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        let config = store.config();
        let relationship_threshold = config.relationship_threshold;
        let top_n = config.learning_path_top_n;
        Self {
            store,
            relationship_threshold,
            top_n,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.relationship_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn relationship_threshold(&self) -> f32 {
        self.relationship_threshold
    }

    /// Recompute everything from the records currently stored.
    pub async fn rebuild(&self) -> Result<Arc<GraphSnapshot>, KnowledgeError> {
        let records = self.store.all_records().await?;
        debug!("Rebuilding knowledge graph over {} records", records.len());

        let snapshot = build_snapshot(&records, self.relationship_threshold, self.top_n);
        self.store
            .replace_graph(snapshot.edges.clone(), snapshot.clusters.clone())
            .await?;

        info!(
            "Knowledge graph rebuilt: {} nodes, {} edges, {} clusters, {} paths",
            snapshot.nodes.len(),
            snapshot.edges.len(),
            snapshot.clusters.len(),
            snapshot.paths.len()
        );

        let snapshot = Arc::new(snapshot);
        self.store.install_graph(snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
