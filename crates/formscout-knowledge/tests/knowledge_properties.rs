//! Cross-component properties of the knowledge base.

use std::sync::Arc;

use formscout_config::KnowledgeConfig;
use formscout_knowledge::{KnowledgeGraph, KnowledgeStore, UsageOutcome, field_pattern};
use formscout_protocols::{
    ErrorSolutionPayload, KnowledgeKind, KnowledgePayload, KnowledgeRecord, MetaLearningPayload,
    SitePatternPayload, SuccessStrategyPayload,
};
use tempfile::TempDir;

fn config(dir: &TempDir) -> KnowledgeConfig {
    KnowledgeConfig {
        database_path: dir.path().join("knowledge.db"),
        index_path: dir.path().join("vector_index.json"),
        embedding_dimension: 256,
        ..Default::default()
    }
}

fn insight(description: &str) -> KnowledgeRecord {
    KnowledgeRecord::new(KnowledgePayload::MetaLearning(MetaLearningPayload {
        description: description.to_string(),
        ..Default::default()
    }))
}

#[tokio::test]
async fn store_and_recall_by_pattern_type() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(config(&dir)).await.unwrap();

    let id = store
        .put(KnowledgeRecord::new(KnowledgePayload::SitePattern(SitePatternPayload {
            platform_type: "typeform".to_string(),
            pattern_data: "form_count=3".to_string(),
            ..Default::default()
        })))
        .await
        .unwrap();

    let hits = store
        .find_by_field_match(&field_pattern([("pattern_type", "typeform")]), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn usage_accounting_counts_every_call() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(config(&dir)).await.unwrap();
    let id = store.put(insight("retry navigation after reload")).await.unwrap();

    for _ in 0..3 {
        store
            .record_usage(&id, KnowledgeKind::MetaLearning, UsageOutcome::success())
            .await
            .unwrap();
    }

    let record = store.get_by_id(&id, Some(KnowledgeKind::MetaLearning)).await.unwrap();
    assert_eq!(record.stats.usage_count, 3);
    assert!((record.stats.success_rate - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn concurrent_usage_updates_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(KnowledgeStore::open(config(&dir)).await.unwrap());
    let id = store.put(insight("shared record")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let outcome = if i % 2 == 0 {
                UsageOutcome::success()
            } else {
                UsageOutcome::failure()
            };
            store.record_usage(&id, KnowledgeKind::MetaLearning, outcome).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(record.stats.usage_count, 10);
    assert!((record.stats.success_rate - 0.5).abs() < 1e-4);
}

#[tokio::test]
async fn upsert_does_not_duplicate_rows() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(config(&dir)).await.unwrap();

    let a = store.put(insight("same content")).await.unwrap();
    let b = store.put(insight("same content")).await.unwrap();
    assert_eq!(a, b);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_records(), 1);
}

#[tokio::test]
async fn similarity_follows_keyword_overlap() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::open(config(&dir)).await.unwrap();

    let ids = store
        .put_batch(vec![
            insight("alpha xray whiskey golf"),
            insight("alpha bravo charlie delta"),
            insight("hotel india juliet zulu"),
            insight("alpha bravo yankee zulu"),
        ])
        .await
        .unwrap();
    let (c, a, b) = (&ids[0], &ids[1], &ids[3]);

    let hits = store
        .find_by_similarity("alpha bravo charlie delta", None, 10)
        .await
        .unwrap();
    let order: Vec<&str> = hits.iter().filter_map(|h| h.record.id.as_deref()).collect();
    assert_eq!(order, vec![a.as_str(), b.as_str(), c.as_str()]);
    assert!(hits.windows(2).all(|w| w[0].similarity > w[1].similarity));
}

#[tokio::test]
async fn rebuilt_graph_respects_thresholds_and_cluster_size() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(KnowledgeStore::open(config(&dir)).await.unwrap());

    let mut records = Vec::new();
    for step in ["reload page", "wait longer", "scroll into view"] {
        records.push(
            KnowledgeRecord::new(KnowledgePayload::SuccessStrategy(SuccessStrategyPayload {
                strategy_name: "visibility recovery".to_string(),
                platform_type: "qualtrics".to_string(),
                description: step.to_string(),
                ..Default::default()
            }))
            .with_success_rate(0.8),
        );
    }
    records.push(
        KnowledgeRecord::new(KnowledgePayload::ErrorSolution(ErrorSolutionPayload {
            error_category: "VisibilityFailure".to_string(),
            solution_strategy: "visibility recovery".to_string(),
            platform_type: "qualtrics".to_string(),
            ..Default::default()
        }))
        .with_success_rate(0.8),
    );
    records.push(insight("unrelated observation"));
    store.put_batch(records).await.unwrap();

    let graph = KnowledgeGraph::new(store.clone());
    let snapshot = graph.rebuild().await.unwrap();
    let threshold = graph.relationship_threshold();

    let edges = store.relationships().await.unwrap();
    assert_eq!(edges.len(), snapshot.edges.len());
    assert!(!edges.is_empty());
    assert!(edges.iter().all(|e| e.strength >= threshold));

    let clusters = store.clusters().await.unwrap();
    assert!(!clusters.is_empty());
    assert!(clusters.iter().all(|c| c.member_ids.len() >= 2));
    assert!(clusters.iter().all(|c| c.kind != KnowledgeKind::ErrorSolution));
    assert!(clusters.iter().all(|c| c.acceleration_factor <= 5.0));

    // a second rebuild over the same data is identical
    let again = graph.rebuild().await.unwrap();
    assert_eq!(again.edges, snapshot.edges);
    assert_eq!(again.clusters, snapshot.clusters);
}
