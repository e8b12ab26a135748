use super::*;
use crate::graph::KnowledgeGraph;
use crate::recommend::{RecommendationContext, RecommendationSource};
use crate::search::{FieldPattern, field_pattern};
use formscout_protocols::{
    AutomationRulePayload, ErrorSolutionPayload, KnowledgePayload, MetaLearningPayload,
    SitePatternPayload,
};
use tempfile::TempDir;

fn config() -> KnowledgeConfig {
    KnowledgeConfig {
        embedding_dimension: 256,
        ..Default::default()
    }
}

fn file_config(dir: &std::path::Path) -> KnowledgeConfig {
    KnowledgeConfig {
        database_path: dir.join("knowledge.db"),
        index_path: dir.join("index").join("vectors.json"),
        ..config()
    }
}

fn site(platform: &str, data: &str) -> KnowledgeRecord {
    KnowledgeRecord::new(KnowledgePayload::SitePattern(SitePatternPayload {
        platform_type: platform.to_string(),
        pattern_data: data.to_string(),
        ..Default::default()
    }))
}

fn insight(description: &str) -> KnowledgeRecord {
    KnowledgeRecord::new(KnowledgePayload::MetaLearning(MetaLearningPayload {
        description: description.to_string(),
        ..Default::default()
    }))
}

async fn store() -> KnowledgeStore {
    KnowledgeStore::in_memory(config()).await.unwrap()
}

#[tokio::test]
async fn test_put_assigns_content_id() {
    let store = store().await;
    let record = site("typeform", "form_count=3");
    let expected = record.content_id();

    let id = store.put(record).await.unwrap();
    assert_eq!(id, expected);
    assert!(id.starts_with("kn-"));
}

#[tokio::test]
async fn test_put_keeps_explicit_id() {
    let store = store().await;
    let mut record = site("typeform", "x");
    record.id = Some("custom-id".to_string());

    let id = store.put(record).await.unwrap();
    assert_eq!(id, "custom-id");
    let fetched = store.get_by_id("custom-id", None).await.unwrap();
    assert_eq!(fetched.id.as_deref(), Some("custom-id"));
}

#[tokio::test]
async fn test_put_twice_is_idempotent() {
    let store = store().await;
    let first = store.put(site("typeform", "form_count=3")).await.unwrap();
    let second = store.put(site("typeform", "form_count=3")).await.unwrap();

    assert_eq!(first, second);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.records[&KnowledgeKind::SitePattern], 1);
    assert_eq!(stats.indexed_vectors, 1);
}

#[tokio::test]
async fn test_kind_is_immutable() {
    let store = store().await;
    let mut a = site("typeform", "x");
    a.id = Some("shared".to_string());
    store.put(a).await.unwrap();

    let mut b = insight("something else");
    b.id = Some("shared".to_string());
    let err = store.put(b).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_get_by_id_not_found() {
    let store = store().await;
    let err = store.get_by_id("kn-missing", None).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::NotFound(_)));
}

#[tokio::test]
async fn test_get_by_id_with_wrong_hint() {
    let store = store().await;
    let id = store.put(site("typeform", "x")).await.unwrap();
    let err = store
        .get_by_id(&id, Some(KnowledgeKind::ErrorSolution))
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::NotFound(_)));
    assert!(store.get_by_id(&id, Some(KnowledgeKind::SitePattern)).await.is_ok());
}

#[tokio::test]
async fn test_get_by_id_counts_access() {
    let store = store().await;
    let id = store.put(site("typeform", "x")).await.unwrap();

    let first = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(first.access_count, 1);
    assert!(first.last_accessed.is_some());

    let second = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(second.access_count, 2);
    assert_eq!(second.embedding.len(), 256);
}

#[tokio::test]
async fn test_record_usage_updates_success_rate() {
    let store = store().await;
    let id = store.put(site("typeform", "x")).await.unwrap();

    store
        .record_usage(&id, KnowledgeKind::SitePattern, UsageOutcome::success())
        .await
        .unwrap();
    store
        .record_usage(
            &id,
            KnowledgeKind::SitePattern,
            UsageOutcome::failure().with_context("https://example.com").with_metric("ms", 120),
        )
        .await
        .unwrap();

    let record = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(record.stats.usage_count, 2);
    assert!((record.stats.success_rate - 0.5).abs() < 1e-5);
    assert_eq!(store.stats().await.unwrap().usage_events, 2);
}

#[tokio::test]
async fn test_record_usage_missing_record() {
    let store = store().await;
    let err = store
        .record_usage("kn-missing", KnowledgeKind::SitePattern, UsageOutcome::success())
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::NotFound(_)));
    assert_eq!(store.stats().await.unwrap().usage_events, 0);
}

#[tokio::test]
async fn test_upsert_keeps_counters() {
    let store = store().await;
    let id = store.put(site("typeform", "x").with_success_rate(1.0)).await.unwrap();
    store
        .record_usage(&id, KnowledgeKind::SitePattern, UsageOutcome::failure())
        .await
        .unwrap();

    store
        .put(site("typeform", "x").with_success_rate(1.0).with_confidence(0.9))
        .await
        .unwrap();

    let record = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(record.stats.usage_count, 1);
    assert!(record.stats.success_rate.abs() < 1e-5);
    assert!((record.stats.confidence_score - 0.9).abs() < 1e-5);
}

#[tokio::test]
async fn test_unembeddable_payload_still_stored() {
    let store = store().await;
    let huge = "word ".repeat(250_000);
    let id = store.put(insight(&huge)).await.unwrap();

    let record = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(record.embedding.len(), 256);
    assert!(record.embedding.iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_field_match_is_case_insensitive() {
    let store = store().await;
    let id = store.put(site("typeform", "form_count=3")).await.unwrap();

    let hits = store
        .find_by_field_match(&field_pattern([("platform_type", "TypeForm")]), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_deref(), Some(id.as_str()));

    let hits = store
        .find_by_field_match(&field_pattern([("pattern_data", "COUNT=3")]), None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_field_match_requires_all_fields() {
    let store = store().await;
    store.put(site("typeform", "form_count=3")).await.unwrap();

    let hits = store
        .find_by_field_match(
            &field_pattern([("platform_type", "typeform"), ("pattern_data", "multi_step")]),
            None,
        )
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_field_match_searches_only_allowing_kinds() {
    let store = store().await;
    store.put(site("qualtrics", "matrix")).await.unwrap();
    store
        .put(KnowledgeRecord::new(KnowledgePayload::ErrorSolution(ErrorSolutionPayload {
            error_category: "navigation".to_string(),
            platform_type: "qualtrics".to_string(),
            ..Default::default()
        })))
        .await
        .unwrap();

    let by_platform = store
        .find_by_field_match(&field_pattern([("platform_type", "qualtrics")]), None)
        .await
        .unwrap();
    assert_eq!(by_platform.len(), 2);

    let by_category = store
        .find_by_field_match(&field_pattern([("error_category", "navigation")]), None)
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].kind(), KnowledgeKind::ErrorSolution);
}

#[tokio::test]
async fn test_field_match_rejects_bad_input() {
    let store = store().await;
    let err = store
        .find_by_field_match(&FieldPattern::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::InvalidInput(_)));

    let err = store
        .find_by_field_match(
            &field_pattern([("error_category", "x")]),
            Some(KnowledgeKind::SitePattern),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KnowledgeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_field_match_ordering_and_limit() {
    let store = KnowledgeStore::in_memory(KnowledgeConfig {
        field_match_limit: 2,
        ..config()
    })
    .await
    .unwrap();

    store.put(site("jotform", "a").with_confidence(0.2)).await.unwrap();
    let best = store.put(site("jotform", "b").with_confidence(0.9)).await.unwrap();
    let used = store.put(site("jotform", "c").with_confidence(0.5)).await.unwrap();
    let unused = store.put(site("jotform", "d").with_confidence(0.5)).await.unwrap();
    store
        .record_usage(&used, KnowledgeKind::SitePattern, UsageOutcome::success())
        .await
        .unwrap();

    let hits = store
        .find_by_field_match(&field_pattern([("platform_type", "jotform")]), None)
        .await
        .unwrap();
    let ids: Vec<_> = hits.iter().filter_map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![best, used]);
    assert!(!ids.contains(&unused));
}

#[tokio::test]
async fn test_similarity_kind_filter_and_threshold() {
    let store = store().await;
    store.put(insight("alpha bravo charlie delta")).await.unwrap();
    store.put(insight("golf hotel india juliet")).await.unwrap();
    store.put(site("alpha", "bravo charlie")).await.unwrap();

    let hits = store
        .find_by_similarity("alpha bravo charlie delta", Some(KnowledgeKind::MetaLearning), 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].similarity > 0.1);

    let all = store
        .find_by_similarity("alpha bravo charlie delta", None, 10)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].similarity >= all[1].similarity);
}

#[tokio::test]
async fn test_similarity_empty_query() {
    let store = store().await;
    store.put(insight("alpha bravo charlie delta")).await.unwrap();
    assert!(store.find_by_similarity("", None, 10).await.unwrap().is_empty());
    assert!(store.find_by_similarity("alpha", None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_by_kind() {
    let store = store().await;
    store.put(site("typeform", "a")).await.unwrap();
    store.put(site("typeform", "b")).await.unwrap();
    store.put(insight("other")).await.unwrap();

    assert_eq!(store.list_by_kind(KnowledgeKind::SitePattern).await.unwrap().len(), 2);
    assert_eq!(store.all_records().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let id = {
        let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
        let ids = store
            .put_batch(vec![site("typeform", "alpha bravo"), insight("charlie delta")])
            .await
            .unwrap();
        ids[0].clone()
    };
    assert!(dir.path().join("index").join("vectors.json").exists());

    let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
    assert_eq!(store.stats().await.unwrap().indexed_vectors, 2);
    let record = store.get_by_id(&id, None).await.unwrap();
    assert_eq!(record.kind(), KnowledgeKind::SitePattern);

    let hits = store.find_by_similarity("alpha bravo", None, 5).await.unwrap();
    assert_eq!(hits[0].record.id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn test_corrupt_index_rebuilt_from_storage() {
    let dir = TempDir::new().unwrap();
    {
        let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
        store.put_batch(vec![insight("alpha bravo charlie")]).await.unwrap();
    }
    std::fs::write(dir.path().join("index").join("vectors.json"), b"not json").unwrap();

    let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
    assert_eq!(store.stats().await.unwrap().indexed_vectors, 1);
    assert_eq!(store.find_by_similarity("alpha bravo", None, 5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_index_rebuilt_from_storage() {
    let dir = TempDir::new().unwrap();
    {
        let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
        store.put(insight("alpha bravo charlie")).await.unwrap();
    }
    let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
    assert_eq!(store.stats().await.unwrap().indexed_vectors, 1);
}

#[tokio::test]
async fn test_graph_rebuild_persists_and_restores() {
    let dir = TempDir::new().unwrap();
    let edges = {
        let store = Arc::new(KnowledgeStore::open(file_config(dir.path())).await.unwrap());
        for i in 0..3 {
            store
                .put(site("typeform", &format!("multi step survey page {}", i)).with_success_rate(0.9))
                .await
                .unwrap();
        }
        let snapshot = KnowledgeGraph::new(store.clone()).rebuild().await.unwrap();
        assert!(snapshot.edges.iter().all(|e| e.strength >= 0.6));
        assert!(snapshot.clusters.iter().all(|c| c.member_ids.len() >= 2));
        assert_eq!(store.relationships().await.unwrap().len(), snapshot.edges.len());
        assert_eq!(store.clusters().await.unwrap().len(), snapshot.clusters.len());
        snapshot.edges.len()
    };
    assert!(edges > 0);

    let store = KnowledgeStore::open(file_config(dir.path())).await.unwrap();
    let restored = store.graph_snapshot().unwrap();
    assert_eq!(restored.edges.len(), edges);
    assert_eq!(restored.clusters.len(), 1);
}

#[tokio::test]
async fn test_rebuild_replaces_previous_graph() {
    let store = Arc::new(store().await);
    store.put(site("typeform", "a b c")).await.unwrap();
    store.put(site("typeform", "a b c d")).await.unwrap();

    let graph = KnowledgeGraph::new(store.clone());
    graph.rebuild().await.unwrap();
    let strict = KnowledgeGraph::new(store.clone()).with_threshold(1.0);
    let snapshot = strict.rebuild().await.unwrap();

    assert!(snapshot.edges.is_empty());
    assert_eq!(store.relationships().await.unwrap().len(), 0);
    assert_eq!(store.clusters().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recommend_similarity_only() {
    let store = store().await;
    store.put(insight("alpha bravo charlie delta")).await.unwrap();
    store.put(insight("golf hotel india juliet")).await.unwrap();

    let recs = store
        .recommend(&RecommendationContext::new("alpha bravo charlie delta", 5))
        .await
        .unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].source, RecommendationSource::Similarity);
}

#[tokio::test]
async fn test_recommend_merges_sources() {
    let store = Arc::new(store().await);
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            store
                .put(
                    site("typeform", &format!("welcome screen question {}", i))
                        .with_confidence(0.9)
                        .with_success_rate(0.9),
                )
                .await
                .unwrap(),
        );
    }
    store
        .put(KnowledgeRecord::new(KnowledgePayload::AutomationRule(AutomationRulePayload {
            rule_name: "selector_preference".to_string(),
            platform_type: "surveymonkey".to_string(),
            ..Default::default()
        })))
        .await
        .unwrap();
    KnowledgeGraph::new(store.clone()).rebuild().await.unwrap();

    let recs = store
        .recommend(&RecommendationContext::new("welcome screen", 10).with_platform("typeform"))
        .await
        .unwrap();

    assert!(!recs.is_empty());
    assert!(recs.len() <= 10);
    let mut seen: Vec<_> = recs.iter().filter_map(|r| r.record.id.clone()).collect();
    seen.sort();
    let before = seen.len();
    seen.dedup();
    assert_eq!(before, seen.len());
    assert!(recs.iter().all(|r| r.record.payload.platform_type() == Some("typeform")));
    assert!(recs.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    assert!(recs.iter().any(|r| r.source != RecommendationSource::Similarity));

    let capped = store
        .recommend(&RecommendationContext::new("welcome screen", 1))
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn test_recommend_zero_limit() {
    let store = store().await;
    store.put(insight("alpha")).await.unwrap();
    assert!(store.recommend(&RecommendationContext::new("alpha", 0)).await.unwrap().is_empty());
}
