use super::*;

fn emb(values: Vec<f32>) -> Embedding {
    Embedding::new(values)
}

#[test]
fn test_index_insert_and_get() {
    let index = VectorIndex::new(3);
    index.insert("test", "site_pattern", emb(vec![1.0, 0.0, 0.0]));

    let retrieved = index.get("test").unwrap();
    assert_eq!(retrieved.vector, vec![1.0, 0.0, 0.0]);
    assert_eq!(retrieved.kind, "site_pattern");
    assert!(index.contains("test"));
}

#[test]
fn test_index_insert_replaces() {
    let index = VectorIndex::new(3);
    index.insert("test", "site_pattern", emb(vec![1.0, 0.0, 0.0]));
    index.insert("test", "site_pattern", emb(vec![0.0, 1.0, 0.0]));

    assert_eq!(index.len(), 1);
    assert_eq!(index.get("test").unwrap().vector, vec![0.0, 1.0, 0.0]);
}

#[test]
fn test_index_remove() {
    let index = VectorIndex::new(3);
    index.insert("test", "k", emb(vec![1.0, 0.0, 0.0]));
    assert!(index.remove("test").is_some());
    assert!(index.get("test").is_none());
    assert!(index.remove("test").is_none());
}

#[test]
fn test_index_search_sorted() {
    let index = VectorIndex::new(3);
    index.insert("a", "k", emb(vec![1.0, 0.0, 0.0]));
    index.insert("b", "k", emb(vec![0.9, 0.1, 0.0]));
    index.insert("c", "k", emb(vec![0.5, 0.5, 0.0]));
    index.insert("d", "k", emb(vec![0.0, 1.0, 0.0]));

    let results = index.search(&emb(vec![1.0, 0.0, 0.0]), None, 10, 0.1);
    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!((results[0].score - 1.0).abs() < 0.001);
}

#[test]
fn test_index_search_threshold_is_exclusive() {
    let index = VectorIndex::new(2);
    index.insert("a", "k", emb(vec![1.0, 0.0]));
    index.insert("b", "k", emb(vec![0.0, 1.0]));

    let results = index.search(&emb(vec![1.0, 0.0]), None, 10, 1.0);
    assert!(results.is_empty());

    let results = index.search(&emb(vec![1.0, 0.0]), None, 10, 0.0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}

#[test]
fn test_index_search_kind_filter() {
    let index = VectorIndex::new(2);
    index.insert("a", "site_pattern", emb(vec![1.0, 0.0]));
    index.insert("b", "error_solution", emb(vec![1.0, 0.1]));

    let results = index.search(&emb(vec![1.0, 0.0]), Some("error_solution"), 10, 0.1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "b");
    assert_eq!(results[0].kind, "error_solution");
}

#[test]
fn test_index_search_limit() {
    let index = VectorIndex::new(2);
    for i in 0..5 {
        index.insert(format!("id{}", i), "k", emb(vec![1.0, i as f32 * 0.1]));
    }
    assert_eq!(index.search(&emb(vec![1.0, 0.0]), None, 2, 0.1).len(), 2);
}

#[test]
fn test_index_search_zero_query() {
    let index = VectorIndex::new(2);
    index.insert("a", "k", emb(vec![1.0, 0.0]));
    assert!(index.search(&Embedding::zeros(2), None, 10, -1.0).is_empty());
}

#[test]
fn test_index_len_and_clear() {
    let index = VectorIndex::new(2);
    assert!(index.is_empty());
    index.insert("a", "k", emb(vec![1.0, 0.0]));
    index.insert("b", "k", emb(vec![0.0, 1.0]));
    assert_eq!(index.len(), 2);
    index.clear();
    assert!(index.is_empty());
}
