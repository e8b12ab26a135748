//! Bounded in-memory record cache.

use std::num::NonZeroUsize;

use formscout_protocols::KnowledgeRecord;
use lru::LruCache;
use parking_lot::Mutex;

/// Least-recently-used cache of records keyed by id.
///
/// Not strongly consistent with storage: writers invalidate the affected
/// entry and the next read repopulates it.
pub struct RecordCache {
    inner: Mutex<LruCache<String, KnowledgeRecord>>,
}

impl RecordCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, id: &str) -> Option<KnowledgeRecord> {
        self.inner.lock().get(id).cloned()
    }

    pub fn insert(&self, record: KnowledgeRecord) {
        if let Some(id) = record.id.clone() {
            self.inner.lock().put(id, record);
        }
    }

    pub fn invalidate(&self, id: &str) {
        self.inner.lock().pop(id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formscout_protocols::{KnowledgePayload, MetaLearningPayload};

    fn record(id: &str) -> KnowledgeRecord {
        let mut record = KnowledgeRecord::new(KnowledgePayload::MetaLearning(MetaLearningPayload {
            description: id.to_string(),
            ..Default::default()
        }));
        record.id = Some(id.to_string());
        record
    }

    #[test]
    fn test_insert_and_get() {
        let cache = RecordCache::new(4);
        cache.insert(record("a"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = RecordCache::new(2);
        cache.insert(record("a"));
        cache.insert(record("b"));
        assert!(cache.get("a").is_some());
        cache.insert(record("c"));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate() {
        let cache = RecordCache::new(2);
        cache.insert(record("a"));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_record_without_id_is_ignored() {
        let cache = RecordCache::new(2);
        let mut r = record("a");
        r.id = None;
        cache.insert(r);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = RecordCache::new(0);
        cache.insert(record("a"));
        cache.insert(record("b"));
        assert_eq!(cache.len(), 1);
    }
}
