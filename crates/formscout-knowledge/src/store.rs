//! SQLite-backed knowledge store with a parallel vector index.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use formscout_config::KnowledgeConfig;
use formscout_protocols::{
    KnowledgeCluster, KnowledgeError, KnowledgeKind, KnowledgeRecord, KnowledgeRelationship,
    StorageError,
};
use formscout_vector::{Embedding, EmbeddingCodec, HashEmbeddingCodec, IndexFileError, VectorIndex};

use crate::cache::RecordCache;
use crate::graph::GraphSnapshot;
use crate::rows;
use crate::schema::init_schema;

pub(crate) fn db_err(e: tokio_rusqlite::Error) -> KnowledgeError {
    KnowledgeError::Storage(StorageError::Database(e.to_string()))
}

/// Outcome reported when a record was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageOutcome {
    pub success: bool,
    /// Where the record was used (site, field, plan step).
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

impl UsageOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            context: String::new(),
            metrics: serde_json::Map::new(),
        }
    }

    pub fn failure() -> Self {
        Self {
            success: false,
            ..Self::success()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }
}

/// A similarity search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatch {
    pub record: KnowledgeRecord,
    pub similarity: f32,
}

/// Counts reported by [`KnowledgeStore::stats`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub records: BTreeMap<KnowledgeKind, u64>,
    pub relationships: u64,
    pub clusters: u64,
    pub usage_events: u64,
    pub indexed_vectors: usize,
    pub cached_records: usize,
}

impl StoreStats {
    pub fn total_records(&self) -> u64 {
        self.records.values().sum()
    }
}

/// Persistent store of knowledge records.
///
/// Records live in one SQLite table per kind. Embeddings are kept both in
/// the `embeddings` table and in an in-memory [`VectorIndex`] that is
/// snapshotted to `index_path` on [`flush_index`](Self::flush_index).
pub struct KnowledgeStore {
    conn: Connection,
    codec: Arc<dyn EmbeddingCodec>,
    pub(crate) index: VectorIndex,
    pub(crate) cache: RecordCache,
    config: KnowledgeConfig,
    index_path: Option<PathBuf>,
    graph: RwLock<Option<Arc<GraphSnapshot>>>,
}

impl KnowledgeStore {
    /// Open (or create) the database and index files named in `config`.
    pub async fn open(config: KnowledgeConfig) -> Result<Self, KnowledgeError> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(StorageError::Io)?;
            }
        }

        let conn = Connection::open(config.database_path.clone())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let index_path = Some(config.index_path.clone());
        Self::init(conn, config, index_path).await
    }

    /// Create a store backed by an in-memory database. The vector index is
    /// never written to disk.
    pub async fn in_memory(config: KnowledgeConfig) -> Result<Self, KnowledgeError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Self::init(conn, config, None).await
    }

    async fn init(
        conn: Connection,
        config: KnowledgeConfig,
        index_path: Option<PathBuf>,
    ) -> Result<Self, KnowledgeError> {
        conn.call(|conn| Ok(init_schema(conn)?)).await.map_err(db_err)?;

        let dimension = config.embedding_dimension;
        let index = match &index_path {
            Some(path) => match VectorIndex::load(path, dimension) {
                Ok(index) => {
                    debug!("Loaded {} vectors from {}", index.len(), path.display());
                    index
                }
                Err(IndexFileError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No vector index at {}, starting empty", path.display());
                    VectorIndex::new(dimension)
                }
                Err(e) => {
                    warn!("Ignoring unreadable vector index {}: {}", path.display(), e);
                    VectorIndex::new(dimension)
                }
            },
            None => VectorIndex::new(dimension),
        };

        let store = Self {
            conn,
            codec: Arc::new(HashEmbeddingCodec::new(dimension)),
            index,
            cache: RecordCache::new(config.cache_capacity),
            config,
            index_path,
            graph: RwLock::new(None),
        };

        store.reconcile_index().await?;
        store.restore_graph().await?;
        Ok(store)
    }

    /// Rebuild the vector index from the `embeddings` table when it is out
    /// of step with storage.
    async fn reconcile_index(&self) -> Result<(), KnowledgeError> {
        let dimension = self.index.dimension();
        let stored: Vec<(String, String, String)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT record_id, kind, vector FROM embeddings WHERE dimension = ?1",
                )?;
                let rows = stmt
                    .query_map([dimension as i64], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(db_err)?;

        let in_sync = stored.len() == self.index.len()
            && stored.iter().all(|(id, _, _)| self.index.contains(id));
        if in_sync {
            return Ok(());
        }

        self.index.clear();
        for (id, kind, vector) in stored {
            match serde_json::from_str::<Vec<f32>>(&vector) {
                Ok(v) => self.index.insert(id, kind, Embedding::new(v)),
                Err(e) => warn!("Skipping unreadable embedding for {}: {}", id, e),
            }
        }
        info!("Rebuilt vector index from storage ({} vectors)", self.index.len());
        Ok(())
    }

    async fn restore_graph(&self) -> Result<(), KnowledgeError> {
        let (edges, clusters) = self
            .conn
            .call(|conn| Ok((rows::load_relationships(conn)?, rows::load_clusters(conn)?)))
            .await
            .map_err(db_err)?;

        if edges.is_empty() && clusters.is_empty() {
            return Ok(());
        }

        let mut snapshot = GraphSnapshot::empty();
        snapshot.edges = edges;
        snapshot.clusters = clusters;
        *self.graph.write() = Some(Arc::new(snapshot));
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn EmbeddingCodec {
        self.codec.as_ref()
    }

    /// Embed `text`, falling back to the zero vector on failure.
    pub(crate) fn embed_or_zero(&self, text: &str, context: &str) -> Embedding {
        match self.codec.embed(text) {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Embedding failed for {}: {}; using zero vector", context, e);
                Embedding::zeros(self.codec.dimension())
            }
        }
    }

    /// Insert or update a record, returning its id.
    ///
    /// The id is content-derived when absent. Re-putting identical content
    /// updates the row in place. A record's kind can never change.
    pub async fn put(&self, mut record: KnowledgeRecord) -> Result<String, KnowledgeError> {
        record.payload.normalize();
        let id = record.resolved_id();
        record.id = Some(id.clone());
        let kind = record.kind();

        let embedding = self.embed_or_zero(&record.payload.embedding_text(), &id);

        let payload_json = serde_json::to_string(&record.payload)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;
        let vector_json = serde_json::to_string(&embedding.vector)?;
        let now = Utc::now().to_rfc3339();

        let fields = kind.searchable_fields();
        let mut values: Vec<Value> = Vec::with_capacity(fields.len() + 10);
        values.push(Value::Text(id.clone()));
        for field in fields {
            values.push(Value::Text(record.payload.field(field).unwrap_or_default()));
        }
        values.push(Value::Real(record.stats.confidence_score as f64));
        values.push(Value::Integer(record.stats.usage_count as i64));
        values.push(Value::Real(record.stats.success_rate as f64));
        values.push(Value::Text(record.created_at.to_rfc3339()));
        values.push(Value::Text(payload_json));
        values.push(Value::Text(metadata_json));
        values.push(Value::Text(id.clone()));

        let upsert = upsert_sql(kind);
        let dimension = embedding.dimension as i64;
        let record_id = id.clone();

        let existing = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(existing) = rows::registered_kind(&tx, &record_id)? {
                    if existing != kind {
                        return Ok(Some(existing));
                    }
                }

                tx.execute(
                    "INSERT OR IGNORE INTO knowledge_ids (id, kind) VALUES (?1, ?2)",
                    params![record_id, kind.as_str()],
                )?;
                tx.execute(
                    "INSERT INTO embeddings (record_id, kind, dimension, vector, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(record_id) DO UPDATE SET
                        dimension = excluded.dimension,
                        vector = excluded.vector,
                        updated_at = excluded.updated_at",
                    params![record_id, kind.as_str(), dimension, vector_json, now],
                )?;
                tx.execute(&upsert, params_from_iter(values))?;
                tx.commit()?;
                Ok(None)
            })
            .await
            .map_err(db_err)?;

        if let Some(existing) = existing {
            return Err(KnowledgeError::InvalidInput(format!(
                "record {} already exists with kind {}, cannot store it as {}",
                id, existing, kind
            )));
        }

        self.index.insert(id.clone(), kind.as_str(), embedding);
        self.cache.invalidate(&id);
        debug!("Stored {} record {}", kind, id);
        Ok(id)
    }

    /// Store several records and snapshot the index once.
    pub async fn put_batch(
        &self,
        records: Vec<KnowledgeRecord>,
    ) -> Result<Vec<String>, KnowledgeError> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(self.put(record).await?);
        }
        self.flush_index()?;
        Ok(ids)
    }

    /// Fetch a record and count the access.
    ///
    /// Without a kind hint the kind is looked up from the id registry. A
    /// hint that does not match the stored kind yields `NotFound`.
    pub async fn get_by_id(
        &self,
        id: &str,
        kind_hint: Option<KnowledgeKind>,
    ) -> Result<KnowledgeRecord, KnowledgeError> {
        let record_id = id.to_string();
        let now = Utc::now().to_rfc3339();

        let record = self
            .conn
            .call(move |conn| {
                let kind = match kind_hint {
                    Some(kind) => kind,
                    None => match rows::registered_kind(conn, &record_id)? {
                        Some(kind) => kind,
                        None => return Ok(None),
                    },
                };

                let tx = conn.transaction()?;
                let updated = tx.execute(
                    &format!(
                        "UPDATE {} SET access_count = access_count + 1, last_accessed = ?2 WHERE id = ?1",
                        kind.table_name()
                    ),
                    params![record_id, now],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let record = rows::load_record(&tx, kind, &record_id)?;
                tx.commit()?;
                Ok(record)
            })
            .await
            .map_err(db_err)?;

        match record {
            Some(record) => {
                self.cache.insert(record.clone());
                Ok(record)
            }
            None => Err(KnowledgeError::NotFound(id.to_string())),
        }
    }

    /// Load records by id without counting an access. Missing ids are
    /// skipped. Served from the cache where possible.
    pub async fn load_records(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, KnowledgeRecord>, KnowledgeError> {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.cache.get(id) {
                Some(record) => {
                    found.insert(id.clone(), record);
                }
                None => missing.push(id.clone()),
            }
        }

        if missing.is_empty() {
            return Ok(found);
        }

        let loaded = self
            .conn
            .call(move |conn| {
                let mut out = Vec::new();
                for id in missing {
                    if let Some(kind) = rows::registered_kind(conn, &id)? {
                        if let Some(record) = rows::load_record(conn, kind, &id)? {
                            out.push(record);
                        }
                    }
                }
                Ok(out)
            })
            .await
            .map_err(db_err)?;

        for record in loaded {
            self.cache.insert(record.clone());
            found.insert(record.resolved_id(), record);
        }
        Ok(found)
    }

    /// Every record of one kind, oldest first.
    pub async fn list_by_kind(&self, kind: KnowledgeKind) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        self.conn
            .call(move |conn| Ok(rows::load_kind(conn, kind)?))
            .await
            .map_err(db_err)
    }

    /// Every record of every kind.
    pub async fn all_records(&self) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        self.conn
            .call(|conn| {
                let mut out = Vec::new();
                for kind in KnowledgeKind::ALL {
                    out.extend(rows::load_kind(conn, kind)?);
                }
                Ok(out)
            })
            .await
            .map_err(db_err)
    }

    /// Record that a record was applied.
    ///
    /// Appends a usage-analytics row and atomically increments the usage
    /// count while folding the outcome into the running success rate.
    pub async fn record_usage(
        &self,
        id: &str,
        kind: KnowledgeKind,
        outcome: UsageOutcome,
    ) -> Result<(), KnowledgeError> {
        let record_id = id.to_string();
        let metrics = serde_json::to_string(&outcome.metrics)?;
        let success = if outcome.success { 1.0f64 } else { 0.0 };
        let now = Utc::now().to_rfc3339();

        let updated = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    &format!(
                        "UPDATE {} SET
                            success_rate = (success_rate * usage_count + ?2) / (usage_count + 1),
                            usage_count = usage_count + 1
                         WHERE id = ?1",
                        kind.table_name()
                    ),
                    params![record_id, success],
                )?;
                if updated == 0 {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT INTO usage_analytics (record_id, kind, success, context, metrics, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![record_id, kind.as_str(), outcome.success, outcome.context, metrics, now],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(db_err)?;

        self.cache.invalidate(id);
        if !updated {
            return Err(KnowledgeError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Write the vector index snapshot, if this store has an index file.
    pub fn flush_index(&self) -> Result<(), KnowledgeError> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        self.index
            .save(path)
            .map_err(|e| KnowledgeError::Storage(StorageError::IndexFile(e.to_string())))
    }

    /// Replace all persisted relationships and clusters.
    pub async fn replace_graph(
        &self,
        relationships: Vec<KnowledgeRelationship>,
        clusters: Vec<KnowledgeCluster>,
    ) -> Result<(), KnowledgeError> {
        self.conn
            .call(move |conn| Ok(rows::replace_graph(conn, &relationships, &clusters)?))
            .await
            .map_err(db_err)
    }

    pub async fn relationships(&self) -> Result<Vec<KnowledgeRelationship>, KnowledgeError> {
        self.conn
            .call(|conn| Ok(rows::load_relationships(conn)?))
            .await
            .map_err(db_err)
    }

    pub async fn clusters(&self) -> Result<Vec<KnowledgeCluster>, KnowledgeError> {
        self.conn
            .call(|conn| Ok(rows::load_clusters(conn)?))
            .await
            .map_err(db_err)
    }

    pub fn install_graph(&self, snapshot: Arc<GraphSnapshot>) {
        *self.graph.write() = Some(snapshot);
    }

    /// The most recently built or restored graph.
    pub fn graph_snapshot(&self) -> Option<Arc<GraphSnapshot>> {
        self.graph.read().clone()
    }

    pub async fn stats(&self) -> Result<StoreStats, KnowledgeError> {
        let (records, relationships, clusters, usage_events) = self
            .conn
            .call(|conn| {
                let mut records = BTreeMap::new();
                for kind in KnowledgeKind::ALL {
                    let count: i64 = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {}", kind.table_name()),
                        [],
                        |row| row.get(0),
                    )?;
                    records.insert(kind, count as u64);
                }
                let count = |table: &str| -> rusqlite::Result<u64> {
                    let n: i64 =
                        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                    Ok(n as u64)
                };
                Ok((
                    records,
                    count("relationships")?,
                    count("clusters")?,
                    count("usage_analytics")?,
                ))
            })
            .await
            .map_err(db_err)?;

        Ok(StoreStats {
            records,
            relationships,
            clusters,
            usage_events,
            indexed_vectors: self.index.len(),
            cached_records: self.cache.len(),
        })
    }
}

/// Upsert statement for a kind's table. Counters and creation time are
/// kept on conflict; the success rate is only taken from the incoming
/// record while no usage has been recorded.
fn upsert_sql(kind: KnowledgeKind) -> String {
    let fields = kind.searchable_fields();
    let mut columns = vec!["id"];
    columns.extend_from_slice(fields);
    columns.extend_from_slice(&[
        "confidence_score",
        "usage_count",
        "success_rate",
        "created_at",
        "payload",
        "metadata",
        "embedding_id",
    ]);

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let mut updates: Vec<String> = fields
        .iter()
        .map(|f| format!("{f} = excluded.{f}"))
        .collect();
    updates.extend([
        "confidence_score = excluded.confidence_score".to_string(),
        "success_rate = CASE WHEN usage_count = 0 THEN excluded.success_rate ELSE success_rate END"
            .to_string(),
        "payload = excluded.payload".to_string(),
        "metadata = excluded.metadata".to_string(),
        "embedding_id = excluded.embedding_id".to_string(),
    ]);

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {}",
        kind.table_name(),
        columns.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
