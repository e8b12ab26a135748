//! Database schema management.
//!
//! One table per knowledge kind, each carrying the kind's searchable
//! columns, plus shared tables for the id registry, embeddings, graph
//! artifacts and usage analytics.

use formscout_protocols::KnowledgeKind;
use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SHARED_SCHEMA)?;
    for kind in KnowledgeKind::ALL {
        conn.execute_batch(&kind_table_ddl(kind))?;
    }
    Ok(())
}

const SHARED_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Every record id and the kind it was created with
CREATE TABLE IF NOT EXISTS knowledge_ids (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL
);

-- Embeddings keyed by record id, vector serialized as a JSON array
CREATE TABLE IF NOT EXISTS embeddings (
    record_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    dimension INTEGER NOT NULL,
    vector TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    strength REAL NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id)
);

CREATE TABLE IF NOT EXISTS clusters (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    member_ids TEXT NOT NULL,
    cohesion_score REAL NOT NULL,
    acceleration_factor REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    success INTEGER NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    metrics TEXT NOT NULL DEFAULT '{}',
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embeddings_kind ON embeddings(kind);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id);
CREATE INDEX IF NOT EXISTS idx_usage_record ON usage_analytics(record_id);
"#;

/// DDL for one kind's record table.
pub fn kind_table_ddl(kind: KnowledgeKind) -> String {
    let table = kind.table_name();
    let field_columns: String = kind
        .searchable_fields()
        .iter()
        .map(|f| format!("    {} TEXT NOT NULL DEFAULT '',\n", f))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
{field_columns}    confidence_score REAL NOT NULL DEFAULT 0.5,
    usage_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0,
    created_at TEXT NOT NULL,
    last_accessed TEXT,
    access_count INTEGER NOT NULL DEFAULT 0,
    payload TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{{}}',
    embedding_id TEXT REFERENCES embeddings(record_id)
);
CREATE INDEX IF NOT EXISTS idx_{table}_rank ON {table}(confidence_score DESC, usage_count DESC);
"
    )
}
