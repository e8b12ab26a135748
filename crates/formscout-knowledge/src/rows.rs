//! Row mapping between SQLite and knowledge records.

use chrono::{DateTime, Utc};
use formscout_protocols::{
    KnowledgeCluster, KnowledgeKind, KnowledgePayload, KnowledgeRecord, KnowledgeRelationship,
    KnowledgeStats, Metadata, RelationshipType,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Columns selected for a record, joined with its embedding as `e`.
pub(crate) const RECORD_COLUMNS: &str = "t.id, t.confidence_score, t.usage_count, t.success_rate, \
     t.created_at, t.last_accessed, t.access_count, t.payload, t.metadata, e.vector";

pub(crate) fn select_sql(kind: KnowledgeKind) -> String {
    format!(
        "SELECT {} FROM {} t LEFT JOIN embeddings e ON e.record_id = t.id",
        RECORD_COLUMNS,
        kind.table_name()
    )
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Map a row selected with [`RECORD_COLUMNS`].
pub(crate) fn row_to_record(row: &Row<'_>) -> rusqlite::Result<KnowledgeRecord> {
    let id: String = row.get(0)?;
    let confidence_score: f64 = row.get(1)?;
    let usage_count: i64 = row.get(2)?;
    let success_rate: f64 = row.get(3)?;
    let created_at: String = row.get(4)?;
    let last_accessed: Option<String> = row.get(5)?;
    let access_count: i64 = row.get(6)?;
    let payload_json: String = row.get(7)?;
    let metadata_json: String = row.get(8)?;
    let vector_json: Option<String> = row.get(9)?;

    let payload: KnowledgePayload =
        serde_json::from_str(&payload_json).map_err(|e| conversion_error(7, e))?;
    let metadata: Metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    let embedding: Vec<f32> = vector_json
        .and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or_default();

    Ok(KnowledgeRecord {
        id: Some(id),
        payload,
        stats: KnowledgeStats {
            confidence_score: confidence_score as f32,
            usage_count: usage_count.max(0) as u64,
            success_rate: success_rate as f32,
        },
        metadata,
        embedding,
        created_at: parse_time(&created_at).unwrap_or_else(Utc::now),
        last_accessed: last_accessed.as_deref().and_then(parse_time),
        access_count: access_count.max(0) as u64,
    })
}

/// Kind a record id was registered with.
pub(crate) fn registered_kind(conn: &Connection, id: &str) -> rusqlite::Result<Option<KnowledgeKind>> {
    let kind: Option<String> = conn
        .query_row("SELECT kind FROM knowledge_ids WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    match kind {
        Some(k) => k
            .parse::<KnowledgeKind>()
            .map(Some)
            .map_err(|e| conversion_error(0, e)),
        None => Ok(None),
    }
}

pub(crate) fn load_record(
    conn: &Connection,
    kind: KnowledgeKind,
    id: &str,
) -> rusqlite::Result<Option<KnowledgeRecord>> {
    let sql = format!("{} WHERE t.id = ?1", select_sql(kind));
    conn.query_row(&sql, [id], row_to_record).optional()
}

pub(crate) fn load_kind(conn: &Connection, kind: KnowledgeKind) -> rusqlite::Result<Vec<KnowledgeRecord>> {
    let sql = format!("{} ORDER BY t.created_at, t.id", select_sql(kind));
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub(crate) fn load_relationships(conn: &Connection) -> rusqlite::Result<Vec<KnowledgeRelationship>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, target_id, relationship_type, strength, confidence
         FROM relationships ORDER BY source_id, target_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let kind: String = row.get(2)?;
        let relationship_type = RelationshipType::parse(&kind).unwrap_or(RelationshipType::Correlation);
        Ok(KnowledgeRelationship {
            source_id: row.get(0)?,
            target_id: row.get(1)?,
            relationship_type,
            strength: row.get::<_, f64>(3)? as f32,
            confidence: row.get::<_, f64>(4)? as f32,
        })
    })?;
    rows.collect()
}

pub(crate) fn load_clusters(conn: &Connection) -> rusqlite::Result<Vec<KnowledgeCluster>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, member_ids, cohesion_score, acceleration_factor
         FROM clusters ORDER BY acceleration_factor DESC, id",
    )?;
    let rows = stmt.query_map([], |row| {
        let kind: String = row.get(1)?;
        let members: String = row.get(2)?;
        Ok(KnowledgeCluster {
            id: row.get(0)?,
            kind: kind.parse().map_err(|e| conversion_error(1, e))?,
            member_ids: serde_json::from_str(&members).map_err(|e| conversion_error(2, e))?,
            cohesion_score: row.get::<_, f64>(3)? as f32,
            acceleration_factor: row.get::<_, f64>(4)? as f32,
        })
    })?;
    rows.collect()
}

/// Replace all relationships and clusters in one transaction.
pub(crate) fn replace_graph(
    conn: &mut Connection,
    relationships: &[KnowledgeRelationship],
    clusters: &[KnowledgeCluster],
) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM relationships", [])?;
    tx.execute("DELETE FROM clusters", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO relationships
             (source_id, target_id, relationship_type, strength, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for rel in relationships {
            stmt.execute(params![
                rel.source_id,
                rel.target_id,
                rel.relationship_type.as_str(),
                rel.strength as f64,
                rel.confidence as f64,
                now
            ])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO clusters (id, kind, member_ids, cohesion_score, acceleration_factor, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for cluster in clusters {
            let members = serde_json::to_string(&cluster.member_ids)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            stmt.execute(params![
                cluster.id,
                cluster.kind.as_str(),
                members,
                cluster.cohesion_score as f64,
                cluster.acceleration_factor as f64,
                now
            ])?;
        }
    }

    tx.commit()
}
