//! Similarity and field-match queries.

use std::collections::BTreeMap;

use rusqlite::params_from_iter;

use formscout_protocols::{KnowledgeError, KnowledgeKind, KnowledgeRecord};

use crate::rows;
use crate::store::{KnowledgeStore, SimilarityMatch, db_err};

/// Field name to substring, matched case-insensitively (ASCII).
pub type FieldPattern = BTreeMap<String, String>;

impl KnowledgeStore {
    /// Records whose embedding is similar to `query`, best first.
    ///
    /// Only matches scoring strictly above the configured similarity
    /// threshold are returned.
    pub async fn find_by_similarity(
        &self,
        query: &str,
        kind_hint: Option<KnowledgeKind>,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, KnowledgeError> {
        let embedding = self.embed_or_zero(query, "similarity query");
        if embedding.is_zero() || limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self.index.search(
            &embedding,
            kind_hint.map(|k| k.as_str()),
            limit,
            self.config().similarity_threshold,
        );
        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let mut records = self.load_records(&ids).await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                records.remove(&hit.id).map(|record| SimilarityMatch {
                    record,
                    similarity: hit.score,
                })
            })
            .collect())
    }

    /// Records whose searchable fields contain every given substring.
    ///
    /// A kind is searched only when every requested field is in its
    /// allow-list; naming a field the hinted kind does not allow is an
    /// error. Results are ordered by confidence, then usage, and capped at
    /// the configured limit.
    pub async fn find_by_field_match(
        &self,
        pattern: &FieldPattern,
        kind_hint: Option<KnowledgeKind>,
    ) -> Result<Vec<KnowledgeRecord>, KnowledgeError> {
        if pattern.is_empty() {
            return Err(KnowledgeError::InvalidInput(
                "field pattern must name at least one field".to_string(),
            ));
        }

        let kinds: Vec<KnowledgeKind> = match kind_hint {
            Some(kind) => {
                if let Some(field) = pattern.keys().find(|f| !kind.is_searchable(f)) {
                    return Err(KnowledgeError::InvalidInput(format!(
                        "field '{}' is not searchable for {}",
                        field, kind
                    )));
                }
                vec![kind]
            }
            None => KnowledgeKind::ALL
                .into_iter()
                .filter(|k| pattern.keys().all(|f| k.is_searchable(f)))
                .collect(),
        };
        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.config().field_match_limit;
        let pattern: Vec<(String, String)> = pattern
            .iter()
            .map(|(f, v)| (f.clone(), v.clone()))
            .collect();

        let mut records = self
            .conn()
            .call(move |conn| {
                let mut out = Vec::new();
                for kind in kinds {
                    // Column names come from the kind's static allow-list.
                    let clauses: Vec<String> = pattern
                        .iter()
                        .enumerate()
                        .filter_map(|(i, (field, _))| {
                            kind.searchable_fields()
                                .iter()
                                .find(|allowed| **allowed == field.as_str())
                                .map(|column| format!("instr(lower(t.{}), lower(?{})) > 0", column, i + 1))
                        })
                        .collect();
                    let sql = format!(
                        "{} WHERE {} ORDER BY t.confidence_score DESC, t.usage_count DESC, t.id LIMIT {}",
                        rows::select_sql(kind),
                        clauses.join(" AND "),
                        limit
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let matched = stmt
                        .query_map(params_from_iter(pattern.iter().map(|(_, v)| v)), rows::row_to_record)?
                        .collect::<Result<Vec<_>, _>>()?;
                    out.extend(matched);
                }
                Ok(out)
            })
            .await
            .map_err(db_err)?;

        records.sort_by(|a, b| {
            b.stats
                .confidence_score
                .partial_cmp(&a.stats.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.stats.usage_count.cmp(&a.stats.usage_count))
        });
        records.truncate(limit);
        Ok(records)
    }
}

/// Build a [`FieldPattern`] from pairs.
pub fn field_pattern<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> FieldPattern {
    pairs
        .into_iter()
        .map(|(f, v)| (f.to_ascii_lowercase(), v.to_string()))
        .collect()
}
