use chrono::{DateTime, Utc};
use libsql::{params, Connection, Value};
use validator::Validate;

use crate::codec;
use crate::db::acl::{in_clause, AclFilter};
use crate::error::{KbError, Result};
use crate::models::{
    is_visible, AuthChunk, Metadata, NewChunk, ResolvedIdentity, ScoredChunk, SearchQuery,
};

/// Reject vectors whose length differs from the column width.
pub(crate) fn check_dimensions(len: usize, dimensions: usize) -> Result<()> {
    if len != dimensions {
        return Err(KbError::Validation(format!(
            "Vector has {len} dimensions, store expects {dimensions}"
        )));
    }
    Ok(())
}

/// Validate a chunk before any row is written.
pub(crate) fn validate_chunk(chunk: &NewChunk, dimensions: usize) -> Result<()> {
    if chunk.knowledge_id.trim().is_empty() {
        return Err(KbError::Validation(
            "Chunk must belong to a knowledge base".to_string(),
        ));
    }
    check_dimensions(chunk.vector.len(), dimensions)?;
    chunk
        .extra
        .validate()
        .map_err(|e| KbError::Validation(format!("Invalid chunk metadata: {e}")))?;
    Ok(())
}

pub struct ChunkRepository;

impl ChunkRepository {
    /// Insert one chunk that already passed [`validate_chunk`].
    pub async fn create(conn: &Connection, chunk: &NewChunk, key: &str) -> Result<String> {
        let id = nanoid::nanoid!();
        let mut column = chunk.metadata.clone();
        codec::merge_into(&mut column, &chunk.extra, key)?;
        let metadata_json = serde_json::to_string(&column)?;
        let embedding_json = serde_json::to_string(&chunk.vector)?;

        conn.execute(
            r#"
            INSERT INTO chunks (
                id, knowledge_id, item_id, content, embedding, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, vector32(?5), ?6, ?7)
            "#,
            params![
                id.clone(),
                chunk.knowledge_id.clone(),
                chunk.item_id.clone(),
                chunk.content.clone(),
                embedding_json,
                metadata_json,
                Utc::now().to_rfc3339(),
            ],
        )
        .await?;

        Ok(id)
    }

    pub async fn delete_by_knowledge_id(conn: &Connection, knowledge_id: &str) -> Result<u64> {
        let affected = conn
            .execute(
                "DELETE FROM chunks WHERE knowledge_id = ?1",
                params![knowledge_id],
            )
            .await?;
        Ok(affected)
    }

    pub async fn delete_by_item_id(conn: &Connection, item_id: &str) -> Result<u64> {
        let affected = conn
            .execute("DELETE FROM chunks WHERE item_id = ?1", params![item_id])
            .await?;
        Ok(affected)
    }

    pub async fn count_by_knowledge_id(conn: &Connection, knowledge_id: &str) -> Result<u64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM chunks WHERE knowledge_id = ?1",
                params![knowledge_id],
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count as u64)
    }

    /// Similarity search restricted to rows visible to `identity`.
    ///
    /// The visibility and required-field predicates run inside the query,
    /// before ranking and `LIMIT`, so the result holds `min(visible, k)`
    /// rows. Rows that still fail to decode are logged and dropped.
    pub async fn search_similar(
        conn: &Connection,
        query: &SearchQuery,
        identity: &ResolvedIdentity,
        key: &str,
        dimensions: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if query.k == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(query.vector.len(), dimensions)?;

        let embedding_json = serde_json::to_string(&query.vector)?;

        // Fixed params: ?1=embedding, ?2=limit, ?3=offset; ACL params start at ?4
        let acl = AclFilter::for_identity(identity, key, "c", 4);
        let next = acl.next_index(4);
        let mut clauses = vec![acl.clause];
        let mut filter_values = acl.params;

        if !query.knowledge_ids.is_empty() {
            let (kb_clause, kb_values) = in_clause("c.knowledge_id", &query.knowledge_ids, next);
            clauses.push(kb_clause);
            filter_values.extend(kb_values);
        }

        let sql = format!(
            r#"
            SELECT
                c.id,
                c.knowledge_id,
                c.item_id,
                c.content,
                c.metadata,
                c.created_at,
                1 - vector_distance_cos(c.embedding, vector32(?1)) AS score
            FROM chunks c
            WHERE {}
            ORDER BY score DESC, c.seq ASC
            LIMIT ?2 OFFSET ?3
            "#,
            clauses.join(" AND ")
        );

        // The SQL filter cannot express every decode rule, so rows dropped
        // below are replaced by reading further pages until k are collected.
        let mut results = Vec::with_capacity(query.k);
        let mut offset = 0usize;
        loop {
            let page_size = query.k - results.len();
            let mut param_values: Vec<Value> = vec![
                Value::from(embedding_json.clone()),
                Value::from(page_size as i64),
                Value::from(offset as i64),
            ];
            param_values.extend(filter_values.iter().cloned());

            let mut rows = conn
                .query(&sql, libsql::params_from_iter(param_values))
                .await?;

            let mut fetched = 0usize;
            while let Some(row) = rows.next().await? {
                fetched += 1;
                let id: String = row.get(0)?;
                let raw_metadata: String = row.get(4)?;

                let extra = match codec::decode_str(&raw_metadata, key) {
                    Ok(extra) => extra,
                    Err(e) => {
                        tracing::warn!(chunk_id = %id, error = %e, "Dropping chunk with malformed metadata");
                        continue;
                    }
                };
                if !is_visible(&extra.auth, identity) {
                    tracing::warn!(chunk_id = %id, "Dropping chunk whose decoded ACL disagrees with the store filter");
                    continue;
                }

                let metadata: Metadata = serde_json::from_str(&raw_metadata)?;

                results.push(ScoredChunk {
                    score: row.get::<f64>(6)? as f32,
                    chunk: AuthChunk {
                        id,
                        knowledge_id: row.get(1)?,
                        item_id: row.get(2)?,
                        content: row.get(3)?,
                        metadata,
                        extra,
                        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(5)?)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now()),
                    },
                });
            }

            offset += fetched;
            if results.len() >= query.k || fetched < page_size {
                break;
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtraMetadata, ItemMetadata, ItemPermissions};
    use chrono::TimeZone;

    fn chunk(dims: usize) -> NewChunk {
        NewChunk::new(
            "kb1",
            "text",
            vec![0.5; dims],
            ExtraMetadata::new(
                ItemPermissions::new(["alice@x.com"], Vec::<String>::new()),
                ItemMetadata {
                    title: "t".to_string(),
                    url: "https://x.example.com/a".to_string(),
                    context_url: None,
                    date: Utc.with_ymd_and_hms(2023, 7, 1, 12, 0, 0).unwrap(),
                    source: None,
                },
            ),
        )
    }

    #[test]
    fn test_validate_chunk_dimension_mismatch() {
        assert!(validate_chunk(&chunk(4), 4).is_ok());
        assert!(matches!(
            validate_chunk(&chunk(3), 4),
            Err(KbError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_chunk_rejects_bad_metadata() {
        let mut bad = chunk(4);
        bad.extra.metadata.title.clear();
        assert!(matches!(validate_chunk(&bad, 4), Err(KbError::Validation(_))));
    }

    #[test]
    fn test_validate_chunk_requires_knowledge_id() {
        let mut bad = chunk(4);
        bad.knowledge_id = " ".to_string();
        assert!(validate_chunk(&bad, 4).is_err());
    }
}
