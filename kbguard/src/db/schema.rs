use libsql::Connection;

use crate::error::Result;

/// Create all tables. `dimensions` fixes the width of the chunk vector
/// column for a fresh database.
pub async fn init_schema(conn: &Connection, dimensions: usize) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        -- Knowledge bases
        CREATE TABLE IF NOT EXISTS knowledge_bases (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Source items ingested into a knowledge base
        CREATE TABLE IF NOT EXISTS knowledge_items (
            id TEXT PRIMARY KEY,
            knowledge_id TEXT NOT NULL,
            item_url TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{{}}',
            chunk_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (knowledge_id, item_url)
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_items_knowledge_id ON knowledge_items(knowledge_id);

        -- Chunks with vector embedding and permission metadata
        CREATE TABLE IF NOT EXISTS chunks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            knowledge_id TEXT NOT NULL,
            item_id TEXT,
            content TEXT NOT NULL,
            embedding F32_BLOB({dimensions}) NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{{}}',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_knowledge_id ON chunks(knowledge_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_item_id ON chunks(item_id);

        -- Metadata key-value store
        CREATE TABLE IF NOT EXISTS kbguard_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#
    ))
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn column_type(conn: &Connection, table: &str, column: &str) -> Option<String> {
        let mut rows = conn
            .query(
                &format!("SELECT type FROM pragma_table_info('{table}') WHERE name = ?1"),
                [column],
            )
            .await
            .unwrap();
        rows.next()
            .await
            .unwrap()
            .map(|row| row.get::<String>(0).unwrap())
    }

    #[tokio::test]
    async fn test_chunk_vector_width_follows_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let db = Builder::new_local(dir.path().join("schema.db"))
            .build()
            .await
            .unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn, 8).await.unwrap();
        init_schema(&conn, 8).await.unwrap();

        assert_eq!(
            column_type(&conn, "chunks", "embedding").await.as_deref(),
            Some("F32_BLOB(8)")
        );
        assert_eq!(
            column_type(&conn, "knowledge_items", "item_url").await.as_deref(),
            Some("TEXT")
        );
    }
}
