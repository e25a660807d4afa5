use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::KnowledgeItem;

const ITEM_COLUMNS: &str = "id, knowledge_id, item_url, metadata, chunk_count, created_at";

pub struct ItemRepository;

impl ItemRepository {
    pub async fn create(conn: &Connection, item: &KnowledgeItem) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO knowledge_items (id, knowledge_id, item_url, metadata, chunk_count, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                item.id.clone(),
                item.knowledge_id.clone(),
                item.item_url.clone(),
                serde_json::to_string(&item.metadata)?,
                item.chunk_count,
                item.created_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<KnowledgeItem>> {
        let mut rows = conn
            .query(
                &format!("SELECT {ITEM_COLUMNS} FROM knowledge_items WHERE id = ?1"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_url(
        conn: &Connection,
        knowledge_id: &str,
        item_url: &str,
    ) -> Result<Option<KnowledgeItem>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM knowledge_items WHERE knowledge_id = ?1 AND item_url = ?2"
                ),
                params![knowledge_id, item_url],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_by_knowledge_id(
        conn: &Connection,
        knowledge_id: &str,
    ) -> Result<Vec<KnowledgeItem>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM knowledge_items WHERE knowledge_id = ?1 ORDER BY created_at ASC, item_url ASC"
                ),
                params![knowledge_id],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::row_to_item(&row)?);
        }
        Ok(items)
    }

    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let affected = conn
            .execute("DELETE FROM knowledge_items WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    pub async fn delete_by_knowledge_id(conn: &Connection, knowledge_id: &str) -> Result<u64> {
        let affected = conn
            .execute(
                "DELETE FROM knowledge_items WHERE knowledge_id = ?1",
                params![knowledge_id],
            )
            .await?;
        Ok(affected)
    }

    fn row_to_item(row: &libsql::Row) -> Result<KnowledgeItem> {
        Ok(KnowledgeItem {
            id: row.get(0)?,
            knowledge_id: row.get(1)?,
            item_url: row.get(2)?,
            metadata: serde_json::from_str(&row.get::<String>(3)?).unwrap_or_default(),
            chunk_count: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(5)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
