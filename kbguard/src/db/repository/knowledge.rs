use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::KnowledgeBase;

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub struct KnowledgeRepository;

impl KnowledgeRepository {
    pub async fn create(conn: &Connection, kb: &KnowledgeBase) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO knowledge_bases (id, name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                kb.id.clone(),
                kb.name.clone(),
                kb.description.clone(),
                kb.created_at.to_rfc3339(),
                kb.updated_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<KnowledgeBase>> {
        let mut rows = conn
            .query(
                "SELECT id, name, description, created_at, updated_at FROM knowledge_bases WHERE id = ?1",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_knowledge(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_name(conn: &Connection, name: &str) -> Result<Option<KnowledgeBase>> {
        let mut rows = conn
            .query(
                "SELECT id, name, description, created_at, updated_at FROM knowledge_bases WHERE name = ?1",
                params![name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_knowledge(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list(conn: &Connection) -> Result<Vec<KnowledgeBase>> {
        let mut rows = conn
            .query(
                "SELECT id, name, description, created_at, updated_at FROM knowledge_bases ORDER BY created_at ASC, name ASC",
                (),
            )
            .await?;

        let mut bases = Vec::new();
        while let Some(row) = rows.next().await? {
            bases.push(Self::row_to_knowledge(&row)?);
        }
        Ok(bases)
    }

    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let affected = conn
            .execute("DELETE FROM knowledge_bases WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    pub async fn touch(conn: &Connection, id: &str) -> Result<()> {
        conn.execute(
            "UPDATE knowledge_bases SET updated_at = ?2 WHERE id = ?1",
            params![id, Utc::now().to_rfc3339()],
        )
        .await?;
        Ok(())
    }

    fn row_to_knowledge(row: &libsql::Row) -> Result<KnowledgeBase> {
        Ok(KnowledgeBase {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            created_at: parse_timestamp(&row.get::<String>(3)?),
            updated_at: parse_timestamp(&row.get::<String>(4)?),
        })
    }
}
