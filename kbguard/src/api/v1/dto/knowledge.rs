//! Knowledge base and item DTOs for the v1 API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec;
use crate::error::Result;
use crate::models::{self, ItemOutcome, NewItem};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// One item in `POST`/`PUT /v1/knowledge/{knowledgeId}/items`.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemPayload {
    /// Raw text to chunk and embed.
    pub content: String,
    /// Permission and citation envelope, either bare or nested under the
    /// configured metadata key. Alias field names are accepted.
    pub file_metadata: Value,
}

impl ItemPayload {
    pub fn into_new_item(self, metadata_key: &str) -> Result<NewItem> {
        let extra = codec::decode_payload_value(&self.file_metadata, metadata_key)?;
        Ok(NewItem::new(self.content, extra))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemsRequest {
    pub items: Vec<ItemPayload>,
}

/// Request body for `POST /v1/knowledge/{knowledgeId}/items:remove`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveItemsRequest {
    pub item_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeResponse {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<models::KnowledgeBase> for KnowledgeResponse {
    fn from(kb: models::KnowledgeBase) -> Self {
        Self {
            id: kb.id,
            name: kb.name,
            description: kb.description,
            created_at: kb.created_at,
            updated_at: kb.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteKnowledgeResponse {
    pub id: String,
    pub chunks_removed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeItemResponse {
    pub id: String,
    pub knowledge_id: String,
    pub item_url: String,
    pub chunk_count: i64,
    /// Stored envelope in external field names. Absent if it no longer
    /// decodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeItemResponse {
    pub fn from_item(item: models::KnowledgeItem, metadata_key: &str) -> Self {
        let file_metadata = codec::decode(&Value::Object(item.metadata), metadata_key)
            .and_then(|extra| codec::to_external(&extra))
            .map_err(|e| {
                tracing::warn!(item_id = %item.id, error = %e, "Stored item metadata does not decode");
            })
            .ok();

        Self {
            id: item.id,
            knowledge_id: item.knowledge_id,
            item_url: item.item_url,
            chunk_count: item.chunk_count,
            file_metadata,
            created_at: item.created_at,
        }
    }
}

/// Per-item outcomes of a batch add, update or remove.
#[derive(Debug, Clone, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<ItemOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_METADATA_KEY;
    use serde_json::json;

    #[test]
    fn test_payload_with_aliases_becomes_item() {
        let payload: ItemPayload = serde_json::from_value(json!({
            "content": "quarterly numbers",
            "file_metadata": {
                "permissions": {"user_ids": ["alice"], "group_ids": []},
                "item_metadata": {
                    "title": "Q3",
                    "item_url": "https://docs.example.com/q3",
                    "date": "2024-10-01T00:00:00Z"
                }
            }
        }))
        .unwrap();

        let item = payload.into_new_item(DEFAULT_METADATA_KEY).unwrap();
        assert_eq!(item.url(), "https://docs.example.com/q3");
        assert!(item.extra.auth.users.contains("alice"));
    }

    #[test]
    fn test_payload_without_title_rejected() {
        let payload: ItemPayload = serde_json::from_value(json!({
            "content": "x",
            "file_metadata": {
                "auth": {"users": ["alice"], "groups": []},
                "metadata": {"url": "https://docs.example.com/x", "date": "2024-10-01T00:00:00Z"}
            }
        }))
        .unwrap();

        assert!(payload.into_new_item(DEFAULT_METADATA_KEY).is_err());
    }
}
