//! v1 knowledge base handlers.

use axum::extract::{Path, State};

use crate::api::extractors::AppJson;
use crate::api::v1::dto::{
    DeleteKnowledgeResponse, ItemsRequest, ItemsResponse, KnowledgeItemResponse,
    KnowledgeResponse, RemoveItemsRequest,
};
use crate::api::v1::response::{ApiResponse, ErrorCode, ResponseMeta};
use crate::api::AppState;
use crate::error::Result;
use crate::models::{CreateKnowledgeRequest, NewItem};

/// `POST /api/v1/knowledge`
///
/// Returns 201 when the knowledge base was created, 200 when one with the
/// same name already existed.
pub async fn create_knowledge(
    State(state): State<AppState>,
    AppJson(req): AppJson<CreateKnowledgeRequest>,
) -> ApiResponse<KnowledgeResponse> {
    match state.knowledge.create_if_not_exists(&req).await {
        Ok((kb, true)) => ApiResponse::created(KnowledgeResponse::from(kb)),
        Ok((kb, false)) => ApiResponse::success(KnowledgeResponse::from(kb)),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/knowledge`
pub async fn list_knowledge(State(state): State<AppState>) -> ApiResponse<Vec<KnowledgeResponse>> {
    match state.knowledge.list().await {
        Ok(kbs) => {
            let total = kbs.len();
            let data = kbs.into_iter().map(KnowledgeResponse::from).collect();
            ApiResponse::success_with_meta(data, ResponseMeta::total(total))
        }
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/knowledge/{knowledgeId}`
pub async fn get_knowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<KnowledgeResponse> {
    match state.knowledge.get(&id).await {
        Ok(kb) => ApiResponse::success(KnowledgeResponse::from(kb)),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/knowledge/{knowledgeId}`
pub async fn delete_knowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<DeleteKnowledgeResponse> {
    match state.knowledge.delete(&id).await {
        Ok(chunks_removed) => ApiResponse::success(DeleteKnowledgeResponse { id, chunks_removed }),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/knowledge/{knowledgeId}/items`
pub async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResponse<Vec<KnowledgeItemResponse>> {
    let key = &state.config.store.metadata_key;
    match state.knowledge.list_items(&id).await {
        Ok(items) => {
            let total = items.len();
            let data = items
                .into_iter()
                .map(|item| KnowledgeItemResponse::from_item(item, key))
                .collect();
            ApiResponse::success_with_meta(data, ResponseMeta::total(total))
        }
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/knowledge/{knowledgeId}/items`
pub async fn add_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<ItemsRequest>,
) -> ApiResponse<ItemsResponse> {
    let items = match parse_items(&state, req) {
        Ok(items) => items,
        Err(e) => return e.into(),
    };
    match state.knowledge.add_items(&id, items).await {
        Ok(items) => ApiResponse::success(ItemsResponse { items }),
        Err(e) => e.into(),
    }
}

/// `PUT /api/v1/knowledge/{knowledgeId}/items`
///
/// Items are matched by URL and re-ingested with their new envelope.
pub async fn update_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<ItemsRequest>,
) -> ApiResponse<ItemsResponse> {
    let items = match parse_items(&state, req) {
        Ok(items) => items,
        Err(e) => return e.into(),
    };
    match state.knowledge.update_items(&id, items).await {
        Ok(items) => ApiResponse::success(ItemsResponse { items }),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/knowledge/{knowledgeId}/items:remove`
pub async fn remove_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<RemoveItemsRequest>,
) -> ApiResponse<ItemsResponse> {
    if req.item_ids.is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "item_ids cannot be empty");
    }
    match state.knowledge.remove_items(&id, &req.item_ids).await {
        Ok(items) => ApiResponse::success(ItemsResponse { items }),
        Err(e) => e.into(),
    }
}

/// A malformed envelope rejects the whole request before anything is
/// ingested.
fn parse_items(state: &AppState, req: ItemsRequest) -> Result<Vec<NewItem>> {
    let key = &state.config.store.metadata_key;
    req.items
        .into_iter()
        .map(|item| item.into_new_item(key))
        .collect()
}
