//! v1 retrieval handler.

use axum::extract::State;

use crate::api::extractors::{AppJson, RequestUser};
use crate::api::v1::dto::{HitResponse, QueryRequest, QueryResponse};
use crate::api::v1::response::ApiResponse;
use crate::api::AppState;

/// `POST /api/v1/retrieval/query`
///
/// Runs on behalf of the user named in `X-Kbguard-User`. Chunks that user
/// cannot see are never part of the result, and nothing signals that they
/// exist.
pub async fn query(
    State(state): State<AppState>,
    RequestUser(user): RequestUser,
    AppJson(req): AppJson<QueryRequest>,
) -> ApiResponse<QueryResponse> {
    match state
        .retrieval
        .query(&user, &req.knowledge_ids, &req.query, req.k)
        .await
    {
        Ok(hits) => ApiResponse::success(QueryResponse {
            results: hits.into_iter().map(HitResponse::from).collect(),
        }),
        Err(e) => e.into(),
    }
}
