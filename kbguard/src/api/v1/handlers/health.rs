use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub embeddings: EmbeddingsStatus,
    pub directory: DirectoryStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsStatus {
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatus {
    pub mode: String,
    pub failure_policy: String,
}

/// `GET /api/v1/health`
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let database = match state.db.sync().await {
        Ok(_) => DatabaseStatus {
            status: "ok".to_string(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database sync failed");
            DatabaseStatus {
                status: "error".to_string(),
            }
        }
    };

    let directory = DirectoryStatus {
        mode: if state.config.directory.base_url.is_some() {
            "http".to_string()
        } else {
            "static".to_string()
        },
        failure_policy: state.retrieval.failure_policy().to_string(),
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        embeddings: EmbeddingsStatus {
            model: state.config.embeddings.model.clone(),
            dimensions: state.embedder.dimensions(),
        },
        directory,
    })
}
