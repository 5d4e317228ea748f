use crate::AppState;
use crate::services::storage::StorageError;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub storage: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    // Only transport failures count; a missing probe object still proves connectivity
    let storage_status = match state.storage.file_exists("health-check").await {
        Ok(_) => "connected",
        Err(StorageError::NotFound(_)) | Err(StorageError::AlreadyExists(_)) => "connected",
        Err(StorageError::Unavailable(e)) => {
            tracing::warn!("Storage health probe failed: {}", e);
            "disconnected"
        }
        Err(StorageError::Backend(e)) => {
            tracing::warn!("Storage health probe failed: {}", e);
            "degraded"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.storage.backend_name().to_string(),
        storage: storage_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
