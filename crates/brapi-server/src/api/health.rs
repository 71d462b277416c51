use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> Response {
    let store = state.pipeline.store();
    let backend = store.backend().to_string();

    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "backend": backend,
                "storage": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Storage health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "backend": backend,
                    "storage": "unreachable"
                })),
            )
                .into_response()
        },
    }
}
