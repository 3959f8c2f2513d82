use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "usage-billing-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Ready once the usage store and the cache both answer.
pub async fn readiness_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    if let Err(e) = state.usage_store.health_check().await {
        tracing::warn!(error = %e, "Usage store not ready");
        return Err(AppError::ServiceUnavailable);
    }
    if let Err(e) = state.cache.health_check().await {
        tracing::warn!(error = %e, "Usage cache not ready");
        return Err(AppError::ServiceUnavailable);
    }

    Ok(Json(json!({ "status": "ready" })))
}

/// Prometheus scrape endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
