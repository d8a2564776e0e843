use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::application::TreasuryPosition;
use crate::domain::IntegrityReport;

use super::{AppState, error::ApiResult};

/// Liveness probe; also checks the database answers.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.treasury.repository().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "ecompta",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "ecompta",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
    }
}

pub async fn position(State(state): State<AppState>) -> ApiResult<Json<TreasuryPosition>> {
    Ok(Json(state.treasury.treasury_position().await?))
}

pub async fn integrity(State(state): State<AppState>) -> ApiResult<Json<IntegrityReport>> {
    Ok(Json(state.treasury.check_integrity().await?))
}
