use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::application::AppError;

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Uniform error body.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    timestamp: DateTime<Utc>,
    status: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::App(err) => match err {
                AppError::AccountNotFound(_)
                | AppError::MovementNotFound(_)
                | AppError::ForecastNotFound(_)
                | AppError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
                AppError::AccountAlreadyExists(_)
                | AppError::CustomerAlreadyExists(_)
                | AppError::AccountClosed(_)
                | AppError::MovementLocked { .. }
                | AppError::InvalidStatusTransition { .. }
                | AppError::InsufficientFunds { .. } => StatusCode::CONFLICT,
                AppError::InvalidAmount(_)
                | AppError::InvalidInput(_)
                | AppError::ForecastNotRecurring(_) => StatusCode::BAD_REQUEST,
                AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, details) = match self {
            ApiError::App(AppError::Database(err)) => {
                tracing::error!(error = %format!("{:#}", err), "request failed");
                ("Internal server error".to_string(), None)
            }
            ApiError::Validation(errors) => (
                "Validation error".to_string(),
                serde_json::to_value(&errors).ok(),
            ),
            other => (other.to_string(), None),
        };

        let body = ErrorEnvelope {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
