use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::application::MovementDetails;
use crate::domain::{
    CashMovement, Cents, Direction, MovementChanges, MovementStatus, SettlementMode,
};
use crate::storage::MovementFilter;

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize, Validate)]
pub struct RecordMovementRequest {
    pub direction: Direction,
    #[validate(range(min = 1, max = 1000000000000000i64, message = "Amount must be 0.01 to 10 000 000 000 000.00"))]
    pub amount_cents: Cents,
    pub date: NaiveDate,
    #[validate(length(min = 1, max = 255, message = "Label must be 1 to 255 characters"))]
    pub label: String,
    pub counterparty: Option<String>,
    pub settlement_mode: Option<SettlementMode>,
    pub reference: Option<String>,
    pub category: Option<String>,
    /// Allow the balance to go past the overdraft limit
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMovementRequest {
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 255, message = "Label must be 1 to 255 characters"))]
    pub label: Option<String>,
    pub direction: Option<Direction>,
    #[validate(range(min = 1, max = 1000000000000000i64, message = "Amount must be 0.01 to 10 000 000 000 000.00"))]
    pub amount_cents: Option<Cents>,
    pub counterparty: Option<String>,
    pub settlement_mode: Option<SettlementMode>,
    pub reference: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: MovementStatus,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MovementQuery {
    pub status: Option<MovementStatus>,
    pub direction: Option<Direction>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[validate(range(min = 1, max = 10000))]
    pub limit: Option<usize>,
}

pub async fn list_account_movements(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<MovementQuery>,
) -> ApiResult<Json<Vec<CashMovement>>> {
    query.validate()?;
    // 404 rather than an empty list for an unknown account
    let account = state.treasury.get_account(account_id).await?;

    let filter = MovementFilter {
        account_id: Some(account.id),
        status: query.status,
        direction: query.direction,
        category: query.category,
        from: query.from,
        to: query.to,
        limit: query.limit,
    };
    Ok(Json(state.treasury.list_movements(&filter).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn record_movement(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Json(request): Json<RecordMovementRequest>,
) -> ApiResult<(StatusCode, Json<CashMovement>)> {
    request.validate()?;

    let details = MovementDetails {
        counterparty: request.counterparty,
        settlement_mode: request.settlement_mode,
        reference: request.reference,
        category: request.category,
    };
    let movement = state
        .treasury
        .record_movement(
            account_id,
            request.direction,
            request.amount_cents,
            request.date,
            request.label,
            details,
            request.force,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(movement)))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMovementRequest>,
) -> ApiResult<Json<CashMovement>> {
    request.validate()?;

    let changes = MovementChanges {
        date: request.date,
        label: request.label,
        direction: request.direction,
        amount_cents: request.amount_cents,
        counterparty: request.counterparty,
        settlement_mode: request.settlement_mode,
        reference: request.reference,
        category: request.category,
    };
    Ok(Json(
        state
            .treasury
            .update_movement(id, changes, request.force)
            .await?,
    ))
}

pub async fn delete_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.treasury.delete_movement(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeStatusRequest>,
) -> ApiResult<Json<CashMovement>> {
    Ok(Json(state.treasury.change_status(id, request.status).await?))
}
