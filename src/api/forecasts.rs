use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::{BalanceProjection, NewForecast};
use crate::domain::{CashForecast, Cents, Direction, Periodicity};
use crate::storage::ForecastFilter;

use super::{AppState, error::ApiResult};

fn one_off() -> Periodicity {
    Periodicity::None
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateForecastRequest {
    pub account_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "Label must be 1 to 255 characters"))]
    pub label: String,
    pub direction: Direction,
    #[validate(range(min = 1, max = 1000000000000000i64, message = "Amount must be 0.01 to 10 000 000 000 000.00"))]
    pub amount_cents: Cents,
    pub expected_date: NaiveDate,
    #[serde(default = "one_off")]
    pub periodicity: Periodicity,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RealizationRequest {
    #[validate(range(min = 1, max = 1000000000000000i64, message = "Amount must be 0.01 to 10 000 000 000 000.00"))]
    pub amount_cents: Cents,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub account_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub outstanding_only: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProjectionQuery {
    #[validate(range(min = 1, max = 120, message = "Horizon must be 1 to 120 months"))]
    pub months: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ExpansionResponse {
    pub template_id: Uuid,
    pub created: usize,
    pub occurrences: Vec<CashForecast>,
}

pub async fn list_forecasts(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<Json<Vec<CashForecast>>> {
    let filter = ForecastFilter {
        account_id: query.account_id,
        from: query.from,
        to: query.to,
        outstanding_only: query.outstanding_only,
    };
    Ok(Json(state.treasury.list_forecasts(&filter).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_forecast(
    State(state): State<AppState>,
    Json(request): Json<CreateForecastRequest>,
) -> ApiResult<(StatusCode, Json<CashForecast>)> {
    request.validate()?;

    let forecast = state
        .treasury
        .create_forecast(NewForecast {
            account_id: request.account_id,
            label: request.label,
            direction: request.direction,
            amount_cents: request.amount_cents,
            expected_date: request.expected_date,
            periodicity: request.periodicity,
            end_date: request.end_date,
            category: request.category,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(forecast)))
}

#[tracing::instrument(skip(state))]
pub async fn expand_forecast(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ExpansionResponse>)> {
    let occurrences = state.treasury.expand_forecast(id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ExpansionResponse {
            template_id: id,
            created: occurrences.len(),
            occurrences,
        }),
    ))
}

pub async fn record_realization(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RealizationRequest>,
) -> ApiResult<Json<CashForecast>> {
    request.validate()?;
    Ok(Json(
        state
            .treasury
            .record_realization(id, request.amount_cents)
            .await?,
    ))
}

pub async fn project_balance(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ProjectionQuery>,
) -> ApiResult<Json<BalanceProjection>> {
    query.validate()?;
    Ok(Json(
        state
            .treasury
            .project_balance(account_id, query.months)
            .await?,
    ))
}
