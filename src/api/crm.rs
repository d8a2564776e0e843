use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::application::{CustomerUpdate, PaymentBehaviorShare, SegmentShare};
use crate::domain::{Cents, Customer, CustomerStats};

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000000000000i64, message = "Revenue must be 0 to 10 000 000 000 000.00"))]
    pub total_revenue_cents: Cents,
    #[serde(default)]
    pub purchase_frequency: u32,
    pub last_purchase_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avg_payment_delay_days: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(range(min = 0, max = 1000000000000000i64, message = "Revenue must be 0 to 10 000 000 000 000.00"))]
    pub total_revenue_cents: Option<Cents>,
    pub purchase_frequency: Option<u32>,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub avg_payment_delay_days: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseRequest {
    #[validate(range(min = 1, max = 1000000000000000i64, message = "Amount must be 0.01 to 10 000 000 000 000.00"))]
    pub amount_cents: Cents,
    /// Defaults to now
    pub purchased_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub struct ScoreAllResponse {
    pub updated: usize,
    pub computed_at: DateTime<Utc>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListCustomersQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.crm.list_customers(query.include_inactive).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    request.validate()?;

    let stats = CustomerStats {
        total_revenue_cents: request.total_revenue_cents,
        purchase_frequency: request.purchase_frequency,
        last_purchase_at: request.last_purchase_at,
        avg_payment_delay_days: request.avg_payment_delay_days,
    };
    let customer = state
        .crm
        .create_customer(request.name, request.email, stats)
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.crm.get_customer(id).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> ApiResult<Json<Customer>> {
    request.validate()?;

    let update = CustomerUpdate {
        name: request.name,
        email: request.email,
        total_revenue_cents: request.total_revenue_cents,
        purchase_frequency: request.purchase_frequency,
        last_purchase_at: request.last_purchase_at,
        avg_payment_delay_days: request.avg_payment_delay_days,
    };
    Ok(Json(state.crm.update_customer(id, update).await?))
}

pub async fn deactivate_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.crm.deactivate_customer(id).await?))
}

pub async fn record_purchase(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<Json<Customer>> {
    request.validate()?;
    let at = request.purchased_at.unwrap_or_else(Utc::now);
    Ok(Json(
        state
            .crm
            .record_purchase(id, request.amount_cents, at)
            .await?,
    ))
}

pub async fn score_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.crm.score_customer(id, Utc::now()).await?))
}

pub async fn score_all(State(state): State<AppState>) -> ApiResult<Json<ScoreAllResponse>> {
    let computed_at = Utc::now();
    let updated = state.crm.score_all(computed_at).await?;
    Ok(Json(ScoreAllResponse {
        updated,
        computed_at,
    }))
}

pub async fn high_churn_risk(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.crm.high_churn_risk().await?))
}

pub async fn high_value(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.crm.high_value().await?))
}

pub async fn inactive(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.crm.inactive(Utc::now()).await?))
}

pub async fn segmentation(State(state): State<AppState>) -> ApiResult<Json<Vec<SegmentShare>>> {
    Ok(Json(state.crm.segment_distribution().await?))
}

pub async fn payment_behavior(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PaymentBehaviorShare>>> {
    Ok(Json(state.crm.payment_behavior_distribution().await?))
}
