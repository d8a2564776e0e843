use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{AccountKind, BankAccount, Cents};

use super::{AppState, error::ApiResult};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    pub kind: AccountKind,
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: String,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    #[serde(default)]
    pub opening_balance_cents: Cents,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000000000000000i64, message = "Overdraft limit must be 0 to 10 000 000 000 000.00"))]
    pub overdraft_limit_cents: Cents,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub include_closed: bool,
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> ApiResult<Json<Vec<BankAccount>>> {
    Ok(Json(state.treasury.list_accounts(query.include_closed).await?))
}

#[tracing::instrument(skip(state, request))]
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> ApiResult<(StatusCode, Json<BankAccount>)> {
    request.validate()?;

    let mut account = BankAccount::new(request.name, request.kind, request.currency)
        .with_opening_balance(request.opening_balance_cents)
        .with_overdraft_limit(request.overdraft_limit_cents);
    if let Some(number) = request.account_number {
        account = account.with_account_number(number);
    }
    if let Some(bank) = request.bank_name {
        account = account.with_bank_name(bank);
    }
    if let Some(description) = request.description {
        account = account.with_description(description);
    }

    let account = state.treasury.create_account(account).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BankAccount>> {
    Ok(Json(state.treasury.get_account(id).await?))
}

/// Closing keeps the account and its history; it only stops new movements.
pub async fn close_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BankAccount>> {
    Ok(Json(state.treasury.close_account(id).await?))
}
