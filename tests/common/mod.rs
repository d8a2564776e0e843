// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use ecompta::application::{CrmService, MovementDetails, TreasuryService};
use ecompta::domain::{AccountKind, BankAccount, CashMovement, Cents, Direction};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TreasuryService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = TreasuryService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Treasury and CRM services sharing one temporary database
pub async fn test_services() -> Result<(TreasuryService, CrmService, TempDir)> {
    let (service, temp_dir) = test_service().await?;
    let crm = CrmService::new(service.repository().clone());
    Ok((service, crm, temp_dir))
}

/// Path of the database created by `test_service`
pub fn db_path(temp_dir: &TempDir) -> String {
    temp_dir.path().join("test.db").to_str().unwrap().to_string()
}

pub fn day(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Midnight UTC of a YYYY-MM-DD date
pub fn at(date_str: &str) -> DateTime<Utc> {
    day(date_str).and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Open a XOF bank account with an opening balance and an overdraft
pub async fn open_account(
    service: &TreasuryService,
    name: &str,
    opening: Cents,
    overdraft: Cents,
) -> Result<BankAccount> {
    let account = BankAccount::new(name.to_string(), AccountKind::Bank, "XOF".to_string())
        .with_opening_balance(opening)
        .with_overdraft_limit(overdraft);
    Ok(service.create_account(account).await?)
}

/// Record a movement without details, refusing overdrafts
pub async fn record(
    service: &TreasuryService,
    account: &BankAccount,
    direction: Direction,
    amount: Cents,
    date: &str,
    label: &str,
) -> Result<CashMovement> {
    Ok(service
        .record_movement(
            account.id,
            direction,
            amount,
            day(date),
            label.to_string(),
            MovementDetails::default(),
            false,
        )
        .await?)
}
