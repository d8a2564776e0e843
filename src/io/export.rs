use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

use crate::application::{CrmService, TreasuryService};
use crate::domain::{AccountId, BankAccount, CashForecast, CashMovement, Customer, format_cents};
use crate::storage::{ForecastFilter, MovementFilter};

/// Full database snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<BankAccount>,
    pub movements: Vec<CashMovement>,
    pub forecasts: Vec<CashForecast>,
    pub customers: Vec<Customer>,
}

/// Exporter for converting treasury and CRM data to CSV or JSON
pub struct Exporter<'a> {
    treasury: &'a TreasuryService,
    crm: &'a CrmService,
}

impl<'a> Exporter<'a> {
    pub fn new(treasury: &'a TreasuryService, crm: &'a CrmService) -> Self {
        Self { treasury, crm }
    }

    async fn account_names(&self) -> Result<HashMap<AccountId, String>> {
        let accounts = self.treasury.list_accounts(true).await?;
        Ok(accounts.into_iter().map(|a| (a.id, a.name)).collect())
    }

    /// Export movements to CSV, in sequence order.
    pub async fn export_movements_csv<W: Write>(
        &self,
        writer: W,
        filter: &MovementFilter,
    ) -> Result<usize> {
        let movements = self.treasury.list_movements(filter).await?;
        let names = self.account_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "id",
            "date",
            "account",
            "label",
            "direction",
            "amount",
            "counterparty",
            "settlement_mode",
            "reference",
            "category",
            "balance_after",
            "status",
        ])?;

        for movement in &movements {
            csv_writer.write_record([
                movement.sequence.to_string(),
                movement.id.to_string(),
                movement.date.to_string(),
                names.get(&movement.account_id).cloned().unwrap_or_default(),
                movement.label.clone(),
                movement.direction.as_str().to_string(),
                format_cents(movement.amount_cents),
                movement.counterparty.clone().unwrap_or_default(),
                movement
                    .settlement_mode
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
                movement.reference.clone().unwrap_or_default(),
                movement.category.clone().unwrap_or_default(),
                format_cents(movement.balance_after),
                movement.status.as_str().to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(movements.len())
    }

    /// Export every account with its balances to CSV.
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.treasury.list_accounts(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "name",
            "kind",
            "currency",
            "account_number",
            "bank_name",
            "opening_balance",
            "balance",
            "overdraft_limit",
            "closed_at",
        ])?;

        for account in &accounts {
            csv_writer.write_record([
                account.name.clone(),
                account.kind.as_str().to_string(),
                account.currency.clone(),
                account.account_number.clone().unwrap_or_default(),
                account.bank_name.clone().unwrap_or_default(),
                format_cents(account.opening_balance),
                format_cents(account.balance),
                format_cents(account.overdraft_limit),
                account.closed_at.map(|dt| dt.to_rfc3339()).unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export forecasts, templates and occurrences alike, to CSV.
    pub async fn export_forecasts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let forecasts = self.treasury.list_forecasts(&ForecastFilter::default()).await?;
        let names = self.account_names().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "account",
            "label",
            "direction",
            "amount",
            "expected_date",
            "periodicity",
            "end_date",
            "realized",
            "status",
            "parent_id",
            "category",
        ])?;

        for forecast in &forecasts {
            csv_writer.write_record([
                forecast.id.to_string(),
                names.get(&forecast.account_id).cloned().unwrap_or_default(),
                forecast.label.clone(),
                forecast.direction.as_str().to_string(),
                format_cents(forecast.amount_cents),
                forecast.expected_date.to_string(),
                forecast.periodicity.as_str().to_string(),
                forecast.end_date.map(|d| d.to_string()).unwrap_or_default(),
                format_cents(forecast.realized_cents),
                forecast.status.as_str().to_string(),
                forecast.parent_id.map(|id| id.to_string()).unwrap_or_default(),
                forecast.category.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(forecasts.len())
    }

    /// Export the whole database as a JSON snapshot.
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.treasury.list_accounts(true).await?,
            movements: self.treasury.list_movements(&MovementFilter::default()).await?,
            forecasts: self.treasury.list_forecasts(&ForecastFilter::default()).await?,
            customers: self.crm.list_customers(true).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
