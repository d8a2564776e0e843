use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    AccountId, BankAccount, CashForecast, Cents, Direction, ForecastId, Periodicity,
    add_months_clamped,
};
use crate::storage::ForecastFilter;

use super::treasury::check_amount;
use super::{AppError, TreasuryService};

/// Input for a new forecast.
#[derive(Debug, Clone)]
pub struct NewForecast {
    pub account_id: AccountId,
    pub label: String,
    pub direction: Direction,
    pub amount_cents: Cents,
    pub expected_date: NaiveDate,
    pub periodicity: Periodicity,
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
}

/// One step of a balance projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub date: NaiveDate,
    pub forecast_id: ForecastId,
    pub label: String,
    /// Signed outstanding amount of the forecast
    pub amount: Cents,
    pub balance: Cents,
}

/// Expected evolution of an account balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceProjection {
    pub account_id: AccountId,
    pub account_name: String,
    pub currency: String,
    pub as_of: NaiveDate,
    pub horizon_end: NaiveDate,
    pub starting_balance: Cents,
    pub overdraft_limit: Cents,
    pub points: Vec<ProjectionPoint>,
    pub ending_balance: Cents,
    pub lowest_balance: Cents,
    pub lowest_balance_date: NaiveDate,
    /// First date the balance falls below `-overdraft_limit`
    pub first_overdraft_date: Option<NaiveDate>,
}

impl BalanceProjection {
    /// Apply the outstanding part of each forecast, in date order, up to
    /// `horizon_end`. A recurring template counts once, on its own date;
    /// its later dates come from expanded occurrences. Fully realized
    /// forecasts are skipped.
    pub fn compute(
        account: &BankAccount,
        forecasts: &[CashForecast],
        as_of: NaiveDate,
        horizon_end: NaiveDate,
    ) -> Self {
        let mut pending: Vec<&CashForecast> = forecasts
            .iter()
            .filter(|f| f.account_id == account.id)
            .filter(|f| f.outstanding() > 0)
            .filter(|f| f.expected_date <= horizon_end)
            .collect();
        pending.sort_by_key(|f| (f.expected_date, f.created_at));

        let floor = -account.overdraft_limit;
        let mut balance = account.balance;
        let mut lowest_balance = balance;
        let mut lowest_balance_date = as_of;
        let mut first_overdraft_date = (balance < floor).then_some(as_of);
        let mut points = Vec::with_capacity(pending.len());

        for forecast in pending {
            let amount = forecast.signed_outstanding();
            balance = balance.saturating_add(amount);

            if balance < lowest_balance {
                lowest_balance = balance;
                lowest_balance_date = forecast.expected_date;
            }
            if first_overdraft_date.is_none() && balance < floor {
                first_overdraft_date = Some(forecast.expected_date);
            }

            points.push(ProjectionPoint {
                date: forecast.expected_date,
                forecast_id: forecast.id,
                label: forecast.label.clone(),
                amount,
                balance,
            });
        }

        Self {
            account_id: account.id,
            account_name: account.name.clone(),
            currency: account.currency.clone(),
            as_of,
            horizon_end,
            starting_balance: account.balance,
            overdraft_limit: account.overdraft_limit,
            points,
            ending_balance: balance,
            lowest_balance,
            lowest_balance_date,
            first_overdraft_date,
        }
    }
}

impl TreasuryService {
    // ========================
    // Forecast operations
    // ========================

    pub async fn create_forecast(&self, new: NewForecast) -> Result<CashForecast, AppError> {
        check_amount(new.amount_cents)?;
        if new.end_date.is_some_and(|end| end < new.expected_date) {
            return Err(AppError::InvalidInput(
                "End date is before the expected date".to_string(),
            ));
        }

        let account = self.get_account(new.account_id).await?;
        if account.is_closed() {
            return Err(AppError::AccountClosed(account.name));
        }

        let mut forecast = CashForecast::new(
            account.id,
            new.label,
            new.direction,
            new.amount_cents,
            new.expected_date,
        )
        .with_periodicity(new.periodicity);
        if let Some(end) = new.end_date {
            forecast = forecast.with_end_date(end);
        }
        if let Some(category) = new.category {
            forecast = forecast.with_category(category);
        }

        self.repo.save_forecast(&forecast).await?;
        info!(
            account = %account.name,
            label = %forecast.label,
            periodicity = %forecast.periodicity,
            amount = forecast.amount_cents,
            "forecast created"
        );
        Ok(forecast)
    }

    pub async fn get_forecast(&self, id: ForecastId) -> Result<CashForecast, AppError> {
        self.repo
            .get_forecast(id)
            .await?
            .ok_or_else(|| AppError::ForecastNotFound(id.to_string()))
    }

    pub async fn list_forecasts(&self, filter: &ForecastFilter) -> Result<Vec<CashForecast>, AppError> {
        Ok(self.repo.list_forecasts(filter).await?)
    }

    /// Materialize the occurrences of a recurring forecast. Occurrences that
    /// already exist for the same date are not duplicated, so expanding
    /// twice is harmless. Returns the newly created occurrences.
    pub async fn expand_forecast(&self, id: ForecastId) -> Result<Vec<CashForecast>, AppError> {
        let template = self.get_forecast(id).await?;
        if !template.is_recurring() {
            warn!(forecast = %id, "expansion rejected: forecast is not recurring");
            return Err(AppError::ForecastNotRecurring(id.to_string()));
        }

        let existing: HashSet<NaiveDate> = self
            .repo
            .list_occurrence_dates(id)
            .await?
            .into_iter()
            .collect();

        let occurrences: Vec<CashForecast> = template
            .expand(self.horizon_months)
            .into_iter()
            .filter(|o| !existing.contains(&o.expected_date))
            .collect();

        self.repo.save_forecasts(&occurrences).await?;
        info!(
            forecast = %id,
            periodicity = %template.periodicity,
            created = occurrences.len(),
            skipped = existing.len(),
            "forecast expanded"
        );
        Ok(occurrences)
    }

    /// Record money actually received or paid against a forecast.
    pub async fn record_realization(
        &self,
        id: ForecastId,
        amount_cents: Cents,
    ) -> Result<CashForecast, AppError> {
        check_amount(amount_cents)?;

        let mut forecast = self.get_forecast(id).await?;
        forecast.record_realization(amount_cents);
        self.repo
            .update_forecast_realization(id, forecast.realized_cents, forecast.status)
            .await?;

        info!(
            forecast = %id,
            realized = forecast.realized_cents,
            status = %forecast.status,
            "forecast realization recorded"
        );
        Ok(forecast)
    }

    /// Project an account balance over the next `months` months (the
    /// configured horizon when `None`).
    pub async fn project_balance(
        &self,
        account_id: AccountId,
        months: Option<u32>,
    ) -> Result<BalanceProjection, AppError> {
        let account = self.get_account(account_id).await?;
        let as_of = Utc::now().date_naive();
        let months = months.unwrap_or(self.horizon_months);
        let horizon_end = add_months_clamped(as_of, months).ok_or_else(|| {
            AppError::InvalidInput(format!("Projection horizon out of range: {} months", months))
        })?;

        let forecasts = self
            .repo
            .list_forecasts(&ForecastFilter {
                account_id: Some(account.id),
                to: Some(horizon_end),
                outstanding_only: true,
                ..Default::default()
            })
            .await?;

        Ok(BalanceProjection::compute(
            &account,
            &forecasts,
            as_of,
            horizon_end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::AccountKind;

    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn account(balance: Cents, overdraft: Cents) -> BankAccount {
        BankAccount::new("Ecobank".into(), AccountKind::Bank, "XOF".into())
            .with_opening_balance(balance)
            .with_overdraft_limit(overdraft)
    }

    #[test]
    fn test_projection_orders_by_date_and_tracks_lowest() {
        let acc = account(100_000, 0);
        let forecasts = vec![
            CashForecast::new(acc.id, "Client", Direction::Inflow, 50_000, day("2024-03-20")),
            CashForecast::new(acc.id, "Salaires", Direction::Outflow, 120_000, day("2024-03-05")),
        ];

        let projection =
            BalanceProjection::compute(&acc, &forecasts, day("2024-03-01"), day("2024-12-31"));

        assert_eq!(projection.points.len(), 2);
        assert_eq!(projection.points[0].label, "Salaires");
        assert_eq!(projection.points[0].balance, -20_000);
        assert_eq!(projection.points[1].balance, 30_000);
        assert_eq!(projection.lowest_balance, -20_000);
        assert_eq!(projection.lowest_balance_date, day("2024-03-05"));
        assert_eq!(projection.first_overdraft_date, Some(day("2024-03-05")));
        assert_eq!(projection.ending_balance, 30_000);
    }

    #[test]
    fn test_projection_respects_overdraft_floor() {
        let acc = account(10_000, 50_000);
        let forecasts = vec![
            CashForecast::new(acc.id, "Loyer", Direction::Outflow, 40_000, day("2024-04-01")),
            CashForecast::new(acc.id, "Impots", Direction::Outflow, 30_000, day("2024-04-15")),
        ];

        let projection =
            BalanceProjection::compute(&acc, &forecasts, day("2024-03-01"), day("2024-12-31"));

        // -30 000 stays within the 50 000 overdraft, -60 000 does not
        assert_eq!(projection.first_overdraft_date, Some(day("2024-04-15")));
    }

    #[test]
    fn test_projection_uses_outstanding_and_counts_templates_once() {
        let acc = account(0, 0);
        let mut partial =
            CashForecast::new(acc.id, "Facture 12", Direction::Inflow, 10_000, day("2024-05-01"));
        partial.record_realization(4_000);
        let template = CashForecast::new(acc.id, "Abonnement", Direction::Outflow, 1_000, day("2024-05-02"))
            .with_periodicity(Periodicity::Monthly);
        let mut settled =
            CashForecast::new(acc.id, "Facture 11", Direction::Inflow, 7_000, day("2024-05-03"));
        settled.record_realization(7_000);
        let beyond =
            CashForecast::new(acc.id, "Plus tard", Direction::Inflow, 9_000, day("2025-06-01"));

        let projection = BalanceProjection::compute(
            &acc,
            &[partial, template, settled, beyond],
            day("2024-04-30"),
            day("2024-12-31"),
        );

        // The template contributes its own date only
        assert_eq!(projection.points.len(), 2);
        assert_eq!(projection.points[0].amount, 6_000);
        assert_eq!(projection.points[1].label, "Abonnement");
        assert_eq!(projection.points[1].amount, -1_000);
        assert_eq!(projection.ending_balance, 5_000);
        assert_eq!(projection.first_overdraft_date, None);
        assert_eq!(projection.lowest_balance, 0);
    }
}
