use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{
    AccountId, CashForecast, Cents, Direction, ForecastId, ForecastStatus, Periodicity,
};

use super::repository::{DATE_FORMAT, parse_date, parse_timestamp};
use super::Repository;

const FORECAST_COLUMNS: &str = "id, account_id, label, direction, amount_cents, expected_date, periodicity, end_date, realized_cents, status, parent_id, category, created_at";

/// Optional filters for listing forecasts. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ForecastFilter {
    pub account_id: Option<AccountId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Skip forecasts that are fully realized
    pub outstanding_only: bool,
}

impl Repository {
    // ========================
    // Forecast operations
    // ========================

    pub async fn save_forecast(&self, forecast: &CashForecast) -> Result<()> {
        self.save_forecasts(std::slice::from_ref(forecast)).await
    }

    /// Save several forecasts atomically.
    pub async fn save_forecasts(&self, forecasts: &[CashForecast]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for forecast in forecasts {
            sqlx::query(&format!(
                "INSERT INTO forecasts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                FORECAST_COLUMNS
            ))
            .bind(forecast.id.to_string())
            .bind(forecast.account_id.to_string())
            .bind(&forecast.label)
            .bind(forecast.direction.as_str())
            .bind(forecast.amount_cents)
            .bind(forecast.expected_date.format(DATE_FORMAT).to_string())
            .bind(forecast.periodicity.as_str())
            .bind(forecast.end_date.map(|d| d.format(DATE_FORMAT).to_string()))
            .bind(forecast.realized_cents)
            .bind(forecast.status.as_str())
            .bind(forecast.parent_id.map(|id| id.to_string()))
            .bind(&forecast.category)
            .bind(forecast.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save forecast")?;
        }

        tx.commit().await.context("Failed to commit forecasts")?;
        Ok(())
    }

    pub async fn get_forecast(&self, id: ForecastId) -> Result<Option<CashForecast>> {
        let row = sqlx::query(&format!("SELECT {} FROM forecasts WHERE id = ?", FORECAST_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch forecast")?;

        row.as_ref().map(Self::row_to_forecast).transpose()
    }

    /// List forecasts ordered by expected date.
    pub async fn list_forecasts(&self, filter: &ForecastFilter) -> Result<Vec<CashForecast>> {
        let mut query = format!("SELECT {} FROM forecasts WHERE 1=1", FORECAST_COLUMNS);

        let account_id_str = filter.account_id.map(|id| id.to_string());
        let from_str = filter.from.map(|d| d.format(DATE_FORMAT).to_string());
        let to_str = filter.to.map(|d| d.format(DATE_FORMAT).to_string());

        if account_id_str.is_some() {
            query.push_str(" AND account_id = ?");
        }
        if from_str.is_some() {
            query.push_str(" AND expected_date >= ?");
        }
        if to_str.is_some() {
            query.push_str(" AND expected_date <= ?");
        }
        if filter.outstanding_only {
            query.push_str(" AND status != 'realized'");
        }
        query.push_str(" ORDER BY expected_date, created_at");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = account_id_str {
            sql_query = sql_query.bind(id);
        }
        if let Some(ref from) = from_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list forecasts")?;

        rows.iter().map(Self::row_to_forecast).collect()
    }

    /// Expected dates of the occurrences already expanded from a template.
    pub async fn list_occurrence_dates(&self, parent_id: ForecastId) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query("SELECT expected_date FROM forecasts WHERE parent_id = ? ORDER BY expected_date")
            .bind(parent_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list occurrence dates")?;

        rows.iter()
            .map(|row| parse_date(&row.get::<String, _>("expected_date")))
            .collect()
    }

    /// Store a new realized amount and status on a forecast.
    pub async fn update_forecast_realization(
        &self,
        id: ForecastId,
        realized_cents: Cents,
        status: ForecastStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE forecasts SET realized_cents = ?, status = ? WHERE id = ?")
            .bind(realized_cents)
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update forecast realization")?;
        Ok(())
    }

    fn row_to_forecast(row: &sqlx::sqlite::SqliteRow) -> Result<CashForecast> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let direction_str: String = row.get("direction");
        let expected_date_str: String = row.get("expected_date");
        let periodicity_str: String = row.get("periodicity");
        let end_date_str: Option<String> = row.get("end_date");
        let status_str: String = row.get("status");
        let parent_id_str: Option<String> = row.get("parent_id");
        let created_at_str: String = row.get("created_at");

        Ok(CashForecast {
            id: Uuid::parse_str(&id_str).context("Invalid forecast ID")?,
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            label: row.get("label"),
            direction: Direction::from_str(&direction_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid direction: {}", direction_str))?,
            amount_cents: row.get("amount_cents"),
            expected_date: parse_date(&expected_date_str)?,
            periodicity: Periodicity::from_str(&periodicity_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid periodicity: {}", periodicity_str))?,
            end_date: end_date_str.as_deref().map(parse_date).transpose()?,
            realized_cents: row.get("realized_cents"),
            status: ForecastStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid forecast status: {}", status_str))?,
            parent_id: parent_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid parent forecast ID")?,
            category: row.get("category"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}
