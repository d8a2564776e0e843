use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents, Direction};

pub type ForecastId = Uuid;

/// Upper bound on occurrences produced by a single expansion.
pub const MAX_OCCURRENCES: usize = 1_000;

/// How often a forecast repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    None,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Periodicity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::None => "none",
            Periodicity::Daily => "daily",
            Periodicity::Weekly => "weekly",
            Periodicity::Monthly => "monthly",
            Periodicity::Quarterly => "quarterly",
            Periodicity::Semiannual => "semiannual",
            Periodicity::Annual => "annual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "once" | "aucune" => Some(Periodicity::None),
            "daily" | "quotidienne" => Some(Periodicity::Daily),
            "weekly" | "hebdomadaire" => Some(Periodicity::Weekly),
            "monthly" | "mensuelle" => Some(Periodicity::Monthly),
            "quarterly" | "trimestrielle" => Some(Periodicity::Quarterly),
            "semiannual" | "semestrielle" => Some(Periodicity::Semiannual),
            "annual" | "yearly" | "annuelle" => Some(Periodicity::Annual),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Periodicity::None)
    }

    /// Date of the `k`-th occurrence counted from `anchor` (k = 0 is the
    /// anchor itself). Month-based steps are computed from the anchor, so a
    /// series started on the 31st returns to the 31st after a short month.
    pub fn nth_occurrence(&self, anchor: NaiveDate, k: u32) -> Option<NaiveDate> {
        match self {
            Periodicity::None => (k == 0).then_some(anchor),
            Periodicity::Daily => anchor.checked_add_signed(Duration::days(k as i64)),
            Periodicity::Weekly => anchor.checked_add_signed(Duration::weeks(k as i64)),
            Periodicity::Monthly => add_months_clamped(anchor, k),
            Periodicity::Quarterly => add_months_clamped(anchor, k.checked_mul(3)?),
            Periodicity::Semiannual => add_months_clamped(anchor, k.checked_mul(6)?),
            Periodicity::Annual => add_months_clamped(anchor, k.checked_mul(12)?),
        }
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Add months, landing on the last day of the target month when the
/// anchor day does not exist there (Jan 31 + 1 month = Feb 28/29).
pub fn add_months_clamped(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let first = date.with_day(1)?.checked_add_months(Months::new(months))?;
    first.with_day(date.day()).or_else(|| {
        first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Pending,
    PartiallyRealized,
    Realized,
}

impl ForecastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastStatus::Pending => "pending",
            ForecastStatus::PartiallyRealized => "partially_realized",
            ForecastStatus::Realized => "realized",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ForecastStatus::Pending),
            "partially_realized" => Some(ForecastStatus::PartiallyRealized),
            "realized" => Some(ForecastStatus::Realized),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An expected future cash movement.
///
/// A recurring forecast acts as a template: expanding it creates one
/// non-recurring forecast per occurrence, linked back through `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashForecast {
    pub id: ForecastId,
    pub account_id: AccountId,
    pub label: String,
    pub direction: Direction,
    pub amount_cents: Cents,
    pub expected_date: NaiveDate,
    pub periodicity: Periodicity,
    pub end_date: Option<NaiveDate>,
    pub realized_cents: Cents,
    pub status: ForecastStatus,
    pub parent_id: Option<ForecastId>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CashForecast {
    pub fn new(
        account_id: AccountId,
        label: impl Into<String>,
        direction: Direction,
        amount_cents: Cents,
        expected_date: NaiveDate,
    ) -> Self {
        debug_assert!(amount_cents > 0, "Forecast amount must be positive");
        Self {
            id: Uuid::new_v4(),
            account_id,
            label: label.into(),
            direction,
            amount_cents,
            expected_date,
            periodicity: Periodicity::None,
            end_date: None,
            realized_cents: 0,
            status: ForecastStatus::Pending,
            parent_id: None,
            category: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_periodicity(mut self, periodicity: Periodicity) -> Self {
        self.periodicity = periodicity;
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.periodicity.is_recurring()
    }

    /// Amount still expected.
    pub fn outstanding(&self) -> Cents {
        (self.amount_cents - self.realized_cents).max(0)
    }

    pub fn signed_outstanding(&self) -> Cents {
        self.direction.signed(self.outstanding())
    }

    /// Last date an occurrence may fall on: the explicit end date, or the
    /// expected date plus the default horizon.
    pub fn series_end(&self, default_horizon_months: u32) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            add_months_clamped(self.expected_date, default_horizon_months)
                .unwrap_or(NaiveDate::MAX)
        })
    }

    /// Dates of the occurrences following the template's own date, up to
    /// and including the series end. The template itself stands for the
    /// first occurrence.
    pub fn occurrence_dates(&self, default_horizon_months: u32) -> Vec<NaiveDate> {
        if !self.is_recurring() {
            return vec![];
        }

        let end = self.series_end(default_horizon_months);
        let mut dates = Vec::new();
        for k in 1.. {
            if dates.len() >= MAX_OCCURRENCES {
                break;
            }
            match self.periodicity.nth_occurrence(self.expected_date, k) {
                Some(date) if date <= end => dates.push(date),
                _ => break,
            }
        }
        dates
    }

    /// Materialize the occurrences as standalone forecasts.
    pub fn expand(&self, default_horizon_months: u32) -> Vec<CashForecast> {
        self.occurrence_dates(default_horizon_months)
            .into_iter()
            .map(|date| {
                let mut occurrence = CashForecast::new(
                    self.account_id,
                    self.label.clone(),
                    self.direction,
                    self.amount_cents,
                    date,
                );
                occurrence.parent_id = Some(self.id);
                occurrence.category = self.category.clone();
                occurrence
            })
            .collect()
    }

    /// Add a realized amount and update the status accordingly.
    pub fn record_realization(&mut self, amount: Cents) {
        self.realized_cents = self.realized_cents.saturating_add(amount);
        self.status = if self.realized_cents >= self.amount_cents {
            ForecastStatus::Realized
        } else if self.realized_cents > 0 {
            ForecastStatus::PartiallyRealized
        } else {
            ForecastStatus::Pending
        };
    }
}
