use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Cents, Customer, CustomerId, CustomerSegment, CustomerStats, MAX_AMOUNT_CENTS, scoring,
};
use crate::storage::Repository;

use super::AppError;
use super::treasury::check_amount;

/// Churn probability from which a customer is listed as at risk.
pub const HIGH_CHURN_THRESHOLD: f64 = 0.7;

/// Days without a purchase after which a customer is inactive.
pub const INACTIVITY_DAYS: i64 = 180;

/// Customer management and intelligence scoring.
#[derive(Clone)]
pub struct CrmService {
    pub(super) repo: Repository,
}

/// Fields of an existing customer to overwrite. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub total_revenue_cents: Option<Cents>,
    pub purchase_frequency: Option<u32>,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub avg_payment_delay_days: Option<i32>,
}

impl CrmService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn create_customer(
        &self,
        name: String,
        email: Option<String>,
        stats: CustomerStats,
    ) -> Result<Customer, AppError> {
        if self.repo.get_customer_by_name(&name).await?.is_some() {
            return Err(AppError::CustomerAlreadyExists(name));
        }
        check_revenue(stats.total_revenue_cents)?;

        let mut customer = Customer::new(name).with_stats(stats);
        if let Some(email) = email {
            customer = customer.with_email(email);
        }

        self.repo.save_customer(&customer).await?;
        info!(customer = %customer.name, "customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        self.repo
            .get_customer(id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(id.to_string()))
    }

    /// Look a customer up by UUID or, failing that, by name.
    pub async fn resolve_customer(&self, key: &str) -> Result<Customer, AppError> {
        let found = match Uuid::parse_str(key) {
            Ok(id) => self.repo.get_customer(id).await?,
            Err(_) => self.repo.get_customer_by_name(key).await?,
        };
        found.ok_or_else(|| AppError::CustomerNotFound(key.to_string()))
    }

    pub async fn list_customers(&self, include_inactive: bool) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers(include_inactive).await?)
    }

    /// Overwrite identity fields and statistics. Cached intelligence is left
    /// untouched until the customer is scored again.
    pub async fn update_customer(
        &self,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, AppError> {
        let mut customer = self.get_customer(id).await?;

        if let Some(name) = update.name {
            if name != customer.name && self.repo.get_customer_by_name(&name).await?.is_some() {
                return Err(AppError::CustomerAlreadyExists(name));
            }
            customer.name = name;
        }
        if let Some(email) = update.email {
            customer.email = Some(email);
        }
        if let Some(revenue) = update.total_revenue_cents {
            check_revenue(revenue)?;
            customer.stats.total_revenue_cents = revenue;
        }
        if let Some(frequency) = update.purchase_frequency {
            customer.stats.purchase_frequency = frequency;
        }
        if let Some(at) = update.last_purchase_at {
            customer.stats.last_purchase_at = Some(at);
        }
        if let Some(delay) = update.avg_payment_delay_days {
            customer.stats.avg_payment_delay_days = delay;
        }
        customer.updated_at = Utc::now();

        self.repo.update_customer(&customer).await?;
        info!(customer = %customer.name, "customer updated");
        Ok(customer)
    }

    /// Soft delete: the customer is kept but excluded from lists and scoring.
    pub async fn deactivate_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        let mut customer = self.get_customer(id).await?;
        customer.active = false;
        customer.updated_at = Utc::now();
        self.repo.update_customer(&customer).await?;
        info!(customer = %customer.name, "customer deactivated");
        Ok(customer)
    }

    /// Fold a purchase into the customer statistics.
    pub async fn record_purchase(
        &self,
        id: CustomerId,
        amount_cents: Cents,
        at: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        check_amount(amount_cents)?;

        let mut customer = self.get_customer(id).await?;
        if customer.record_purchase(amount_cents, at).is_none() {
            return Err(AppError::InvalidAmount(format!(
                "Revenue of customer {} would leave the representable range",
                customer.name
            )));
        }
        self.repo.update_customer(&customer).await?;
        info!(
            customer = %customer.name,
            amount = amount_cents,
            total = customer.stats.total_revenue_cents,
            "purchase recorded"
        );
        Ok(customer)
    }

    /// Recompute and cache the intelligence of one customer as of `now`.
    pub async fn score_customer(
        &self,
        id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Customer, AppError> {
        let mut customer = self.get_customer(id).await?;
        let intelligence = scoring::evaluate(&customer.stats, now);
        self.repo.save_intelligence(customer.id, &intelligence).await?;

        info!(
            customer = %customer.name,
            score = intelligence.score,
            segment = %intelligence.segment,
            churn = intelligence.churn_probability,
            "customer scored"
        );
        customer.intelligence = Some(intelligence);
        Ok(customer)
    }

    /// Rescore every active customer. Returns the number scored.
    pub async fn score_all(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let customers = self.repo.list_customers(false).await?;
        for customer in &customers {
            let intelligence = scoring::evaluate(&customer.stats, now);
            self.repo.save_intelligence(customer.id, &intelligence).await?;
        }
        info!(count = customers.len(), "customer intelligence refreshed");
        Ok(customers.len())
    }

    /// Active customers whose cached churn probability is high.
    pub async fn high_churn_risk(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.repo.list_customers_by_churn(HIGH_CHURN_THRESHOLD).await?)
    }

    /// Active customers currently segmented as VIP or strategic.
    pub async fn high_value(&self) -> Result<Vec<Customer>, AppError> {
        let segments: Vec<CustomerSegment> = CustomerSegment::ALL
            .into_iter()
            .filter(|s| s.is_high_value())
            .collect();
        Ok(self.repo.list_customers_in_segments(&segments).await?)
    }

    /// Active customers without a purchase in the last 180 days.
    pub async fn inactive(&self, now: DateTime<Utc>) -> Result<Vec<Customer>, AppError> {
        let cutoff = now - Duration::days(INACTIVITY_DAYS);
        Ok(self.repo.list_customers_inactive_since(cutoff).await?)
    }
}

fn check_revenue(revenue: Cents) -> Result<(), AppError> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&revenue) {
        return Err(AppError::InvalidAmount(format!(
            "Revenue must be between 0 and {} cents",
            MAX_AMOUNT_CENTS
        )));
    }
    Ok(())
}
