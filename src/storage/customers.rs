use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{
    Customer, CustomerId, CustomerIntelligence, CustomerSegment, CustomerStats, PaymentBehavior,
    RiskLevel,
};

use super::repository::parse_timestamp;
use super::Repository;

const CUSTOMER_COLUMNS: &str = "id, name, email, total_revenue_cents, purchase_frequency, last_purchase_at, avg_payment_delay_days, active, score, segment, churn_probability, predicted_ltv_cents, payment_behavior, satisfaction_score, risk_level, days_since_last_purchase, avg_order_value_cents, scored_at, created_at, updated_at";

impl Repository {
    // ========================
    // Customer operations
    // ========================

    pub async fn save_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, total_revenue_cents, purchase_frequency, last_purchase_at, avg_payment_delay_days, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer.id.to_string())
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.stats.total_revenue_cents)
        .bind(customer.stats.purchase_frequency as i64)
        .bind(customer.stats.last_purchase_at.map(|dt| dt.to_rfc3339()))
        .bind(customer.stats.avg_payment_delay_days)
        .bind(customer.active)
        .bind(customer.created_at.to_rfc3339())
        .bind(customer.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save customer")?;

        if let Some(intelligence) = &customer.intelligence {
            self.save_intelligence(customer.id, intelligence).await?;
        }
        Ok(())
    }

    /// Persist name, email, statistics and the active flag.
    pub async fn update_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE customers
            SET name = ?, email = ?, total_revenue_cents = ?, purchase_frequency = ?, last_purchase_at = ?,
                avg_payment_delay_days = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.stats.total_revenue_cents)
        .bind(customer.stats.purchase_frequency as i64)
        .bind(customer.stats.last_purchase_at.map(|dt| dt.to_rfc3339()))
        .bind(customer.stats.avg_payment_delay_days)
        .bind(customer.active)
        .bind(customer.updated_at.to_rfc3339())
        .bind(customer.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update customer")?;
        Ok(())
    }

    /// Cache computed intelligence on the customer row.
    pub async fn save_intelligence(
        &self,
        id: CustomerId,
        intelligence: &CustomerIntelligence,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE customers
            SET score = ?, segment = ?, churn_probability = ?, predicted_ltv_cents = ?, payment_behavior = ?,
                satisfaction_score = ?, risk_level = ?, days_since_last_purchase = ?, avg_order_value_cents = ?, scored_at = ?
            WHERE id = ?
            "#,
        )
        .bind(intelligence.score as i64)
        .bind(intelligence.segment.as_str())
        .bind(intelligence.churn_probability)
        .bind(intelligence.predicted_ltv_cents)
        .bind(intelligence.payment_behavior.as_str())
        .bind(intelligence.satisfaction_score as i64)
        .bind(intelligence.risk_level.as_str())
        .bind(intelligence.days_since_last_purchase)
        .bind(intelligence.avg_order_value_cents)
        .bind(intelligence.computed_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save customer intelligence")?;
        Ok(())
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!("SELECT {} FROM customers WHERE id = ?", CUSTOMER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    pub async fn get_customer_by_name(&self, name: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!("SELECT {} FROM customers WHERE name = ?", CUSTOMER_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch customer by name")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    /// List customers by name.
    pub async fn list_customers(&self, include_inactive: bool) -> Result<Vec<Customer>> {
        let filter = if include_inactive { "" } else { "WHERE active = 1" };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers {} ORDER BY name",
            CUSTOMER_COLUMNS, filter
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Active customers whose cached churn probability is at least `threshold`,
    /// highest first.
    pub async fn list_customers_by_churn(&self, threshold: f64) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM customers WHERE active = 1 AND churn_probability >= ? ORDER BY churn_probability DESC, name",
            CUSTOMER_COLUMNS
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list customers by churn")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Active customers in any of the given cached segments, highest revenue first.
    pub async fn list_customers_in_segments(
        &self,
        segments: &[CustomerSegment],
    ) -> Result<Vec<Customer>> {
        if segments.is_empty() {
            return Ok(vec![]);
        }

        let placeholders = vec!["?"; segments.len()].join(", ");
        let query = format!(
            "SELECT {} FROM customers WHERE active = 1 AND segment IN ({}) ORDER BY total_revenue_cents DESC, name",
            CUSTOMER_COLUMNS, placeholders
        );

        let mut sql_query = sqlx::query(&query);
        for segment in segments {
            sql_query = sql_query.bind(segment.as_str());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list customers by segment")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Active customers with no purchase since `cutoff`. Customers who never
    /// bought count once they are older than the cutoff.
    pub async fn list_customers_inactive_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>> {
        let cutoff_str = cutoff.to_rfc3339();
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM customers
            WHERE active = 1
              AND ((last_purchase_at IS NOT NULL AND last_purchase_at < ?)
                OR (last_purchase_at IS NULL AND created_at < ?))
            ORDER BY last_purchase_at, name
            "#,
            CUSTOMER_COLUMNS
        ))
        .bind(&cutoff_str)
        .bind(&cutoff_str)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list inactive customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    /// Number of scored active customers per cached value of `column`.
    async fn count_customers_by(&self, column: &str) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(&format!(
            "SELECT {col} as value, COUNT(*) as count FROM customers WHERE active = 1 AND {col} IS NOT NULL GROUP BY {col}",
            col = column
        ))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to count customers by {}", column))?;

        Ok(rows
            .iter()
            .map(|row| (row.get("value"), row.get("count")))
            .collect())
    }

    pub async fn count_customers_by_segment(&self) -> Result<Vec<(CustomerSegment, i64)>> {
        self.count_customers_by("segment")
            .await?
            .into_iter()
            .map(|(value, count)| {
                CustomerSegment::from_str(&value)
                    .map(|segment| (segment, count))
                    .ok_or_else(|| anyhow::anyhow!("Invalid customer segment: {}", value))
            })
            .collect()
    }

    pub async fn count_customers_by_payment_behavior(&self) -> Result<Vec<(PaymentBehavior, i64)>> {
        self.count_customers_by("payment_behavior")
            .await?
            .into_iter()
            .map(|(value, count)| {
                PaymentBehavior::from_str(&value)
                    .map(|behavior| (behavior, count))
                    .ok_or_else(|| anyhow::anyhow!("Invalid payment behavior: {}", value))
            })
            .collect()
    }

    fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer> {
        let id_str: String = row.get("id");
        let last_purchase_str: Option<String> = row.get("last_purchase_at");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");
        let scored_at_str: Option<String> = row.get("scored_at");

        let intelligence = match scored_at_str {
            Some(scored_at) => Some(Self::row_to_intelligence(row, &scored_at)?),
            None => None,
        };

        Ok(Customer {
            id: Uuid::parse_str(&id_str).context("Invalid customer ID")?,
            name: row.get("name"),
            email: row.get("email"),
            stats: CustomerStats {
                total_revenue_cents: row.get("total_revenue_cents"),
                purchase_frequency: row.get::<i64, _>("purchase_frequency").max(0) as u32,
                last_purchase_at: last_purchase_str.as_deref().map(parse_timestamp).transpose()?,
                avg_payment_delay_days: row.get("avg_payment_delay_days"),
            },
            active: row.get::<i32, _>("active") != 0,
            intelligence,
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }

    fn row_to_intelligence(row: &sqlx::sqlite::SqliteRow, scored_at: &str) -> Result<CustomerIntelligence> {
        let segment_str: String = row.get("segment");
        let behavior_str: String = row.get("payment_behavior");
        let risk_str: String = row.get("risk_level");

        Ok(CustomerIntelligence {
            score: row.get::<i64, _>("score").clamp(0, 100) as u8,
            segment: CustomerSegment::from_str(&segment_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid customer segment: {}", segment_str))?,
            churn_probability: row.get("churn_probability"),
            predicted_ltv_cents: row.get("predicted_ltv_cents"),
            payment_behavior: PaymentBehavior::from_str(&behavior_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid payment behavior: {}", behavior_str))?,
            satisfaction_score: row.get::<i64, _>("satisfaction_score").clamp(0, 100) as u8,
            risk_level: RiskLevel::from_str(&risk_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid risk level: {}", risk_str))?,
            days_since_last_purchase: row.get("days_since_last_purchase"),
            avg_order_value_cents: row.get("avg_order_value_cents"),
            computed_at: parse_timestamp(scored_at)?,
        })
    }
}
