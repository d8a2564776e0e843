use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountId, AccountKind, Cents, CustomerSegment, PaymentBehavior,
};
use crate::storage::CategoryFlow;

use super::{AppError, CrmService, TreasuryService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryPosition {
    pub as_of: DateTime<Utc>,
    pub accounts: Vec<AccountPosition>,
    /// One entry per currency, amounts are never summed across currencies
    pub totals: Vec<CurrencyTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPosition {
    pub account_id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    pub currency: String,
    pub balance: Cents,
    pub overdraft_limit: Cents,
    pub available: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub account_count: usize,
    pub balance: Cents,
    pub available: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub account_id: AccountId,
    pub account_name: String,
    pub currency: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub opening_balance: Cents,
    pub inflow: Cents,
    pub outflow: Cents,
    pub net: Cents,
    pub closing_balance: Cents,
    pub movement_count: i64,
    pub categories: Vec<CategoryFlow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentShare {
    pub segment: CustomerSegment,
    pub label: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentBehaviorShare {
    pub behavior: PaymentBehavior,
    pub count: i64,
    pub percentage: f64,
}

/// Share of `count` in `total` as a percentage with two decimals.
fn percentage(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 * 10_000.0 / total as f64).round() / 100.0
}

impl TreasuryService {
    // ========================
    // Reporting
    // ========================

    /// Balances of every open account, with per-currency totals.
    pub async fn treasury_position(&self) -> Result<TreasuryPosition, AppError> {
        let accounts = self.repo.list_accounts(false).await?;

        let mut totals: BTreeMap<String, CurrencyTotal> = BTreeMap::new();
        for account in &accounts {
            let total = totals
                .entry(account.currency.clone())
                .or_insert_with(|| CurrencyTotal {
                    currency: account.currency.clone(),
                    account_count: 0,
                    balance: 0,
                    available: 0,
                });
            total.account_count += 1;
            total.balance += account.balance;
            total.available += account.available_balance();
        }

        let accounts = accounts
            .into_iter()
            .map(|account| AccountPosition {
                account_id: account.id,
                available: account.available_balance(),
                name: account.name,
                kind: account.kind,
                currency: account.currency,
                balance: account.balance,
                overdraft_limit: account.overdraft_limit,
            })
            .collect();

        Ok(TreasuryPosition {
            as_of: Utc::now(),
            accounts,
            totals: totals.into_values().collect(),
        })
    }

    /// Inflows and outflows of an account between two value dates (inclusive).
    pub async fn cash_flow(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<CashFlowSummary, AppError> {
        if from > to {
            return Err(AppError::InvalidInput(format!(
                "Start date {} is after end date {}",
                from, to
            )));
        }

        let account = self.get_account(account_id).await?;
        let opening_balance = account.opening_balance + self.repo.net_before(account.id, from).await?;
        let totals = self.repo.sum_flows(Some(account.id), from, to).await?;
        let categories = self
            .repo
            .sum_flows_by_category(Some(account.id), from, to)
            .await?;

        let net = totals.inflow - totals.outflow;
        Ok(CashFlowSummary {
            account_id: account.id,
            account_name: account.name,
            currency: account.currency,
            from,
            to,
            opening_balance,
            inflow: totals.inflow,
            outflow: totals.outflow,
            net,
            closing_balance: opening_balance + net,
            movement_count: totals.count,
            categories,
        })
    }
}

impl CrmService {
    /// Number of scored active customers per segment. Every segment is
    /// listed, including empty ones.
    pub async fn segment_distribution(&self) -> Result<Vec<SegmentShare>, AppError> {
        let counts: BTreeMap<CustomerSegment, i64> =
            self.repo.count_customers_by_segment().await?.into_iter().collect();
        let total: i64 = counts.values().sum();

        Ok(CustomerSegment::ALL
            .into_iter()
            .map(|segment| {
                let count = counts.get(&segment).copied().unwrap_or(0);
                SegmentShare {
                    segment,
                    label: segment.label().to_string(),
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect())
    }

    /// Number of scored active customers per payment behavior.
    pub async fn payment_behavior_distribution(&self) -> Result<Vec<PaymentBehaviorShare>, AppError> {
        let counts: BTreeMap<PaymentBehavior, i64> = self
            .repo
            .count_customers_by_payment_behavior()
            .await?
            .into_iter()
            .collect();
        let total: i64 = counts.values().sum();

        Ok(PaymentBehavior::ALL
            .into_iter()
            .map(|behavior| {
                let count = counts.get(&behavior).copied().unwrap_or(0);
                PaymentBehaviorShare {
                    behavior,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect())
    }
}
