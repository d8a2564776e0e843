use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Petty cash / till
    Cash,
    /// Account held at a bank
    Bank,
    /// Mobile money wallet (Orange Money, Wave, MTN MoMo...)
    MobileMoney,
    Other,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Cash => "cash",
            AccountKind::Bank => "bank",
            AccountKind::MobileMoney => "mobile_money",
            AccountKind::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cash" | "caisse" => Some(AccountKind::Cash),
            "bank" | "banque" => Some(AccountKind::Bank),
            "mobile_money" => Some(AccountKind::MobileMoney),
            "other" | "autre" => Some(AccountKind::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A treasury account (bank, cash box or mobile money wallet).
///
/// `balance` is a running total. It is only ever changed by applying
/// movements, never set directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: AccountId,
    pub name: String,
    pub account_number: Option<String>,
    pub bank_name: Option<String>,
    pub kind: AccountKind,
    pub currency: String,
    pub opening_balance: Cents,
    pub balance: Cents,
    /// Authorized overdraft, always >= 0
    pub overdraft_limit: Cents,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl BankAccount {
    pub fn new(name: String, kind: AccountKind, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            account_number: None,
            bank_name: None,
            kind,
            currency: currency.to_uppercase(),
            opening_balance: 0,
            balance: 0,
            overdraft_limit: 0,
            description: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn with_account_number(mut self, number: impl Into<String>) -> Self {
        self.account_number = Some(number.into());
        self
    }

    pub fn with_bank_name(mut self, bank: impl Into<String>) -> Self {
        self.bank_name = Some(bank.into());
        self
    }

    /// The opening balance is also the starting running balance.
    pub fn with_opening_balance(mut self, opening: Cents) -> Self {
        self.opening_balance = opening;
        self.balance = opening;
        self
    }

    pub fn with_overdraft_limit(mut self, limit: Cents) -> Self {
        self.overdraft_limit = limit.max(0);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Balance plus authorized overdraft.
    pub fn available_balance(&self) -> Cents {
        self.balance.saturating_add(self.overdraft_limit)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_kind_parsing_accepts_french_labels() {
        assert_eq!(AccountKind::from_str("BANQUE"), Some(AccountKind::Bank));
        assert_eq!(AccountKind::from_str("caisse"), Some(AccountKind::Cash));
        assert_eq!(
            AccountKind::from_str("mobile-money"),
            Some(AccountKind::MobileMoney)
        );
        assert_eq!(AccountKind::from_str("vault"), None);
    }

    #[test]
    fn test_opening_balance_seeds_running_balance() {
        let account = BankAccount::new("BICIA".into(), AccountKind::Bank, "xof".into())
            .with_opening_balance(1_000_000);

        assert_eq!(account.currency, "XOF");
        assert_eq!(account.opening_balance, 1_000_000);
        assert_eq!(account.balance, 1_000_000);
    }

    #[test]
    fn test_available_balance_saturates() {
        let account = BankAccount::new("Ecobank".into(), AccountKind::Bank, "XOF".into())
            .with_opening_balance(10_000)
            .with_overdraft_limit(5_000);

        assert_eq!(account.available_balance(), 15_000);

        let huge = account.with_overdraft_limit(i64::MAX);
        assert_eq!(huge.available_balance(), i64::MAX);
    }

    #[test]
    fn test_negative_overdraft_is_clamped() {
        let account = BankAccount::new("Caisse".into(), AccountKind::Cash, "XOF".into())
            .with_overdraft_limit(-300);
        assert_eq!(account.overdraft_limit, 0);
    }
}
