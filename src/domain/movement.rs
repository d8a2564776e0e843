use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type MovementId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money entering the account (credit)
    Inflow,
    /// Money leaving the account (debit)
    Outflow,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inflow => "inflow",
            Direction::Outflow => "outflow",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inflow" | "in" | "credit" | "encaissement" => Some(Direction::Inflow),
            "outflow" | "out" | "debit" | "decaissement" => Some(Direction::Outflow),
            _ => None,
        }
    }

    /// Apply the direction's sign to a positive amount.
    pub fn signed(&self, amount: Cents) -> Cents {
        match self {
            Direction::Inflow => amount,
            Direction::Outflow => -amount,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    Cash,
    Cheque,
    Transfer,
    Card,
    MobileMoney,
    DirectDebit,
    Other,
}

impl SettlementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementMode::Cash => "cash",
            SettlementMode::Cheque => "cheque",
            SettlementMode::Transfer => "transfer",
            SettlementMode::Card => "card",
            SettlementMode::MobileMoney => "mobile_money",
            SettlementMode::DirectDebit => "direct_debit",
            SettlementMode::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cash" | "especes" => Some(SettlementMode::Cash),
            "cheque" | "check" => Some(SettlementMode::Cheque),
            "transfer" | "virement" => Some(SettlementMode::Transfer),
            "card" | "carte" => Some(SettlementMode::Card),
            "mobile_money" => Some(SettlementMode::MobileMoney),
            "direct_debit" | "prelevement" => Some(SettlementMode::DirectDebit),
            "other" => Some(SettlementMode::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for SettlementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a movement. Ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Entered,
    Validated,
    Posted,
    Reconciled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Entered => "entered",
            MovementStatus::Validated => "validated",
            MovementStatus::Posted => "posted",
            MovementStatus::Reconciled => "reconciled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "entered" => Some(MovementStatus::Entered),
            "validated" => Some(MovementStatus::Validated),
            "posted" => Some(MovementStatus::Posted),
            "reconciled" => Some(MovementStatus::Reconciled),
            _ => None,
        }
    }

    /// Posted and reconciled movements are immutable.
    pub fn is_locked(&self) -> bool {
        matches!(self, MovementStatus::Posted | MovementStatus::Reconciled)
    }

    /// Allowed transitions: entered -> validated -> posted -> reconciled,
    /// plus entered -> posted.
    pub fn can_transition_to(&self, next: MovementStatus) -> bool {
        matches!(
            (self, next),
            (MovementStatus::Entered, MovementStatus::Validated)
                | (MovementStatus::Entered, MovementStatus::Posted)
                | (MovementStatus::Validated, MovementStatus::Posted)
                | (MovementStatus::Posted, MovementStatus::Reconciled)
        )
    }
}

impl std::fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single cash movement against one treasury account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashMovement {
    pub id: MovementId,
    /// Ledger-wide sequence, assigned by the repository
    pub sequence: i64,
    pub account_id: AccountId,
    /// Value date
    pub date: NaiveDate,
    pub label: String,
    pub direction: Direction,
    /// Always positive; the sign comes from `direction`
    pub amount_cents: Cents,
    pub counterparty: Option<String>,
    pub settlement_mode: Option<SettlementMode>,
    /// Bank reference, cheque number, receipt number...
    pub reference: Option<String>,
    pub category: Option<String>,
    /// Account balance right after this movement was applied
    pub balance_after: Cents,
    pub status: MovementStatus,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CashMovement {
    /// Sequence and balance snapshot are filled in by the repository.
    pub fn new(
        account_id: AccountId,
        direction: Direction,
        amount_cents: Cents,
        date: NaiveDate,
        label: impl Into<String>,
    ) -> Self {
        debug_assert!(amount_cents > 0, "Movement amount must be positive");
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            account_id,
            date,
            label: label.into(),
            direction,
            amount_cents,
            counterparty: None,
            settlement_mode: None,
            reference: None,
            category: None,
            balance_after: 0,
            status: MovementStatus::Entered,
            recorded_at: now,
            updated_at: now,
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_settlement_mode(mut self, mode: SettlementMode) -> Self {
        self.settlement_mode = Some(mode);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn signed_amount(&self) -> Cents {
        self.direction.signed(self.amount_cents)
    }

    pub fn is_locked(&self) -> bool {
        self.status.is_locked()
    }
}

/// Editable fields of an existing movement. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementChanges {
    pub date: Option<NaiveDate>,
    pub label: Option<String>,
    pub direction: Option<Direction>,
    pub amount_cents: Option<Cents>,
    pub counterparty: Option<String>,
    pub settlement_mode: Option<SettlementMode>,
    pub reference: Option<String>,
    pub category: Option<String>,
}

impl MovementChanges {
    /// Build the revised movement. Balance snapshot is left to the caller.
    pub fn apply_to(&self, movement: &CashMovement) -> CashMovement {
        let mut revised = movement.clone();
        if let Some(date) = self.date {
            revised.date = date;
        }
        if let Some(label) = &self.label {
            revised.label = label.clone();
        }
        if let Some(direction) = self.direction {
            revised.direction = direction;
        }
        if let Some(amount) = self.amount_cents {
            revised.amount_cents = amount;
        }
        if let Some(counterparty) = &self.counterparty {
            revised.counterparty = Some(counterparty.clone());
        }
        if let Some(mode) = self.settlement_mode {
            revised.settlement_mode = Some(mode);
        }
        if let Some(reference) = &self.reference {
            revised.reference = Some(reference.clone());
        }
        if let Some(category) = &self.category {
            revised.category = Some(category.clone());
        }
        revised.updated_at = Utc::now();
        revised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_signed_amount_follows_direction() {
        let account = Uuid::new_v4();
        let receipt = CashMovement::new(account, Direction::Inflow, 5000, day("2024-03-01"), "Client A");
        let payment = CashMovement::new(account, Direction::Outflow, 2000, day("2024-03-02"), "Loyer");

        assert_eq!(receipt.signed_amount(), 5000);
        assert_eq!(payment.signed_amount(), -2000);
    }

    #[test]
    fn test_direction_accepts_accounting_aliases() {
        assert_eq!(Direction::from_str("credit"), Some(Direction::Inflow));
        assert_eq!(Direction::from_str("DEBIT"), Some(Direction::Outflow));
        assert_eq!(Direction::from_str("sideways"), None);
    }

    #[test]
    fn test_locked_statuses() {
        assert!(!MovementStatus::Entered.is_locked());
        assert!(!MovementStatus::Validated.is_locked());
        assert!(MovementStatus::Posted.is_locked());
        assert!(MovementStatus::Reconciled.is_locked());
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        use MovementStatus::*;

        assert!(Entered.can_transition_to(Validated));
        assert!(Entered.can_transition_to(Posted));
        assert!(Validated.can_transition_to(Posted));
        assert!(Posted.can_transition_to(Reconciled));

        assert!(!Entered.can_transition_to(Reconciled));
        assert!(!Validated.can_transition_to(Entered));
        assert!(!Reconciled.can_transition_to(Posted));
        assert!(!Posted.can_transition_to(Posted));
    }

    #[test]
    fn test_changes_keep_untouched_fields() {
        let original = CashMovement::new(Uuid::new_v4(), Direction::Outflow, 10_000, day("2024-01-10"), "Fournisseur")
            .with_counterparty("SONABEL")
            .with_reference("CHQ-001");

        let changes = MovementChanges {
            amount_cents: Some(12_500),
            direction: Some(Direction::Inflow),
            ..Default::default()
        };
        let revised = changes.apply_to(&original);

        assert_eq!(revised.id, original.id);
        assert_eq!(revised.amount_cents, 12_500);
        assert_eq!(revised.direction, Direction::Inflow);
        assert_eq!(revised.label, "Fournisseur");
        assert_eq!(revised.counterparty.as_deref(), Some("SONABEL"));
        assert_eq!(revised.reference.as_deref(), Some("CHQ-001"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Movement amount must be positive")]
    fn test_movement_requires_positive_amount() {
        CashMovement::new(Uuid::new_v4(), Direction::Inflow, 0, day("2024-01-01"), "zero");
    }
}
