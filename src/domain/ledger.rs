use serde::{Deserialize, Serialize};

use super::{AccountId, BankAccount, CashMovement, Cents, Direction};

/// Balance after applying one movement, `None` on overflow.
pub fn apply(balance: Cents, direction: Direction, amount: Cents) -> Option<Cents> {
    balance.checked_add(direction.signed(amount))
}

/// Balance after undoing a previously applied movement.
pub fn reverse(balance: Cents, direction: Direction, amount: Cents) -> Option<Cents> {
    balance.checked_sub(direction.signed(amount))
}

/// Balance after replacing the effect of `old` with the effect of `new`.
/// Only the net change has to fit.
pub fn revise(balance: Cents, old: (Direction, Cents), new: (Direction, Cents)) -> Option<Cents> {
    let delta = new.0.signed(new.1).checked_sub(old.0.signed(old.1))?;
    balance.checked_add(delta)
}

/// Recompute a balance from the opening balance and every movement.
///
/// Partial sums wrap; the result is exact whenever the final balance fits.
pub fn replay<'a>(opening: Cents, movements: impl IntoIterator<Item = &'a CashMovement>) -> Cents {
    movements
        .into_iter()
        .fold(opening, |balance, m| balance.wrapping_add(m.signed_amount()))
}

/// Outcome of moving a stored balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheck {
    /// The change fits; carries the new balance.
    Accepted(Cents),
    /// The new balance does not fit in `Cents`.
    Overflow,
    /// A debit would cross `-overdraft_limit`.
    BelowFloor { available: Cents },
}

/// Check a proposed balance, as returned by `apply`, `reverse` or `revise`,
/// against the overdraft floor unless `force` is set. Only a change that
/// lowers the balance can hit the floor.
pub fn check_balance(
    current: Cents,
    proposed: Option<Cents>,
    overdraft_limit: Cents,
    force: bool,
) -> BalanceCheck {
    let Some(next) = proposed else {
        return BalanceCheck::Overflow;
    };
    if !force && next < current && next < -overdraft_limit {
        return BalanceCheck::BelowFloor {
            available: current.saturating_add(overdraft_limit),
        };
    }
    BalanceCheck::Accepted(next)
}

/// Difference between what an account stores and what its history implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub account_name: String,
    pub stored: Cents,
    pub replayed: Cents,
}

impl BalanceDrift {
    pub fn difference(&self) -> Cents {
        self.stored.wrapping_sub(self.replayed)
    }
}

/// Compare each account's stored balance against a replay of its movements.
/// `movements` may contain movements of any account.
pub fn find_balance_drift(accounts: &[BankAccount], movements: &[CashMovement]) -> Vec<BalanceDrift> {
    accounts
        .iter()
        .filter_map(|account| {
            let history = movements.iter().filter(|m| m.account_id == account.id);
            let replayed = replay(account.opening_balance, history);

            (replayed != account.balance).then(|| BalanceDrift {
                account_id: account.id,
                account_name: account.name.clone(),
                stored: account.balance,
                replayed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub movement_count: i64,
    pub has_sequence_anomalies: bool,
    pub invalid_account_refs: i64,
    pub invalid_amounts: i64,
    pub drifts: Vec<BalanceDrift>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        !self.has_sequence_anomalies
            && self.invalid_account_refs == 0
            && self.invalid_amounts == 0
            && self.drifts.is_empty()
    }
}
