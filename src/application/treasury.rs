use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    AccountId, BalanceCheck, BankAccount, CashMovement, Cents, Direction, IntegrityReport,
    MAX_AMOUNT_CENTS, MovementChanges, MovementId, MovementStatus, SettlementMode,
    find_balance_drift,
};
use crate::storage::{LedgerWrite, MovementFilter, Repository};

use super::AppError;

/// Months covered by forecast expansion and projection when nothing else is configured.
pub const DEFAULT_HORIZON_MONTHS: u32 = 12;

/// Application service for treasury accounts, their movements and forecasts.
/// This is the primary interface for the CLI and the HTTP API.
#[derive(Clone)]
pub struct TreasuryService {
    pub(super) repo: Repository,
    pub(super) horizon_months: u32,
}

/// Optional descriptive fields of a new movement.
#[derive(Debug, Clone, Default)]
pub struct MovementDetails {
    pub counterparty: Option<String>,
    pub settlement_mode: Option<SettlementMode>,
    pub reference: Option<String>,
    pub category: Option<String>,
}

impl TreasuryService {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            horizon_months: DEFAULT_HORIZON_MONTHS,
        }
    }

    /// Override the default forecast horizon.
    pub fn with_horizon_months(mut self, months: u32) -> Self {
        self.horizon_months = months.max(1);
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn horizon_months(&self) -> u32 {
        self.horizon_months
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account. Names are unique.
    pub async fn create_account(&self, account: BankAccount) -> Result<BankAccount, AppError> {
        if self.repo.get_account_by_name(&account.name).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(account.name));
        }
        if account.currency.len() != 3 || !account.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::InvalidInput(format!(
                "Currency must be a 3-letter ISO code, got '{}'",
                account.currency
            )));
        }
        if account.opening_balance.unsigned_abs() > MAX_AMOUNT_CENTS.unsigned_abs() {
            return Err(AppError::InvalidAmount(format!(
                "Opening balance exceeds {} cents",
                MAX_AMOUNT_CENTS
            )));
        }
        if account.overdraft_limit > MAX_AMOUNT_CENTS {
            return Err(AppError::InvalidAmount(format!(
                "Overdraft limit exceeds {} cents",
                MAX_AMOUNT_CENTS
            )));
        }

        self.repo.save_account(&account).await?;
        info!(account = %account.name, kind = %account.kind, currency = %account.currency, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<BankAccount, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    pub async fn get_account_by_name(&self, name: &str) -> Result<BankAccount, AppError> {
        self.repo
            .get_account_by_name(name)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(name.to_string()))
    }

    /// Look an account up by UUID or, failing that, by name.
    pub async fn resolve_account(&self, key: &str) -> Result<BankAccount, AppError> {
        match Uuid::parse_str(key) {
            Ok(id) => self.get_account(id).await,
            Err(_) => self.get_account_by_name(key).await,
        }
    }

    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<BankAccount>, AppError> {
        Ok(self.repo.list_accounts(include_closed).await?)
    }

    /// Close an account. Its history stays in place.
    pub async fn close_account(&self, id: AccountId) -> Result<BankAccount, AppError> {
        let account = self.get_account(id).await?;
        if account.is_closed() {
            return Err(AppError::AccountClosed(account.name));
        }
        self.repo.close_account(id).await?;
        info!(account = %account.name, balance = account.balance, "account closed");
        self.get_account(id).await
    }

    // ========================
    // Movement operations
    // ========================

    /// Record a movement and apply it to the account balance.
    ///
    /// Outflows that would take the balance below the overdraft floor are
    /// rejected unless `force` is set.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_movement(
        &self,
        account_id: AccountId,
        direction: Direction,
        amount_cents: Cents,
        date: NaiveDate,
        label: String,
        details: MovementDetails,
        force: bool,
    ) -> Result<CashMovement, AppError> {
        check_amount(amount_cents)?;

        let account = self.get_account(account_id).await?;
        if account.is_closed() {
            warn!(account = %account.name, "movement rejected: account closed");
            return Err(AppError::AccountClosed(account.name));
        }

        let mut movement = CashMovement::new(account.id, direction, amount_cents, date, label);
        if let Some(counterparty) = details.counterparty {
            movement = movement.with_counterparty(counterparty);
        }
        if let Some(mode) = details.settlement_mode {
            movement = movement.with_settlement_mode(mode);
        }
        if let Some(reference) = details.reference {
            movement = movement.with_reference(reference);
        }
        if let Some(category) = details.category {
            movement = movement.with_category(category);
        }

        if let LedgerWrite::Refused(check) = self.repo.apply_movement(&mut movement, force).await? {
            warn!(account = %account.name, amount = amount_cents, check = ?check, "movement rejected");
            return Err(balance_refusal(account.name, amount_cents, check));
        }
        info!(
            account = %account.name,
            sequence = movement.sequence,
            direction = %movement.direction,
            amount = movement.amount_cents,
            balance = movement.balance_after,
            "movement recorded"
        );
        Ok(movement)
    }

    pub async fn get_movement(&self, id: MovementId) -> Result<CashMovement, AppError> {
        self.repo
            .get_movement(id)
            .await?
            .ok_or_else(|| AppError::MovementNotFound(id.to_string()))
    }

    pub async fn list_movements(&self, filter: &MovementFilter) -> Result<Vec<CashMovement>, AppError> {
        Ok(self.repo.list_movements_filtered(filter).await?)
    }

    /// Modify an unlocked movement. The previous balance effect is reversed
    /// and the new one applied; the movement's snapshot becomes the new
    /// account balance.
    pub async fn update_movement(
        &self,
        id: MovementId,
        changes: MovementChanges,
        force: bool,
    ) -> Result<CashMovement, AppError> {
        let movement = self.get_movement(id).await?;
        if movement.is_locked() {
            warn!(movement = %id, status = %movement.status, "update rejected: movement locked");
            return Err(AppError::MovementLocked {
                id: id.to_string(),
                status: movement.status,
            });
        }
        if let Some(amount) = changes.amount_cents {
            check_amount(amount)?;
        }

        let mut revised = changes.apply_to(&movement);
        match self.repo.revise_movement(&movement, &mut revised, force).await? {
            LedgerWrite::Applied(_) => {}
            LedgerWrite::Locked => {
                let current = self.get_movement(id).await?;
                return Err(AppError::MovementLocked {
                    id: id.to_string(),
                    status: current.status,
                });
            }
            LedgerWrite::Refused(check) => {
                let account = self.get_account(movement.account_id).await?;
                warn!(movement = %id, account = %account.name, check = ?check, "update rejected");
                // extra debit the revision asks for
                let required = movement
                    .signed_amount()
                    .saturating_sub(revised.signed_amount());
                return Err(balance_refusal(account.name, required, check));
            }
        }

        info!(
            movement = %id,
            amount = revised.signed_amount(),
            balance = revised.balance_after,
            "movement revised"
        );
        Ok(revised)
    }

    /// Delete an unlocked movement and reverse its effect on the balance.
    pub async fn delete_movement(&self, id: MovementId) -> Result<CashMovement, AppError> {
        let movement = self.get_movement(id).await?;
        if movement.is_locked() {
            warn!(movement = %id, status = %movement.status, "delete rejected: movement locked");
            return Err(AppError::MovementLocked {
                id: id.to_string(),
                status: movement.status,
            });
        }

        match self.repo.remove_movement(&movement).await? {
            LedgerWrite::Applied(_) => {}
            LedgerWrite::Locked => {
                let current = self.get_movement(id).await?;
                return Err(AppError::MovementLocked {
                    id: id.to_string(),
                    status: current.status,
                });
            }
            LedgerWrite::Refused(check) => {
                let account = self.get_account(movement.account_id).await?;
                return Err(balance_refusal(account.name, movement.amount_cents, check));
            }
        }

        info!(movement = %id, amount = movement.signed_amount(), "movement deleted");
        Ok(movement)
    }

    /// Move a movement forward in its lifecycle.
    pub async fn change_status(
        &self,
        id: MovementId,
        status: MovementStatus,
    ) -> Result<CashMovement, AppError> {
        let movement = self.get_movement(id).await?;
        if !movement.status.can_transition_to(status) {
            warn!(movement = %id, from = %movement.status, to = %status, "status change rejected");
            return Err(AppError::InvalidStatusTransition {
                from: movement.status,
                to: status,
            });
        }

        if !self
            .repo
            .update_movement_status(id, movement.status, status)
            .await?
        {
            let current = self.get_movement(id).await?;
            return Err(AppError::InvalidStatusTransition {
                from: current.status,
                to: status,
            });
        }

        info!(movement = %id, from = %movement.status, to = %status, "movement status changed");
        self.get_movement(id).await
    }

    // ========================
    // Integrity operations
    // ========================

    /// Compare every stored balance with a replay of its movements and
    /// collect structural anomalies.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let accounts = self.repo.list_accounts(true).await?;
        let movements = self.repo.list_movements().await?;

        let report = IntegrityReport {
            account_count: stats.account_count,
            movement_count: stats.movement_count,
            has_sequence_anomalies: stats.has_sequence_anomalies,
            invalid_account_refs: stats.invalid_account_refs,
            invalid_amounts: stats.invalid_amounts,
            drifts: find_balance_drift(&accounts, &movements),
        };

        if !report.is_healthy() {
            warn!(drifts = report.drifts.len(), "ledger integrity check failed");
        }
        Ok(report)
    }
}

/// Amounts are strictly positive and bounded by `MAX_AMOUNT_CENTS`.
pub(super) fn check_amount(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if amount_cents > MAX_AMOUNT_CENTS {
        return Err(AppError::InvalidAmount(format!(
            "Amount exceeds {} cents",
            MAX_AMOUNT_CENTS
        )));
    }
    Ok(())
}

fn balance_refusal(account: String, required: Cents, check: BalanceCheck) -> AppError {
    match check {
        BalanceCheck::BelowFloor { available } => AppError::InsufficientFunds {
            account,
            available,
            required,
        },
        BalanceCheck::Overflow | BalanceCheck::Accepted(_) => AppError::InvalidAmount(format!(
            "Balance of account {} would leave the representable range",
            account
        )),
    }
}
