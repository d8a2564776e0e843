use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    AccountId, AccountKind, BalanceCheck, BankAccount, CashMovement, Cents, Direction,
    MovementId, MovementStatus, SettlementMode, check_balance, ledger,
};

use super::{MIGRATION_001_TREASURY, MIGRATION_002_FORECASTS, MIGRATION_003_CUSTOMERS};

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";

const ACCOUNT_COLUMNS: &str = "id, name, account_number, bank_name, kind, currency, opening_balance_cents, balance_cents, overdraft_limit_cents, description, created_at, updated_at, closed_at";

const MOVEMENT_COLUMNS: &str = "id, sequence, account_id, date, label, direction, amount_cents, counterparty, settlement_mode, reference, category, balance_after_cents, status, recorded_at, updated_at";

/// Raw counts used by the ledger integrity check.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub account_count: i64,
    pub movement_count: i64,
    pub has_sequence_anomalies: bool,
    pub invalid_account_refs: i64,
    pub invalid_amounts: i64,
}

/// Optional filters for listing movements. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub account_id: Option<AccountId>,
    pub status: Option<MovementStatus>,
    pub direction: Option<Direction>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// Inflow and outflow totals over a set of movements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    pub inflow: Cents,
    pub outflow: Cents,
    pub count: i64,
}

/// Flow totals for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFlow {
    pub category: Option<String>,
    pub inflow: Cents,
    pub outflow: Cents,
}

/// Outcome of a write that moves an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Committed; carries the new account balance.
    Applied(Cents),
    /// Rolled back because the balance check failed.
    Refused(BalanceCheck),
    /// Rolled back because the movement is posted or reconciled.
    Locked,
}

/// SQLite-backed persistence for accounts, movements, forecasts and customers.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
    /// Held across every transaction that moves an account balance, so the
    /// overdraft check and the write see the same balance.
    balance_writes: Arc<Mutex<()>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            balance_writes: Arc::new(Mutex::new(())),
        }
    }

    /// Connect to a SQLite database. Use `?mode=rwc` in the URL to create
    /// the file when missing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every migration is idempotent.
    pub async fn migrate(&self) -> Result<()> {
        for (name, sql) in [
            ("001_treasury", MIGRATION_001_TREASURY),
            ("002_forecasts", MIGRATION_002_FORECASTS),
            ("003_customers", MIGRATION_003_CUSTOMERS),
        ] {
            sqlx::raw_sql(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration {}", name))?;
        }
        Ok(())
    }

    /// Cheap round trip used by health checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database is unreachable")?;
        Ok(())
    }

    /// Connect and migrate.
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    pub async fn save_account(&self, account: &BankAccount) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO accounts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ACCOUNT_COLUMNS
        ))
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&account.account_number)
        .bind(&account.bank_name)
        .bind(account.kind.as_str())
        .bind(&account.currency)
        .bind(account.opening_balance)
        .bind(account.balance)
        .bind(account.overdraft_limit)
        .bind(&account.description)
        .bind(account.created_at.to_rfc3339())
        .bind(account.updated_at.to_rfc3339())
        .bind(account.closed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Option<BankAccount>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn get_account_by_name(&self, name: &str) -> Result<Option<BankAccount>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE name = ?", ACCOUNT_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account by name")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List accounts by name (optionally including closed ones).
    pub async fn list_accounts(&self, include_closed: bool) -> Result<Vec<BankAccount>> {
        let filter = if include_closed {
            ""
        } else {
            "WHERE closed_at IS NULL"
        };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts {} ORDER BY name",
            ACCOUNT_COLUMNS, filter
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Close an account (soft delete).
    pub async fn close_account(&self, id: AccountId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE accounts SET closed_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to close account")?;
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<BankAccount> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");
        let closed_at_str: Option<String> = row.get("closed_at");

        Ok(BankAccount {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            name: row.get("name"),
            account_number: row.get("account_number"),
            bank_name: row.get("bank_name"),
            kind: AccountKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account kind: {}", kind_str))?,
            currency: row.get("currency"),
            opening_balance: row.get("opening_balance_cents"),
            balance: row.get("balance_cents"),
            overdraft_limit: row.get("overdraft_limit_cents"),
            description: row.get("description"),
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
            closed_at: closed_at_str.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    // ========================
    // Movement operations
    // ========================

    /// Touch the account row, taking the SQLite write lock, and read its
    /// balance and overdraft limit.
    async fn lock_balance(
        tx: &mut Transaction<'_, Sqlite>,
        account_id: AccountId,
    ) -> Result<(Cents, Cents)> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET updated_at = ?
            WHERE id = ?
            RETURNING balance_cents, overdraft_limit_cents
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(account_id.to_string())
        .fetch_one(&mut **tx)
        .await
        .context("Failed to lock account balance")?;

        Ok((row.get("balance_cents"), row.get("overdraft_limit_cents")))
    }

    async fn store_balance(
        tx: &mut Transaction<'_, Sqlite>,
        account_id: AccountId,
        balance: Cents,
    ) -> Result<()> {
        sqlx::query("UPDATE accounts SET balance_cents = ? WHERE id = ?")
            .bind(balance)
            .bind(account_id.to_string())
            .execute(&mut **tx)
            .await
            .context("Failed to update account balance")?;
        Ok(())
    }

    /// Insert a movement and apply it to its account balance in one
    /// transaction. Assigns the sequence number and the balance snapshot.
    ///
    /// The balance check runs under the account lock; a refused movement
    /// leaves nothing behind.
    pub async fn apply_movement(&self, movement: &mut CashMovement, force: bool) -> Result<LedgerWrite> {
        let _guard = self.balance_writes.lock().await;
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let (balance, overdraft_limit) = Self::lock_balance(&mut tx, movement.account_id).await?;
        let proposed = ledger::apply(balance, movement.direction, movement.amount_cents);
        let balance = match check_balance(balance, proposed, overdraft_limit, force) {
            BalanceCheck::Accepted(balance) => balance,
            refused => return Ok(LedgerWrite::Refused(refused)),
        };
        Self::store_balance(&mut tx, movement.account_id, balance).await?;

        let sequence: i64 = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'movement_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .context("Failed to get next sequence number")?
        .get("value");

        movement.sequence = sequence;
        movement.balance_after = balance;

        sqlx::query(&format!(
            "INSERT INTO movements ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            MOVEMENT_COLUMNS
        ))
        .bind(movement.id.to_string())
        .bind(movement.sequence)
        .bind(movement.account_id.to_string())
        .bind(movement.date.format(DATE_FORMAT).to_string())
        .bind(&movement.label)
        .bind(movement.direction.as_str())
        .bind(movement.amount_cents)
        .bind(&movement.counterparty)
        .bind(movement.settlement_mode.map(|m| m.as_str()))
        .bind(&movement.reference)
        .bind(&movement.category)
        .bind(movement.balance_after)
        .bind(movement.status.as_str())
        .bind(movement.recorded_at.to_rfc3339())
        .bind(movement.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save movement")?;

        tx.commit().await.context("Failed to commit movement")?;
        Ok(LedgerWrite::Applied(balance))
    }

    /// Replace an unlocked movement with its revised version, moving the
    /// account balance by the difference in one transaction. Only a change
    /// that lowers the balance is held to the overdraft floor.
    pub async fn revise_movement(
        &self,
        previous: &CashMovement,
        revised: &mut CashMovement,
        force: bool,
    ) -> Result<LedgerWrite> {
        let _guard = self.balance_writes.lock().await;
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let (balance, overdraft_limit) = Self::lock_balance(&mut tx, previous.account_id).await?;
        let proposed = ledger::revise(
            balance,
            (previous.direction, previous.amount_cents),
            (revised.direction, revised.amount_cents),
        );
        let balance = match check_balance(balance, proposed, overdraft_limit, force) {
            BalanceCheck::Accepted(balance) => balance,
            refused => return Ok(LedgerWrite::Refused(refused)),
        };
        revised.balance_after = balance;

        let result = sqlx::query(
            r#"
            UPDATE movements
            SET date = ?, label = ?, direction = ?, amount_cents = ?, counterparty = ?,
                settlement_mode = ?, reference = ?, category = ?, balance_after_cents = ?, updated_at = ?
            WHERE id = ? AND status IN ('entered', 'validated')
            "#,
        )
        .bind(revised.date.format(DATE_FORMAT).to_string())
        .bind(&revised.label)
        .bind(revised.direction.as_str())
        .bind(revised.amount_cents)
        .bind(&revised.counterparty)
        .bind(revised.settlement_mode.map(|m| m.as_str()))
        .bind(&revised.reference)
        .bind(&revised.category)
        .bind(revised.balance_after)
        .bind(revised.updated_at.to_rfc3339())
        .bind(revised.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update movement")?;

        if result.rows_affected() == 0 {
            // dropping the transaction rolls the lock back
            return Ok(LedgerWrite::Locked);
        }

        Self::store_balance(&mut tx, previous.account_id, balance).await?;
        tx.commit().await.context("Failed to commit movement revision")?;
        Ok(LedgerWrite::Applied(balance))
    }

    /// Delete an unlocked movement and reverse its effect on the balance in
    /// one transaction. The reversal is not held to the overdraft floor.
    pub async fn remove_movement(&self, movement: &CashMovement) -> Result<LedgerWrite> {
        let _guard = self.balance_writes.lock().await;
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let (balance, overdraft_limit) = Self::lock_balance(&mut tx, movement.account_id).await?;
        let proposed = ledger::reverse(balance, movement.direction, movement.amount_cents);
        let balance = match check_balance(balance, proposed, overdraft_limit, true) {
            BalanceCheck::Accepted(balance) => balance,
            refused => return Ok(LedgerWrite::Refused(refused)),
        };

        let result =
            sqlx::query("DELETE FROM movements WHERE id = ? AND status IN ('entered', 'validated')")
                .bind(movement.id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to delete movement")?;

        if result.rows_affected() == 0 {
            return Ok(LedgerWrite::Locked);
        }

        Self::store_balance(&mut tx, movement.account_id, balance).await?;
        tx.commit().await.context("Failed to commit movement deletion")?;
        Ok(LedgerWrite::Applied(balance))
    }

    /// Compare-and-set on the movement status. Returns `false` if the
    /// stored status is no longer `from`.
    pub async fn update_movement_status(
        &self,
        id: MovementId,
        from: MovementStatus,
        to: MovementStatus,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE movements SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(id.to_string())
                .bind(from.as_str())
                .execute(&self.pool)
                .await
                .context("Failed to update movement status")?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn get_movement(&self, id: MovementId) -> Result<Option<CashMovement>> {
        let row = sqlx::query(&format!("SELECT {} FROM movements WHERE id = ?", MOVEMENT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch movement")?;

        row.as_ref().map(Self::row_to_movement).transpose()
    }

    /// Find a movement on an account by its external reference.
    pub async fn find_movement_by_reference(
        &self,
        account_id: AccountId,
        reference: &str,
    ) -> Result<Option<CashMovement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM movements WHERE account_id = ? AND reference = ? LIMIT 1",
            MOVEMENT_COLUMNS
        ))
        .bind(account_id.to_string())
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch movement by reference")?;

        row.as_ref().map(Self::row_to_movement).transpose()
    }

    /// List all movements, ordered by sequence number.
    pub async fn list_movements(&self) -> Result<Vec<CashMovement>> {
        self.list_movements_filtered(&MovementFilter::default()).await
    }

    /// List movements with optional filters, ordered by sequence number.
    pub async fn list_movements_filtered(&self, filter: &MovementFilter) -> Result<Vec<CashMovement>> {
        let mut query = format!("SELECT {} FROM movements WHERE 1=1", MOVEMENT_COLUMNS);

        let account_id_str = filter.account_id.map(|id| id.to_string());
        let from_str = filter.from.map(|d| d.format(DATE_FORMAT).to_string());
        let to_str = filter.to.map(|d| d.format(DATE_FORMAT).to_string());

        if account_id_str.is_some() {
            query.push_str(" AND account_id = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.direction.is_some() {
            query.push_str(" AND direction = ?");
        }
        if filter.category.is_some() {
            query.push_str(" AND category = ?");
        }
        if from_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_str.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY sequence");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(ref id) = account_id_str {
            sql_query = sql_query.bind(id);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(direction) = filter.direction {
            sql_query = sql_query.bind(direction.as_str());
        }
        if let Some(ref category) = filter.category {
            sql_query = sql_query.bind(category);
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
            .context("Failed to list movements")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    /// Net signed total of an account's movements dated strictly before `date`.
    pub async fn net_before(&self, account_id: AccountId, date: NaiveDate) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(CASE WHEN direction = 'inflow' THEN amount_cents ELSE -amount_cents END), 0) as net
            FROM movements
            WHERE account_id = ? AND date < ?
            "#,
        )
        .bind(account_id.to_string())
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute net flow")?;

        Ok(row.get("net"))
    }

    /// Inflow and outflow totals using SQL aggregation. Dates are inclusive.
    pub async fn sum_flows(
        &self,
        account_id: Option<AccountId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<FlowTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN direction = 'inflow' THEN amount_cents ELSE 0 END), 0) as inflow,
                COALESCE(SUM(CASE WHEN direction = 'outflow' THEN amount_cents ELSE 0 END), 0) as outflow,
                COUNT(*) as count
            FROM movements
            WHERE (? IS NULL OR account_id = ?) AND date >= ? AND date <= ?
            "#,
        )
        .bind(account_id.map(|id| id.to_string()))
        .bind(account_id.map(|id| id.to_string()))
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum flows")?;

        Ok(FlowTotals {
            inflow: row.get("inflow"),
            outflow: row.get("outflow"),
            count: row.get("count"),
        })
    }

    /// Flow totals grouped by category, largest outflow first.
    pub async fn sum_flows_by_category(
        &self,
        account_id: Option<AccountId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryFlow>> {
        let rows = sqlx::query(
            r#"
            SELECT
                category,
                COALESCE(SUM(CASE WHEN direction = 'inflow' THEN amount_cents ELSE 0 END), 0) as inflow,
                COALESCE(SUM(CASE WHEN direction = 'outflow' THEN amount_cents ELSE 0 END), 0) as outflow
            FROM movements
            WHERE (? IS NULL OR account_id = ?) AND date >= ? AND date <= ?
            GROUP BY category
            ORDER BY outflow DESC, inflow DESC
            "#,
        )
        .bind(account_id.map(|id| id.to_string()))
        .bind(account_id.map(|id| id.to_string()))
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum flows by category")?;

        Ok(rows
            .iter()
            .map(|row| CategoryFlow {
                category: row.get("category"),
                inflow: row.get("inflow"),
                outflow: row.get("outflow"),
            })
            .collect())
    }

    /// Gather statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let account_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let movement_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM movements")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        // Deleting an unlocked movement leaves a hole in the numbering, so
        // only sequences the counter never handed out are anomalies.
        let sequence_anomalies: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM movements
            WHERE sequence <= 0
               OR sequence > (SELECT value FROM sequence_counter WHERE name = 'movement_sequence')
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_account_refs: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM movements m
            WHERE NOT EXISTS (SELECT 1 FROM accounts a WHERE a.id = m.account_id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM movements WHERE amount_cents <= 0")
                .fetch_one(&self.pool)
                .await?
                .get("count");

        Ok(IntegrityStats {
            account_count,
            movement_count,
            has_sequence_anomalies: sequence_anomalies > 0,
            invalid_account_refs,
            invalid_amounts,
        })
    }

    fn row_to_movement(row: &sqlx::sqlite::SqliteRow) -> Result<CashMovement> {
        let id_str: String = row.get("id");
        let account_id_str: String = row.get("account_id");
        let date_str: String = row.get("date");
        let direction_str: String = row.get("direction");
        let mode_str: Option<String> = row.get("settlement_mode");
        let status_str: String = row.get("status");
        let recorded_at_str: String = row.get("recorded_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(CashMovement {
            id: Uuid::parse_str(&id_str).context("Invalid movement ID")?,
            sequence: row.get("sequence"),
            account_id: Uuid::parse_str(&account_id_str).context("Invalid account ID")?,
            date: parse_date(&date_str)?,
            label: row.get("label"),
            direction: Direction::from_str(&direction_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid direction: {}", direction_str))?,
            amount_cents: row.get("amount_cents"),
            counterparty: row.get("counterparty"),
            settlement_mode: mode_str
                .map(|s| {
                    SettlementMode::from_str(&s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid settlement mode: {}", s))
                })
                .transpose()?,
            reference: row.get("reference"),
            category: row.get("category"),
            balance_after: row.get("balance_after_cents"),
            status: MovementStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid movement status: {}", status_str))?,
            recorded_at: parse_timestamp(&recorded_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        })
    }
}

pub(super) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid timestamp: {}", s))?
        .with_timezone(&Utc))
}

pub(super) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("Invalid date: {}", s))
}
