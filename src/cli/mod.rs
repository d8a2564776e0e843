use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::api::{self, AppState};
use crate::application::{
    CrmService, CustomerUpdate, MovementDetails, NewForecast, TreasuryService,
};
use crate::config::Settings;
use crate::domain::{
    AccountKind, BankAccount, Cents, Customer, CustomerStats, Direction, MovementChanges,
    MovementStatus, Periodicity, SettlementMode, format_amount, format_cents, parse_cents,
};
use crate::storage::{ForecastFilter, MovementFilter};

/// E-COMPTA - Treasury ledger, cash forecasting and customer intelligence
#[derive(Parser)]
#[command(name = "ecompta")]
#[command(about = "Treasury ledger, cash forecasting and customer intelligence")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the configured one)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Configuration file (defaults to ./ecompta.toml when present)
    #[arg(long, global = true, env = "ECOMPTA_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Treasury account commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Cash movement commands
    #[command(subcommand)]
    Movement(MovementCommands),

    /// Verify ledger integrity
    Check,

    /// Cash forecast commands
    #[command(subcommand)]
    Forecast(ForecastCommands),

    /// Customer and intelligence commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Treasury and customer reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: movements, accounts, forecasts, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Only export movements of this account
        #[arg(long)]
        account: Option<String>,
    },

    /// Import a bank statement CSV into an account
    Import {
        /// Account name or ID
        account: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate every line without recording anything
        #[arg(long)]
        dry_run: bool,

        /// Skip lines whose reference is already recorded on the account
        #[arg(long)]
        skip_duplicates: bool,

        /// Record outflows even past the overdraft limit
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new treasury account
    Create {
        /// Account name (must be unique)
        name: String,

        /// Kind: cash, bank, mobile_money, other
        #[arg(short, long, default_value = "bank")]
        kind: String,

        /// ISO 4217 currency code
        #[arg(short, long, default_value = "XOF")]
        currency: String,

        /// Bank account number
        #[arg(long)]
        number: Option<String>,

        /// Bank name
        #[arg(long)]
        bank: Option<String>,

        /// Opening balance (e.g., "1500.00")
        #[arg(long, allow_hyphen_values = true)]
        opening: Option<String>,

        /// Authorized overdraft
        #[arg(long)]
        overdraft: Option<String>,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// List accounts
    List {
        /// Include closed accounts
        #[arg(short, long)]
        all: bool,
    },

    /// Show account details
    Show {
        /// Account name or ID
        account: String,
    },

    /// Close an account
    Close {
        /// Account name or ID
        account: String,
    },
}

#[derive(Subcommand)]
pub enum MovementCommands {
    /// Record a movement on an account
    Record {
        /// Account name or ID
        account: String,

        /// in (encaissement) or out (decaissement)
        direction: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Label
        label: String,

        /// Value date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Counterparty
        #[arg(long)]
        counterparty: Option<String>,

        /// Settlement mode: cash, cheque, transfer, card, mobile_money, direct_debit, other
        #[arg(short, long)]
        mode: Option<String>,

        /// External reference (cheque or bank reference)
        #[arg(short, long)]
        reference: Option<String>,

        /// Category
        #[arg(short, long)]
        category: Option<String>,

        /// Record even if it takes the balance past the overdraft limit
        #[arg(long)]
        force: bool,
    },

    /// List movements
    List {
        /// Filter by account name or ID
        #[arg(long)]
        account: Option<String>,

        /// Filter by status
        #[arg(long)]
        status: Option<String>,

        /// Filter by direction
        #[arg(long)]
        direction: Option<String>,

        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// From value date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// To value date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Maximum number of movements to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Modify an unlocked movement
    Update {
        /// Movement ID
        id: Uuid,

        #[arg(long)]
        date: Option<String>,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        direction: Option<String>,

        #[arg(long)]
        amount: Option<String>,

        #[arg(long)]
        counterparty: Option<String>,

        #[arg(short, long)]
        mode: Option<String>,

        #[arg(short, long)]
        reference: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Apply even if it takes the balance past the overdraft limit
        #[arg(long)]
        force: bool,
    },

    /// Delete an unlocked movement
    Delete {
        /// Movement ID
        id: Uuid,
    },

    /// Move a movement forward: validated, posted, reconciled
    Status {
        /// Movement ID
        id: Uuid,

        /// New status
        status: String,
    },
}

#[derive(Subcommand)]
pub enum ForecastCommands {
    /// Create a forecast
    Create {
        /// Account name or ID
        account: String,

        /// in or out
        direction: String,

        /// Expected amount
        amount: String,

        /// Label
        label: String,

        /// Expected date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Periodicity: none, daily, weekly, monthly, quarterly, semiannual, annual
        #[arg(short, long, default_value = "none")]
        every: String,

        /// Last date of a recurring forecast (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// List forecasts
    List {
        /// Filter by account name or ID
        #[arg(long)]
        account: Option<String>,

        /// From expected date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// To expected date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Hide fully realized forecasts
        #[arg(long)]
        outstanding: bool,
    },

    /// Materialize the occurrences of a recurring forecast
    Expand {
        /// Forecast ID
        id: Uuid,
    },

    /// Record an amount received or paid against a forecast
    Realize {
        /// Forecast ID
        id: Uuid,

        /// Realized amount
        amount: String,
    },

    /// Project an account balance from its forecasts
    Project {
        /// Account name or ID
        account: String,

        /// Horizon in months (defaults to the configured horizon)
        #[arg(short, long)]
        months: Option<u32>,
    },
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Create a customer
    Create {
        /// Customer name (must be unique)
        name: String,

        #[arg(short, long)]
        email: Option<String>,

        /// Total revenue so far
        #[arg(long)]
        revenue: Option<String>,

        /// Number of purchases so far
        #[arg(long, default_value = "0")]
        purchases: u32,

        /// Date of the last purchase (YYYY-MM-DD)
        #[arg(long)]
        last_purchase: Option<String>,

        /// Average payment delay in days (negative when paying early)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        payment_delay: i32,
    },

    /// List customers
    List {
        /// Include deactivated customers
        #[arg(short, long)]
        all: bool,
    },

    /// Show a customer and its intelligence
    Show {
        /// Customer name or ID
        customer: String,
    },

    /// Update a customer's identity or statistics
    Update {
        /// Customer name or ID
        customer: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        email: Option<String>,

        #[arg(long)]
        revenue: Option<String>,

        #[arg(long)]
        purchases: Option<u32>,

        #[arg(long)]
        last_purchase: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        payment_delay: Option<i32>,
    },

    /// Record a purchase
    Purchase {
        /// Customer name or ID
        customer: String,

        /// Purchase amount
        amount: String,

        /// Purchase date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Recompute the intelligence of one customer
    Score {
        /// Customer name or ID
        customer: String,
    },

    /// Recompute the intelligence of every active customer
    ScoreAll,

    /// Customers with a high churn probability
    AtRisk,

    /// VIP and strategic customers
    HighValue,

    /// Customers without a purchase in the last 180 days
    Inactive,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balances of every open account
    Position,

    /// Inflows and outflows of an account over a period
    Cashflow {
        /// Account name or ID
        account: String,

        /// Start date (YYYY-MM-DD, defaults to the first day of the month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,
    },

    /// Customer count per segment
    Segments,

    /// Customer count per payment behavior
    PaymentBehavior,
}

impl Cli {
    pub async fn run(self, settings: Settings) -> Result<()> {
        let database = self
            .database
            .clone()
            .unwrap_or_else(|| settings.database.clone());

        match self.command {
            Commands::Init => {
                TreasuryService::init(&database).await?;
                println!("Database initialized: {}", database);
                Ok(())
            }
            command => {
                let service = TreasuryService::connect(&database)
                    .await
                    .with_context(|| format!("Failed to open database {}", database))?
                    .with_horizon_months(settings.forecast.default_horizon_months);
                dispatch(service, settings, command).await
            }
        }
    }
}

async fn dispatch(service: TreasuryService, settings: Settings, command: Commands) -> Result<()> {
    let crm = CrmService::new(service.repository().clone());

    match command {
        // Init never reaches here, it runs without an open database
        Commands::Init => {}

        Commands::Serve { host, port } => {
            let host = host.unwrap_or(settings.server.host);
            let port = port.unwrap_or(settings.server.port);
            api::serve(AppState::new(service), &format!("{}:{}", host, port)).await?;
        }

        Commands::Account(cmd) => run_account_command(&service, cmd).await?,

        Commands::Movement(cmd) => run_movement_command(&service, cmd).await?,

        Commands::Check => run_check_command(&service).await?,

        Commands::Forecast(cmd) => run_forecast_command(&service, cmd).await?,

        Commands::Customer(cmd) => run_customer_command(&crm, cmd).await?,

        Commands::Report(cmd) => run_report_command(&service, &crm, cmd).await?,

        Commands::Export {
            export_type,
            output,
            account,
        } => {
            run_export_command(&service, &crm, &export_type, output.as_deref(), account).await?;
        }

        Commands::Import {
            account,
            input,
            dry_run,
            skip_duplicates,
            force,
        } => {
            run_import_command(
                &service,
                &account,
                input.as_deref(),
                dry_run,
                skip_duplicates,
                force,
            )
            .await?;
        }
    }

    Ok(())
}

// ====== Account commands ======

async fn run_account_command(service: &TreasuryService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            name,
            kind,
            currency,
            number,
            bank,
            opening,
            overdraft,
            description,
        } => {
            let kind = AccountKind::from_str(&kind).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid account kind '{}'. Valid kinds: cash, bank, mobile_money, other",
                    kind
                )
            })?;

            let mut account = BankAccount::new(name, kind, currency);
            if let Some(opening) = opening {
                account = account.with_opening_balance(parse_amount(&opening)?);
            }
            if let Some(overdraft) = overdraft {
                account = account.with_overdraft_limit(parse_amount(&overdraft)?);
            }
            if let Some(number) = number {
                account = account.with_account_number(number);
            }
            if let Some(bank) = bank {
                account = account.with_bank_name(bank);
            }
            if let Some(description) = description {
                account = account.with_description(description);
            }

            let account = service.create_account(account).await?;
            println!(
                "Created account: {} ({}, {})",
                account.name, account.kind, account.currency
            );
        }

        AccountCommands::List { all } => {
            let accounts = service.list_accounts(all).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<20} {:<13} {:>15} {:>12} {:<8}",
                    "NAME", "KIND", "BALANCE", "OVERDRAFT", "CURRENCY"
                );
                println!("{}", "-".repeat(72));
                for account in accounts {
                    println!(
                        "{:<20} {:<13} {:>15} {:>12} {:<8}{}",
                        truncate(&account.name, 20),
                        account.kind,
                        format_cents(account.balance),
                        format_cents(account.overdraft_limit),
                        account.currency,
                        if account.is_closed() { " (closed)" } else { "" }
                    );
                }
            }
        }

        AccountCommands::Show { account } => {
            let account = service.resolve_account(&account).await?;
            let filter = MovementFilter {
                account_id: Some(account.id),
                ..Default::default()
            };
            let movements = service.list_movements(&filter).await?;

            println!("Account: {}", account.name);
            println!("  ID:             {}", account.id);
            println!("  Kind:           {}", account.kind);
            println!("  Currency:       {}", account.currency);
            if let Some(bank) = &account.bank_name {
                println!("  Bank:           {}", bank);
            }
            if let Some(number) = &account.account_number {
                println!("  Number:         {}", number);
            }
            if let Some(desc) = &account.description {
                println!("  Description:    {}", desc);
            }
            println!(
                "  Created:        {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(closed) = account.closed_at {
                println!("  Closed:         {}", closed.format("%Y-%m-%d %H:%M:%S"));
            }
            println!();
            println!(
                "  Opening:        {}",
                format_amount(account.opening_balance, &account.currency)
            );
            println!(
                "  Balance:        {}",
                format_amount(account.balance, &account.currency)
            );
            println!(
                "  Overdraft:      {}",
                format_amount(account.overdraft_limit, &account.currency)
            );
            println!(
                "  Available:      {}",
                format_amount(account.available_balance(), &account.currency)
            );
            println!("  Movements:      {}", movements.len());
            if let Some(last) = movements.last() {
                println!("  Last movement:  {} {}", last.date, last.label);
            }
        }

        AccountCommands::Close { account } => {
            let account = service.resolve_account(&account).await?;
            service.close_account(account.id).await?;
            println!("Closed account: {}", account.name);
        }
    }
    Ok(())
}

// ====== Movement commands ======

async fn run_movement_command(service: &TreasuryService, cmd: MovementCommands) -> Result<()> {
    match cmd {
        MovementCommands::Record {
            account,
            direction,
            amount,
            label,
            date,
            counterparty,
            mode,
            reference,
            category,
            force,
        } => {
            let account = service.resolve_account(&account).await?;
            let direction = parse_direction(&direction)?;
            let amount_cents = parse_amount(&amount)?;
            let date = match date {
                Some(date) => parse_date(&date)?,
                None => Utc::now().date_naive(),
            };
            let details = MovementDetails {
                counterparty,
                settlement_mode: mode.as_deref().map(parse_settlement_mode).transpose()?,
                reference,
                category,
            };

            let movement = service
                .record_movement(
                    account.id,
                    direction,
                    amount_cents,
                    date,
                    label,
                    details,
                    force,
                )
                .await?;

            println!(
                "Recorded movement #{}: {} {} on {} (balance {})",
                movement.sequence,
                movement.direction,
                format_amount(movement.amount_cents, &account.currency),
                account.name,
                format_cents(movement.balance_after)
            );
            println!("  ID: {}", movement.id);
        }

        MovementCommands::List {
            account,
            status,
            direction,
            category,
            from,
            to,
            limit,
        } => {
            let account_id = match account {
                Some(key) => Some(service.resolve_account(&key).await?.id),
                None => None,
            };
            let filter = MovementFilter {
                account_id,
                status: status.as_deref().map(parse_status).transpose()?,
                direction: direction.as_deref().map(parse_direction).transpose()?,
                category,
                from: from.as_deref().map(parse_date).transpose()?,
                to: to.as_deref().map(parse_date).transpose()?,
                limit,
            };

            let movements = service.list_movements(&filter).await?;
            if movements.is_empty() {
                println!("No movements found.");
            } else {
                println!(
                    "{:>6} {:<12} {:<8} {:>12} {:>14} {:<11} LABEL",
                    "SEQ", "DATE", "DIR", "AMOUNT", "BALANCE", "STATUS"
                );
                println!("{}", "-".repeat(90));
                for movement in &movements {
                    println!(
                        "{:>6} {:<12} {:<8} {:>12} {:>14} {:<11} {}",
                        movement.sequence,
                        movement.date,
                        movement.direction,
                        format_cents(movement.amount_cents),
                        format_cents(movement.balance_after),
                        movement.status,
                        truncate(&movement.label, 30)
                    );
                }
            }
        }

        MovementCommands::Update {
            id,
            date,
            label,
            direction,
            amount,
            counterparty,
            mode,
            reference,
            category,
            force,
        } => {
            let changes = MovementChanges {
                date: date.as_deref().map(parse_date).transpose()?,
                label,
                direction: direction.as_deref().map(parse_direction).transpose()?,
                amount_cents: amount.as_deref().map(parse_amount).transpose()?,
                counterparty,
                settlement_mode: mode.as_deref().map(parse_settlement_mode).transpose()?,
                reference,
                category,
            };

            let movement = service.update_movement(id, changes, force).await?;
            println!(
                "Updated movement #{}: {} {} (balance {})",
                movement.sequence,
                movement.direction,
                format_cents(movement.amount_cents),
                format_cents(movement.balance_after)
            );
        }

        MovementCommands::Delete { id } => {
            let movement = service.delete_movement(id).await?;
            println!(
                "Deleted movement #{}: {} {}",
                movement.sequence,
                movement.label,
                format_cents(movement.signed_amount())
            );
        }

        MovementCommands::Status { id, status } => {
            let status = parse_status(&status)?;
            let movement = service.change_status(id, status).await?;
            println!("Movement #{} is now {}", movement.sequence, movement.status);
        }
    }
    Ok(())
}

async fn run_check_command(service: &TreasuryService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Accounts:  {}", report.account_count);
    println!("Movements: {}", report.movement_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
        return Ok(());
    }

    println!("Issues found:");
    if report.has_sequence_anomalies {
        println!("  - Movement sequence numbers out of range");
    }
    if report.invalid_account_refs > 0 {
        println!(
            "  - {} movement(s) reference a missing account",
            report.invalid_account_refs
        );
    }
    if report.invalid_amounts > 0 {
        println!(
            "  - {} movement(s) have a non-positive amount",
            report.invalid_amounts
        );
    }
    for drift in &report.drifts {
        println!(
            "  - {}: stored balance {} but movements give {} (difference {})",
            drift.account_name,
            format_cents(drift.stored),
            format_cents(drift.replayed),
            format_cents(drift.difference())
        );
    }
    anyhow::bail!("Ledger integrity check failed");
}

// ====== Forecast commands ======

async fn run_forecast_command(service: &TreasuryService, cmd: ForecastCommands) -> Result<()> {
    match cmd {
        ForecastCommands::Create {
            account,
            direction,
            amount,
            label,
            date,
            every,
            until,
            category,
        } => {
            let account = service.resolve_account(&account).await?;
            let periodicity = Periodicity::from_str(&every).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid periodicity '{}'. Valid: none, daily, weekly, monthly, quarterly, semiannual, annual",
                    every
                )
            })?;

            let forecast = service
                .create_forecast(NewForecast {
                    account_id: account.id,
                    label,
                    direction: parse_direction(&direction)?,
                    amount_cents: parse_amount(&amount)?,
                    expected_date: parse_date(&date)?,
                    periodicity,
                    end_date: until.as_deref().map(parse_date).transpose()?,
                    category,
                })
                .await?;

            println!(
                "Created forecast: {} {} on {} ({})",
                forecast.label,
                format_amount(forecast.amount_cents, &account.currency),
                forecast.expected_date,
                forecast.periodicity
            );
            println!("  ID: {}", forecast.id);
            if forecast.is_recurring() {
                println!("  Run 'ecompta forecast expand {}' to create its occurrences", forecast.id);
            }
        }

        ForecastCommands::List {
            account,
            from,
            to,
            outstanding,
        } => {
            let account_id = match account {
                Some(key) => Some(service.resolve_account(&key).await?.id),
                None => None,
            };
            let filter = ForecastFilter {
                account_id,
                from: from.as_deref().map(parse_date).transpose()?,
                to: to.as_deref().map(parse_date).transpose()?,
                outstanding_only: outstanding,
            };

            let forecasts = service.list_forecasts(&filter).await?;
            if forecasts.is_empty() {
                println!("No forecasts found.");
            } else {
                println!(
                    "{:<12} {:<8} {:>12} {:>12} {:<10} {:<20} LABEL",
                    "DATE", "DIR", "AMOUNT", "REALIZED", "EVERY", "STATUS"
                );
                println!("{}", "-".repeat(95));
                for forecast in &forecasts {
                    println!(
                        "{:<12} {:<8} {:>12} {:>12} {:<10} {:<20} {}",
                        forecast.expected_date,
                        forecast.direction,
                        format_cents(forecast.amount_cents),
                        format_cents(forecast.realized_cents),
                        forecast.periodicity,
                        forecast.status,
                        truncate(&forecast.label, 30)
                    );
                }
            }
        }

        ForecastCommands::Expand { id } => {
            let occurrences = service.expand_forecast(id).await?;
            if occurrences.is_empty() {
                println!("No new occurrences (already expanded up to the horizon).");
            } else {
                println!("Created {} occurrence(s):", occurrences.len());
                for occurrence in &occurrences {
                    println!(
                        "  {}  {}",
                        occurrence.expected_date,
                        format_cents(occurrence.amount_cents)
                    );
                }
            }
        }

        ForecastCommands::Realize { id, amount } => {
            let forecast = service.record_realization(id, parse_amount(&amount)?).await?;
            println!(
                "{}: realized {} of {} ({})",
                forecast.label,
                format_cents(forecast.realized_cents),
                format_cents(forecast.amount_cents),
                forecast.status
            );
        }

        ForecastCommands::Project { account, months } => {
            let account = service.resolve_account(&account).await?;
            let projection = service.project_balance(account.id, months).await?;

            println!(
                "Projection for {}: {} to {}",
                projection.account_name, projection.as_of, projection.horizon_end
            );
            println!(
                "  Starting balance: {}",
                format_amount(projection.starting_balance, &projection.currency)
            );
            println!();

            if projection.points.is_empty() {
                println!("No outstanding forecasts in this horizon.");
            } else {
                println!("{:<12} {:>14} {:>14}  LABEL", "DATE", "AMOUNT", "BALANCE");
                println!("{}", "-".repeat(70));
                for point in &projection.points {
                    println!(
                        "{:<12} {:>14} {:>14}  {}",
                        point.date,
                        format_cents(point.amount),
                        format_cents(point.balance),
                        truncate(&point.label, 30)
                    );
                }
                println!();
            }

            println!(
                "  Ending balance:   {}",
                format_amount(projection.ending_balance, &projection.currency)
            );
            println!(
                "  Lowest balance:   {} on {}",
                format_amount(projection.lowest_balance, &projection.currency),
                projection.lowest_balance_date
            );
            match projection.first_overdraft_date {
                Some(date) => println!("  Overdraft limit exceeded from {}", date),
                None => println!("  Overdraft limit is never exceeded"),
            }
        }
    }
    Ok(())
}

// ====== Customer commands ======

async fn run_customer_command(crm: &CrmService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Create {
            name,
            email,
            revenue,
            purchases,
            last_purchase,
            payment_delay,
        } => {
            let stats = CustomerStats {
                total_revenue_cents: revenue.as_deref().map(parse_amount).transpose()?.unwrap_or(0),
                purchase_frequency: purchases,
                last_purchase_at: last_purchase.as_deref().map(parse_datetime).transpose()?,
                avg_payment_delay_days: payment_delay,
            };
            let customer = crm.create_customer(name, email, stats).await?;
            println!("Created customer: {} ({})", customer.name, customer.id);
        }

        CustomerCommands::List { all } => {
            let customers = crm.list_customers(all).await?;
            print_customer_table(&customers);
        }

        CustomerCommands::Show { customer } => {
            let customer = crm.resolve_customer(&customer).await?;
            print_customer(&customer);
        }

        CustomerCommands::Update {
            customer,
            name,
            email,
            revenue,
            purchases,
            last_purchase,
            payment_delay,
        } => {
            let customer = crm.resolve_customer(&customer).await?;
            let update = CustomerUpdate {
                name,
                email,
                total_revenue_cents: revenue.as_deref().map(parse_amount).transpose()?,
                purchase_frequency: purchases,
                last_purchase_at: last_purchase.as_deref().map(parse_datetime).transpose()?,
                avg_payment_delay_days: payment_delay,
            };
            let customer = crm.update_customer(customer.id, update).await?;
            println!("Updated customer: {}", customer.name);
        }

        CustomerCommands::Purchase {
            customer,
            amount,
            date,
        } => {
            let customer = crm.resolve_customer(&customer).await?;
            let at = match date {
                Some(date) => parse_datetime(&date)?,
                None => Utc::now(),
            };
            let customer = crm
                .record_purchase(customer.id, parse_amount(&amount)?, at)
                .await?;
            println!(
                "Recorded purchase for {}: {} purchases, total {}",
                customer.name,
                customer.stats.purchase_frequency,
                format_cents(customer.stats.total_revenue_cents)
            );
        }

        CustomerCommands::Score { customer } => {
            let customer = crm.resolve_customer(&customer).await?;
            let customer = crm.score_customer(customer.id, Utc::now()).await?;
            print_customer(&customer);
        }

        CustomerCommands::ScoreAll => {
            let count = crm.score_all(Utc::now()).await?;
            println!("Scored {} customer(s)", count);
        }

        CustomerCommands::AtRisk => {
            print_customer_table(&crm.high_churn_risk().await?);
        }

        CustomerCommands::HighValue => {
            print_customer_table(&crm.high_value().await?);
        }

        CustomerCommands::Inactive => {
            print_customer_table(&crm.inactive(Utc::now()).await?);
        }
    }
    Ok(())
}

fn print_customer_table(customers: &[Customer]) {
    if customers.is_empty() {
        println!("No customers found.");
        return;
    }

    println!(
        "{:<25} {:>14} {:>6} {:>6} {:>7} {:<20}",
        "NAME", "REVENUE", "BUYS", "SCORE", "CHURN", "SEGMENT"
    );
    println!("{}", "-".repeat(83));
    for customer in customers {
        let (score, churn, segment) = match &customer.intelligence {
            Some(i) => (
                i.score.to_string(),
                format!("{:.2}", i.churn_probability),
                i.segment.as_str().to_string(),
            ),
            None => ("-".to_string(), "-".to_string(), "(not scored)".to_string()),
        };
        println!(
            "{:<25} {:>14} {:>6} {:>6} {:>7} {:<20}{}",
            truncate(&customer.name, 25),
            format_cents(customer.stats.total_revenue_cents),
            customer.stats.purchase_frequency,
            score,
            churn,
            segment,
            if customer.active { "" } else { " (inactive)" }
        );
    }
}

fn print_customer(customer: &Customer) {
    println!("Customer: {}", customer.name);
    println!("  ID:             {}", customer.id);
    if let Some(email) = &customer.email {
        println!("  Email:          {}", email);
    }
    println!("  Active:         {}", if customer.active { "yes" } else { "no" });
    println!(
        "  Revenue:        {}",
        format_cents(customer.stats.total_revenue_cents)
    );
    println!("  Purchases:      {}", customer.stats.purchase_frequency);
    if let Some(last) = customer.stats.last_purchase_at {
        println!("  Last purchase:  {}", last.format("%Y-%m-%d"));
    }
    println!(
        "  Payment delay:  {} day(s)",
        customer.stats.avg_payment_delay_days
    );

    let Some(intel) = &customer.intelligence else {
        println!("\n  Not scored yet. Run 'ecompta customer score'.");
        return;
    };

    println!();
    println!("  Score:          {}/100", intel.score);
    println!("  Segment:        {}", intel.segment.label());
    println!("  Churn:          {:.2}%", intel.churn_probability * 100.0);
    println!("  Risk:           {}", intel.risk_level);
    println!(
        "  Predicted LTV:  {}",
        format_cents(intel.predicted_ltv_cents)
    );
    println!("  Payment:        {}", intel.payment_behavior);
    println!("  Satisfaction:   {}/10", intel.satisfaction_score);
    println!(
        "  Avg order:      {}",
        format_cents(intel.avg_order_value_cents)
    );
    println!(
        "  Computed:       {}",
        intel.computed_at.format("%Y-%m-%d %H:%M:%S")
    );
}

// ====== Reports ======

async fn run_report_command(
    service: &TreasuryService,
    crm: &CrmService,
    cmd: ReportCommands,
) -> Result<()> {
    match cmd {
        ReportCommands::Position => {
            let position = service.treasury_position().await?;
            if position.accounts.is_empty() {
                println!("No open accounts.");
                return Ok(());
            }

            println!(
                "Treasury position at {}",
                position.as_of.format("%Y-%m-%d %H:%M")
            );
            println!();
            println!(
                "{:<20} {:<13} {:>15} {:>15} {:<8}",
                "ACCOUNT", "KIND", "BALANCE", "AVAILABLE", "CURRENCY"
            );
            println!("{}", "-".repeat(75));
            for account in &position.accounts {
                println!(
                    "{:<20} {:<13} {:>15} {:>15} {:<8}",
                    truncate(&account.name, 20),
                    account.kind,
                    format_cents(account.balance),
                    format_cents(account.available),
                    account.currency
                );
            }
            println!("{}", "-".repeat(75));
            for total in &position.totals {
                println!(
                    "{:<34} {:>15} {:>15} {:<8}",
                    format!("Total ({} accounts)", total.account_count),
                    format_cents(total.balance),
                    format_cents(total.available),
                    total.currency
                );
            }
        }

        ReportCommands::Cashflow { account, from, to } => {
            let account = service.resolve_account(&account).await?;
            let today = Utc::now().date_naive();
            let to = match to {
                Some(to) => parse_date(&to)?,
                None => today,
            };
            let from = match from {
                Some(from) => parse_date(&from)?,
                None => today.with_day(1).unwrap_or(today),
            };

            let summary = service.cash_flow(account.id, from, to).await?;
            println!(
                "Cash flow for {}: {} to {}",
                summary.account_name, summary.from, summary.to
            );
            println!();
            println!(
                "  Opening balance:  {:>15}",
                format_cents(summary.opening_balance)
            );
            println!("  Inflows:          {:>15}", format_cents(summary.inflow));
            println!("  Outflows:         {:>15}", format_cents(-summary.outflow));
            println!("  {}", "-".repeat(33));
            println!("  Net:              {:>15}", format_cents(summary.net));
            println!(
                "  Closing balance:  {:>15}  {}",
                format_cents(summary.closing_balance),
                summary.currency
            );
            println!("  Movements:        {:>15}", summary.movement_count);

            if !summary.categories.is_empty() {
                println!();
                println!("{:<20} {:>15} {:>15}", "CATEGORY", "IN", "OUT");
                println!("{}", "-".repeat(52));
                for flow in &summary.categories {
                    println!(
                        "{:<20} {:>15} {:>15}",
                        truncate(flow.category.as_deref().unwrap_or("(none)"), 20),
                        format_cents(flow.inflow),
                        format_cents(flow.outflow)
                    );
                }
            }
        }

        ReportCommands::Segments => {
            let shares = crm.segment_distribution().await?;
            println!("{:<30} {:>8} {:>9}", "SEGMENT", "COUNT", "SHARE");
            println!("{}", "-".repeat(49));
            for share in &shares {
                println!(
                    "{:<30} {:>8} {:>8.2}%",
                    share.label, share.count, share.percentage
                );
            }
        }

        ReportCommands::PaymentBehavior => {
            let shares = crm.payment_behavior_distribution().await?;
            println!("{:<20} {:>8} {:>9}", "BEHAVIOR", "COUNT", "SHARE");
            println!("{}", "-".repeat(39));
            for share in &shares {
                println!(
                    "{:<20} {:>8} {:>8.2}%",
                    share.behavior.as_str(),
                    share.count,
                    share.percentage
                );
            }
        }
    }
    Ok(())
}

// ====== Import / export ======

async fn run_export_command(
    service: &TreasuryService,
    crm: &CrmService,
    export_type: &str,
    output: Option<&str>,
    account: Option<String>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service, crm);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "movements" => {
            let account_id = match account {
                Some(key) => Some(service.resolve_account(&key).await?.id),
                None => None,
            };
            let filter = MovementFilter {
                account_id,
                ..Default::default()
            };
            let count = exporter.export_movements_csv(writer, &filter).await?;
            if output.is_some() {
                eprintln!("Exported {} movements", count);
            }
        }
        "accounts" => {
            let count = exporter.export_accounts_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} accounts", count);
            }
        }
        "forecasts" => {
            let count = exporter.export_forecasts_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} forecasts", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full database: {} accounts, {} movements, {} forecasts, {} customers",
                    snapshot.accounts.len(),
                    snapshot.movements.len(),
                    snapshot.forecasts.len(),
                    snapshot.customers.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: movements, accounts, forecasts, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &TreasuryService,
    account: &str,
    input: Option<&str>,
    dry_run: bool,
    skip_duplicates: bool,
    force: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{Read, stdin};

    let account = service.resolve_account(account).await?;
    let importer = Importer::new(service);

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        skip_duplicates,
        force,
    };
    let result = importer
        .import_statement_csv(reader, account.id, options)
        .await?;

    if dry_run {
        println!("Dry run on {}: nothing recorded", account.name);
    } else {
        println!("Import into {} complete", account.name);
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Line {}: {}{}",
                error.line,
                error
                    .field
                    .as_ref()
                    .map(|f| format!("{}: ", f))
                    .unwrap_or_default(),
                error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

// ====== Argument parsing ======

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_amount(s: &str) -> Result<Cents> {
    parse_cents(s).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

/// Midnight UTC of the given day.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let date = parse_date(s)?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow::anyhow!("Invalid date '{}'", s))
}

fn parse_direction(s: &str) -> Result<Direction> {
    Direction::from_str(s)
        .ok_or_else(|| anyhow::anyhow!("Invalid direction '{}'. Use 'in' or 'out'", s))
}

fn parse_status(s: &str) -> Result<MovementStatus> {
    MovementStatus::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid status '{}'. Valid: entered, validated, posted, reconciled",
            s
        )
    })
}

fn parse_settlement_mode(s: &str) -> Result<SettlementMode> {
    SettlementMode::from_str(s).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid settlement mode '{}'. Valid: cash, cheque, transfer, card, mobile_money, direct_debit, other",
            s
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_labels() {
        assert_eq!(truncate("Loyer", 10), "Loyer");
        assert_eq!(truncate("Facture fournisseur", 10), "Facture...");
        assert_eq!(truncate("Échéance prêt", 8), "Échéa...");
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_direction("out").unwrap(), Direction::Outflow);
        assert!(parse_direction("up").is_err());
        assert_eq!(parse_amount("12.5").unwrap(), 1_250);
        assert!(parse_date("2024-13-01").is_err());
        assert_eq!(
            parse_datetime("2024-02-29").unwrap().to_rfc3339(),
            "2024-02-29T00:00:00+00:00"
        );
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "ecompta",
            "movement",
            "record",
            "Caisse",
            "out",
            "150.00",
            "Fournitures",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Movement(MovementCommands::Record { amount, force, .. }) => {
                assert_eq!(amount, "150.00");
                assert!(force);
            }
            _ => panic!("expected movement record"),
        }
    }
}
