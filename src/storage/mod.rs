mod customers;
mod forecasts;
mod repository;

pub use forecasts::ForecastFilter;
pub use repository::*;

/// Accounts, movements and the movement sequence counter
pub const MIGRATION_001_TREASURY: &str = include_str!("migrations/001_treasury.sql");

/// Forecast templates and occurrences
pub const MIGRATION_002_FORECASTS: &str = include_str!("migrations/002_forecasts.sql");

/// CRM customers
pub const MIGRATION_003_CUSTOMERS: &str = include_str!("migrations/003_customers.sql");
