mod account;
mod customer;
mod forecast;
pub mod ledger;
mod money;
mod movement;
pub mod scoring;

pub use account::*;
pub use customer::*;
pub use forecast::*;
pub use ledger::{BalanceCheck, BalanceDrift, IntegrityReport, check_balance, find_balance_drift};
pub use money::*;
pub use movement::*;
