use thiserror::Error;

use crate::domain::{Cents, MovementStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Account is closed: {0}")]
    AccountClosed(String),

    #[error("Movement not found: {0}")]
    MovementNotFound(String),

    #[error("Movement {id} is {status} and can no longer be modified")]
    MovementLocked { id: String, status: MovementStatus },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: MovementStatus,
        to: MovementStatus,
    },

    #[error("Insufficient funds in account {account}: available {available}, required {required}")]
    InsufficientFunds {
        account: String,
        available: Cents,
        required: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forecast not found: {0}")]
    ForecastNotFound(String),

    #[error("Forecast is not recurring: {0}")]
    ForecastNotRecurring(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Customer already exists: {0}")]
    CustomerAlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
