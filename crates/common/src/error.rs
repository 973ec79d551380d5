//! Error types for scenario data

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or validating scenario data
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid account id: {0:?} (expected digits only)")]
    InvalidAccountId(String),

    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Invalid transfer: source and destination are both account {0}")]
    SameAccountTransfer(String),

    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
