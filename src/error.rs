//! Domain-specific errors for the account ledger engine.
//!
//! Contains error variants for common failure cases like:
//! - Account-related errors (unknown account, insufficient funds)
//! - Mutation validation errors (non-positive amount)
//! - Storage errors (corrupt ledger file at load, failed write-through)
//!
//! The first three are expected business outcomes reported to the caller.
//! `CorruptStorage` is fatal at startup; `Persistence` means the in-memory
//! mutation was rolled back and the operation is safe to retry.

use std::path::PathBuf;

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("account `{0}` not found")]
    AccountNotFound(String),

    #[error("mutation amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("insufficient funds: balance {balance}, attempted debit {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },

    #[error("corrupt ledger file {}: {reason}", path.display())]
    CorruptStorage { path: PathBuf, reason: String },

    #[error("failed to persist ledger: {0}")]
    Persistence(String),
}
