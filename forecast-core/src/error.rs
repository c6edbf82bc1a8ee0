//! Error types for ledger editing and store access.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month key '{0}' (expected YYYY-MM)")]
pub struct MonthParseError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("description must not be empty")]
    EmptyDescription,

    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(i64),

    #[error("no transaction with id '{0}'")]
    UnknownTransaction(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("permission denied for document '{0}'")]
    PermissionDenied(String),

    #[error("malformed document '{user}': {reason}")]
    Malformed { user: String, reason: String },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
