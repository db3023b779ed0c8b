//! Error types for Nibble.

use crate::types::{KeyType, TxnId};
use thiserror::Error;

/// Result type alias using NibbleError.
pub type Result<T> = std::result::Result<T, NibbleError>;

/// Errors that can occur in Nibble operations.
#[derive(Debug, Error)]
pub enum NibbleError {
    // Registry errors
    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Dropping a name that is not registered. Reported as FAILURE rather
    /// than DB_DNE to keep the legacy drop contract.
    #[error("Cannot drop index {0}: not registered")]
    DropFailed(String),

    // Record errors
    #[error("Key not found")]
    KeyNotFound,

    #[error("Entry already exists")]
    EntryExists,

    #[error("Entry not found")]
    EntryNotFound,

    #[error("End of index")]
    EndOfIndex,

    // Transaction errors
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TxnId),

    #[error("Write conflict: {tid} cannot modify version written at {write_ts}, read at {read_ts}")]
    WriteConflict {
        tid: TxnId,
        write_ts: u64,
        read_ts: u64,
    },

    /// Reserved. Timestamp ordering never waits, so nothing raises this.
    #[error("Deadlock detected")]
    DeadlockDetected,

    // Input errors
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: KeyType, actual: KeyType },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Key too large: {size} bytes (max {max})")]
    KeyTooLarge { size: usize, max: usize },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NibbleError {
    /// Maps this error onto the flat result-code vocabulary.
    pub fn code(&self) -> ErrCode {
        match self {
            NibbleError::IndexAlreadyExists(_) => ErrCode::DbExists,
            NibbleError::IndexNotFound(_) => ErrCode::DbDne,
            NibbleError::KeyNotFound => ErrCode::KeyNotFound,
            NibbleError::EntryExists => ErrCode::EntryExists,
            NibbleError::EntryNotFound => ErrCode::EntryDne,
            NibbleError::EndOfIndex => ErrCode::DbEnd,
            NibbleError::TransactionNotFound(_) => ErrCode::TxnDne,
            NibbleError::DeadlockDetected => ErrCode::Deadlock,
            NibbleError::WriteConflict { .. }
            | NibbleError::TypeMismatch { .. }
            | NibbleError::UnsupportedType(_)
            | NibbleError::KeyTooLarge { .. }
            | NibbleError::PayloadTooLarge { .. }
            | NibbleError::InvalidKey(_)
            | NibbleError::InvalidParameter { .. }
            | NibbleError::DropFailed(_)
            | NibbleError::ConfigError(_)
            | NibbleError::Internal(_) => ErrCode::Failure,
        }
    }

    /// Returns true for errors that leave an explicit transaction needing abort.
    pub fn is_conflict(&self) -> bool {
        matches!(self, NibbleError::WriteConflict { .. })
    }
}

/// Flat result codes of the index API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrCode {
    Success = 0,
    DbExists = 1,
    DbDne = 2,
    DbEnd = 3,
    KeyNotFound = 4,
    TxnExists = 5,
    TxnDne = 6,
    EntryExists = 7,
    EntryDne = 8,
    Deadlock = 9,
    Failure = 10,
}

impl ErrCode {
    /// Folds a result into its code.
    pub fn of<T>(result: &Result<T>) -> ErrCode {
        match result {
            Ok(_) => ErrCode::Success,
            Err(e) => e.code(),
        }
    }
}

impl std::fmt::Display for ErrCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrCode::Success => "SUCCESS",
            ErrCode::DbExists => "DB_EXISTS",
            ErrCode::DbDne => "DB_DNE",
            ErrCode::DbEnd => "DB_END",
            ErrCode::KeyNotFound => "KEY_NOTFOUND",
            ErrCode::TxnExists => "TXN_EXISTS",
            ErrCode::TxnDne => "TXN_DNE",
            ErrCode::EntryExists => "ENTRY_EXISTS",
            ErrCode::EntryDne => "ENTRY_DNE",
            ErrCode::Deadlock => "DEADLOCK",
            ErrCode::Failure => "FAILURE",
        };
        write!(f, "{}", name)
    }
}
