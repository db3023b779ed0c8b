//! Nibble common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all Nibble components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineConfig, LeafPruning};
pub use error::{ErrCode, NibbleError, Result};
pub use types::{Key, KeyType, Record, TxnId};
