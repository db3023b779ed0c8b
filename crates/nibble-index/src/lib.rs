//! In-process ordered index engine for Nibble.
//!
//! This crate provides:
//! - Key codec producing order-preserving canonical key bytes
//! - Radix-16 trie over canonical keys with arena-backed nodes
//! - Per-key version lists holding duplicate payloads and their timestamps
//! - Timestamp-ordering transactions with per-index undo logs
//! - Per-handle cursors for ascending scans that tolerate concurrent writers
//! - Name registry and the `Engine` entry points

mod codec;
mod cursor;
mod engine;
mod index;
mod registry;
mod trie;
mod txn;
mod version;

pub use codec::KeyCodec;
pub use cursor::CursorState;
pub use engine::{Engine, IndexHandle};
pub use index::IndexStats;
pub use txn::Transaction;

pub use nibble_common::{
    EngineConfig, ErrCode, Key, KeyType, LeafPruning, NibbleError, Record, Result, TxnId,
};
