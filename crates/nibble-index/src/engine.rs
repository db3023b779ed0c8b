//! Public entry points.
//!
//! [`Engine`] owns the registry and the transaction manager. Every
//! [`IndexHandle`] it opens carries its own cursor and is meant to be used
//! from one thread at a time; open one handle per thread.

use std::sync::Arc;

use nibble_common::{EngineConfig, Key, KeyType, NibbleError, Record, Result};
use tracing::{debug, trace};

use crate::cursor::{Cursor, CursorState};
use crate::index::{Index, IndexStats};
use crate::registry::Registry;
use crate::txn::{Transaction, TxnManager};

pub struct Engine {
    config: EngineConfig,
    registry: Registry,
    txns: Arc<TxnManager>,
}

impl Engine {
    /// Creates an engine after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            registry: Registry::new(config.clone()),
            txns: Arc::new(TxnManager::new()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Registry
    // =========================================================================

    pub fn create(&self, key_type: KeyType, name: &str) -> Result<()> {
        self.registry.create(key_type, name)
    }

    pub fn drop(&self, name: &str) -> Result<()> {
        self.registry.drop(name)
    }

    /// Opens a handle with a fresh cursor on `name`.
    pub fn open_index(&self, name: &str) -> Result<IndexHandle> {
        let index = self.registry.open(name)?;
        debug!(index = name, "opened index");
        Ok(IndexHandle {
            index,
            cursor: Cursor::new(),
            txns: Arc::clone(&self.txns),
        })
    }

    /// Releases a handle. Fails with `IndexNotFound` if its index was dropped
    /// in the meantime; the handle is consumed either way.
    pub fn close_index(&self, handle: IndexHandle) -> Result<()> {
        handle.index.ensure_live()?;
        debug!(index = handle.index.name(), "closed index");
        Ok(())
    }

    pub fn index_names(&self) -> Vec<String> {
        self.registry.names()
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub fn begin_transaction(&self) -> Transaction {
        self.txns.begin()
    }

    pub fn commit_transaction(&self, txn: Transaction) -> Result<()> {
        self.txns.commit(txn)
    }

    pub fn abort_transaction(&self, txn: Transaction) -> Result<()> {
        self.txns.abort(txn)
    }

    /// Number of explicit transactions neither committed nor aborted.
    pub fn live_transactions(&self) -> usize {
        self.txns.live_count()
    }

    /// Rewinds the timestamp counter to 1.
    ///
    /// Only sound on an engine holding no data and no open transactions:
    /// existing versions would otherwise carry timestamps from the future.
    pub fn reset_clock(&self) {
        self.txns.clock().reset();
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

/// An open index plus the scan position of its owner.
pub struct IndexHandle {
    index: Arc<Index>,
    cursor: Cursor,
    txns: Arc<TxnManager>,
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        self.index.name()
    }

    pub fn key_type(&self) -> KeyType {
        self.index.key_type()
    }

    pub fn cursor_state(&self) -> &CursorState {
        self.cursor.state()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.index.ensure_live()?;
        Ok(self.index.stats())
    }

    /// Returns the first payload under `key` visible to the caller and parks
    /// the cursor there.
    pub fn get(&mut self, txn: Option<Transaction>, key: &Key) -> Result<String> {
        self.index.ensure_live()?;
        let ctx = self.txns.read_context(txn)?;
        let key = self.index.encode(key)?;
        if ctx.explicit {
            self.cursor.align(ctx.tid);
        }

        let mut state = self.index.lock();
        self.cursor
            .get(&mut state, key, ctx.tid)
            .ok_or(NibbleError::KeyNotFound)
    }

    /// Returns the next record of the ascending scan, or `EndOfIndex`.
    /// The first call under a new transaction starts from the smallest key.
    pub fn get_next(&mut self, txn: Option<Transaction>) -> Result<Record> {
        self.index.ensure_live()?;
        let ctx = self.txns.read_context(txn)?;
        if ctx.explicit {
            self.cursor.align(ctx.tid);
        }

        let (key, payload) = {
            let mut state = self.index.lock();
            self.cursor.get_next(&mut state, ctx.tid)
        }
        .ok_or(NibbleError::EndOfIndex)?;
        trace!(index = self.index.name(), tid = ctx.tid.as_u64(), "cursor advanced");

        let key = self.index.codec().decode(&key)?;
        Ok(Record::new(key, payload))
    }

    pub fn insert_record(&self, txn: Option<Transaction>, key: &Key, payload: &str) -> Result<()> {
        self.index.ensure_live()?;
        let ctx = self.txns.write_context(txn, &self.index)?;
        self.index.insert(&self.txns, ctx, key, payload)
    }

    /// Deletes `payload` under `key`, or every payload when `payload` is None.
    pub fn delete_record(
        &self,
        txn: Option<Transaction>,
        key: &Key,
        payload: Option<&str>,
    ) -> Result<()> {
        self.index.ensure_live()?;
        let ctx = self.txns.write_context(txn, &self.index)?;
        self.index.delete(&self.txns, ctx, key, payload)
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("index", &self.index.name())
            .field("cursor", self.cursor.state())
            .finish()
    }
}
