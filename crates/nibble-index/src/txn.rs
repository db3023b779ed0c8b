//! Timestamp-ordering transaction manager.
//!
//! One logical clock hands out ids to explicit transactions and to every
//! auto-commit operation alike, keeping the order total across indexes.
//! Visibility and overwrite decisions are pure predicates over those ids:
//! nothing here ever blocks or waits on another transaction.
//!
//! Each index tracks its own active transactions together with their undo
//! logs ([`ActiveTxns`]). The engine-wide [`TxnManager`] only remembers which
//! indexes a live transaction has touched so commit and abort can visit them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use nibble_common::{NibbleError, Result, TxnId};
use parking_lot::Mutex;
use tracing::debug;

use crate::index::Index;
use crate::version::RemovedVersion;

/// Handle for an explicit transaction.
///
/// Only an id: committing or aborting twice reports `TransactionNotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    id: TxnId,
}

impl Transaction {
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }
}

// =============================================================================
// Logical Clock
// =============================================================================

/// Monotonic timestamp source. The first id issued is 1.
#[derive(Debug)]
pub struct Clock {
    next: AtomicU64,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Issues the next timestamp.
    #[inline]
    pub fn tick(&self) -> TxnId {
        TxnId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Rewinds the clock to 1. Only meaningful for an engine with no data.
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Per-index active set and undo logs
// =============================================================================

/// Inverse action recorded for one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOp {
    /// The transaction inserted this payload: abort removes it.
    Insert,
    /// The transaction removed this version: abort restores it with its
    /// original timestamps at its original chain offset.
    Delete {
        write_ts: u64,
        read_ts: u64,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub op: UndoOp,
    pub key: Bytes,
    pub payload: String,
}

impl UndoRecord {
    pub fn insert(key: Bytes, payload: impl Into<String>) -> Self {
        Self {
            op: UndoOp::Insert,
            key,
            payload: payload.into(),
        }
    }

    pub fn delete(key: Bytes, removed: RemovedVersion) -> Self {
        Self {
            op: UndoOp::Delete {
                write_ts: removed.write_ts,
                read_ts: removed.read_ts,
                position: removed.position,
            },
            key,
            payload: removed.payload,
        }
    }
}

/// Transactions with uncommitted writes on one index, each with its undo
/// log in application order.
#[derive(Debug, Default)]
pub struct ActiveTxns {
    logs: HashMap<TxnId, Vec<UndoRecord>>,
}

impl ActiveTxns {
    /// True if `ts` names a transaction other than `tid` that is still open
    /// on this index.
    #[inline]
    fn owned_by_other(&self, tid: TxnId, ts: u64) -> bool {
        ts != tid.as_u64() && self.logs.contains_key(&TxnId(ts))
    }

    /// A version is readable by `tid` unless another open transaction wrote
    /// it or it was written after `tid`.
    pub fn is_readable(&self, tid: TxnId, write_ts: u64) -> bool {
        !self.owned_by_other(tid, write_ts) && tid.as_u64() >= write_ts
    }

    /// A version may be overwritten or deleted by `tid` unless a later
    /// transaction has read or written it, or another open transaction
    /// wrote it.
    pub fn is_writable(&self, tid: TxnId, write_ts: u64, read_ts: u64) -> bool {
        !self.owned_by_other(tid, write_ts) && tid.as_u64() >= write_ts.max(read_ts)
    }

    /// Marks `tid` active without logging anything.
    pub fn register(&mut self, tid: TxnId) {
        self.logs.entry(tid).or_default();
    }

    /// Appends an undo record, registering `tid` on first touch.
    pub fn log(&mut self, tid: TxnId, record: UndoRecord) {
        self.logs.entry(tid).or_default().push(record);
    }

    /// Removes `tid` from the active set, returning its undo log.
    pub fn take(&mut self, tid: TxnId) -> Option<Vec<UndoRecord>> {
        self.logs.remove(&tid)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

// =============================================================================
// Engine-wide transaction table
// =============================================================================

/// Resolved timestamp for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpContext {
    pub tid: TxnId,
    /// False for auto-commit operations, which never log undo records.
    pub explicit: bool,
}

#[derive(Default)]
struct TxnRecord {
    touched: Vec<Arc<Index>>,
}

/// Issues timestamps and tracks live explicit transactions.
///
/// Lock order: an index lock may be held while taking the table lock, never
/// the reverse. Commit and abort drop the table lock before visiting indexes.
pub struct TxnManager {
    clock: Clock,
    table: Mutex<HashMap<TxnId, TxnRecord>>,
}

impl TxnManager {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            table: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn begin(&self) -> Transaction {
        let id = self.clock.tick();
        self.table.lock().insert(id, TxnRecord::default());
        debug!(tid = id.as_u64(), "begin transaction");
        Transaction { id }
    }

    /// Returns true while `tid` is neither committed nor aborted.
    pub fn is_live(&self, tid: TxnId) -> bool {
        self.table.lock().contains_key(&tid)
    }

    /// Number of transactions not yet resolved.
    pub fn live_count(&self) -> usize {
        self.table.lock().len()
    }

    /// Resolves the timestamp for a read. Auto-commit reads get a fresh one.
    pub fn read_context(&self, txn: Option<Transaction>) -> Result<OpContext> {
        match txn {
            Some(txn) => {
                if !self.is_live(txn.id) {
                    return Err(NibbleError::TransactionNotFound(txn.id));
                }
                Ok(OpContext {
                    tid: txn.id,
                    explicit: true,
                })
            }
            None => Ok(OpContext {
                tid: self.clock.tick(),
                explicit: false,
            }),
        }
    }

    /// Resolves the timestamp for a mutation on `index`, recording the index
    /// as touched so commit and abort will visit it.
    pub fn write_context(&self, txn: Option<Transaction>, index: &Arc<Index>) -> Result<OpContext> {
        let Some(txn) = txn else {
            return Ok(OpContext {
                tid: self.clock.tick(),
                explicit: false,
            });
        };

        let mut table = self.table.lock();
        let record = table
            .get_mut(&txn.id)
            .ok_or(NibbleError::TransactionNotFound(txn.id))?;
        if !record.touched.iter().any(|ix| Arc::ptr_eq(ix, index)) {
            record.touched.push(Arc::clone(index));
        }
        Ok(OpContext {
            tid: txn.id,
            explicit: true,
        })
    }

    /// Discards the undo logs of `txn` on every touched index.
    pub fn commit(&self, txn: Transaction) -> Result<()> {
        let record = self
            .table
            .lock()
            .remove(&txn.id)
            .ok_or(NibbleError::TransactionNotFound(txn.id))?;

        let mut discarded = 0;
        for index in &record.touched {
            discarded += index.commit(txn.id);
        }
        debug!(
            tid = txn.id.as_u64(),
            indexes = record.touched.len(),
            discarded,
            "commit transaction"
        );
        Ok(())
    }

    /// Replays the undo logs of `txn` on every touched index, newest first.
    pub fn abort(&self, txn: Transaction) -> Result<()> {
        let record = self
            .table
            .lock()
            .remove(&txn.id)
            .ok_or(NibbleError::TransactionNotFound(txn.id))?;

        // Every touched index is rolled back even if an earlier one fails.
        let mut replayed = 0;
        let mut first_err = None;
        for index in &record.touched {
            match index.rollback(txn.id) {
                Ok(n) => replayed += n,
                Err(e) => {
                    debug!(
                        tid = txn.id.as_u64(),
                        index = index.name(),
                        error = %e,
                        "rollback failed"
                    );
                    first_err.get_or_insert(e);
                }
            }
        }
        debug!(
            tid = txn.id.as_u64(),
            indexes = record.touched.len(),
            replayed,
            "abort transaction"
        );
        first_err.map_or(Ok(()), Err)
    }
}

impl Default for TxnManager {
    fn default() -> Self {
        Self::new()
    }
}
