//! A named index: trie, version lists, and per-index transaction state
//! behind one lock.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use nibble_common::{EngineConfig, Key, KeyType, LeafPruning, NibbleError, Result, TxnId};
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::codec::KeyCodec;
use crate::trie::ByteTrie;
use crate::txn::{ActiveTxns, OpContext, TxnManager, UndoOp, UndoRecord};
use crate::version::VersionStore;

/// Everything guarded by the index lock.
pub struct IndexState {
    pub trie: ByteTrie,
    pub versions: VersionStore,
    pub active: ActiveTxns,
}

/// Structural counters for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Trie nodes ever allocated.
    pub nodes_allocated: usize,
    /// Trie nodes reachable from the root.
    pub nodes_reachable: usize,
    /// Key entries reachable from the root, dead or alive.
    pub key_entries: usize,
    /// Reachable key entries holding at least one version.
    pub live_keys: usize,
    /// Versions across all reachable key entries.
    pub versions: usize,
    /// Transactions with uncommitted writes on this index.
    pub active_txns: usize,
}

pub struct Index {
    name: String,
    codec: KeyCodec,
    pruning: LeafPruning,
    max_payload_len: usize,
    dropped: AtomicBool,
    state: Mutex<IndexState>,
}

impl Index {
    pub fn new(name: &str, key_type: KeyType, config: &EngineConfig) -> Result<Self> {
        let codec = KeyCodec::new(key_type, config.max_varchar_len);
        let shortcuts = key_type == KeyType::Varchar && config.varchar_shortcuts;
        let trie = ByteTrie::new(codec.width(), shortcuts, config.initial_node_capacity)?;

        Ok(Self {
            name: name.to_string(),
            codec,
            pruning: config.leaf_pruning,
            max_payload_len: config.max_payload_len,
            dropped: AtomicBool::new(false),
            state: Mutex::new(IndexState {
                trie,
                versions: VersionStore::with_capacity(config.initial_node_capacity),
                active: ActiveTxns::default(),
            }),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn key_type(&self) -> KeyType {
        self.codec.key_type()
    }

    #[inline]
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Flags the index as removed from the registry.
    pub(crate) fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    /// Fails with `IndexNotFound` once the index has been dropped.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_dropped() {
            return Err(NibbleError::IndexNotFound(self.name.clone()));
        }
        Ok(())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock()
    }

    fn check_payload(&self, payload: &str) -> Result<()> {
        if payload.len() > self.max_payload_len {
            return Err(NibbleError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_len,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds `payload` under `key`.
    pub fn insert(
        &self,
        txns: &TxnManager,
        ctx: OpContext,
        key: &Key,
        payload: &str,
    ) -> Result<()> {
        let key = self.codec.encode(key)?;
        self.check_payload(payload)?;

        let mut guard = self.state.lock();
        if ctx.explicit && !txns.is_live(ctx.tid) {
            return Err(NibbleError::TransactionNotFound(ctx.tid));
        }
        let state = &mut *guard;

        let entry = state.trie.insert_or_create(&key)?;
        let head = &mut state.trie.entry_mut(entry).head;
        state.versions.insert(head, payload, ctx.tid.as_u64(), 0)?;

        if ctx.explicit {
            state.active.log(ctx.tid, UndoRecord::insert(key, payload));
        }
        Ok(())
    }

    /// Removes `payload` under `key`, or every payload when `payload` is None.
    pub fn delete(
        &self,
        txns: &TxnManager,
        ctx: OpContext,
        key: &Key,
        payload: Option<&str>,
    ) -> Result<()> {
        let key = self.codec.encode(key)?;

        let mut guard = self.state.lock();
        if ctx.explicit && !txns.is_live(ctx.tid) {
            return Err(NibbleError::TransactionNotFound(ctx.tid));
        }
        let state = &mut *guard;

        let entry = state.trie.search(&key).ok_or(NibbleError::KeyNotFound)?;
        let head = &mut state.trie.entry_mut(entry).head;
        if head.is_none() {
            return Err(NibbleError::KeyNotFound);
        }
        let removed = state
            .versions
            .delete(head, payload, &state.active, ctx.tid, false)?;
        let emptied = head.is_none();

        if emptied && state.trie.remove_leaf(&key, self.pruning) {
            debug!(index = %self.name, "detached empty key entry");
        }
        if ctx.explicit {
            for version in removed {
                state.active.log(ctx.tid, UndoRecord::delete(key.clone(), version));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Transaction resolution
    // =========================================================================

    /// Drops the undo log of `tid`, making its writes visible. Returns the
    /// number of records discarded.
    pub fn commit(&self, tid: TxnId) -> usize {
        self.state
            .lock()
            .active
            .take(tid)
            .map_or(0, |log| log.len())
    }

    /// Undoes every write of `tid` on this index, newest first, bypassing
    /// the write predicates. Returns the number of records replayed.
    pub fn rollback(&self, tid: TxnId) -> Result<usize> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(log) = state.active.take(tid) else {
            return Ok(0);
        };
        let replayed = log.len();

        for record in log.into_iter().rev() {
            match record.op {
                UndoOp::Insert => {
                    let Some(entry) = state.trie.search(&record.key) else {
                        continue;
                    };
                    let head = &mut state.trie.entry_mut(entry).head;
                    let removed = state.versions.delete(
                        head,
                        Some(record.payload.as_str()),
                        &state.active,
                        tid,
                        true,
                    );
                    match removed {
                        Ok(_) if head.is_none() => {
                            state.trie.remove_leaf(&record.key, self.pruning);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(
                                index = %self.name,
                                tid = tid.as_u64(),
                                error = %e,
                                "insert undo found nothing to remove"
                            );
                        }
                    }
                }
                UndoOp::Delete {
                    write_ts,
                    read_ts,
                    position,
                } => {
                    let entry = state.trie.insert_or_create(&record.key)?;
                    let head = &mut state.trie.entry_mut(entry).head;
                    match state
                        .versions
                        .insert_at(head, &record.payload, write_ts, read_ts, position)
                    {
                        Ok(_) | Err(NibbleError::EntryExists) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(replayed)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn stats(&self) -> IndexStats {
        let state = self.state.lock();
        let (nodes_reachable, entries) = state.trie.reachable();
        let mut live_keys = 0;
        let mut versions = 0;
        for &entry in &entries {
            let entry = state.trie.entry(entry);
            if entry.is_live() {
                live_keys += 1;
            }
            versions += state.versions.count(entry.head);
        }
        IndexStats {
            nodes_allocated: state.trie.nodes_allocated(),
            nodes_reachable,
            key_entries: entries.len(),
            live_keys,
            versions,
            active_txns: state.active.len(),
        }
    }

    /// Canonical key bytes for `key`, exposed for cursor bookkeeping.
    pub(crate) fn encode(&self, key: &Key) -> Result<Bytes> {
        self.codec.encode(key)
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("key_type", &self.codec.key_type())
            .field("dropped", &self.is_dropped())
            .finish()
    }
}
