//! Per-handle scan bookmark.
//!
//! A cursor remembers the last key it returned (or failed to find) as
//! canonical bytes, never as a trie reference. Every call re-derives its
//! position from those bytes under the index lock, so concurrent structural
//! changes between calls cannot invalidate it. A scan is therefore not a
//! snapshot: later calls see whatever the visibility rules allow at the time.
//!
//! The first read a transaction makes through a cursor restarts it, so a
//! transaction never inherits the position of an earlier reader.
//!
//! ```text
//!              get hit                      get miss
//!   INITIAL ────────────▶ POSITIONED ◀──────────────▶ EXHAUSTED_AT_KEY
//!      │                     ▲  │                          │
//!      └───── get_next ──────┘  └──── get_next ◀───────────┘
//! ```

use bytes::Bytes;
use nibble_common::TxnId;
use tracing::trace;

use crate::index::IndexState;
use crate::trie::{KeyEntry, Ref};
use crate::version::VersionRef;

/// Scan position of one handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing read yet. The next `get_next` starts at the smallest key.
    #[default]
    Initial,
    /// `key` was returned last; its version list continues at `next`.
    Positioned {
        key: Bytes,
        next: Option<VersionRef>,
    },
    /// A `get` for `key` found nothing visible.
    ExhaustedAtKey { key: Bytes },
}

#[derive(Debug, Default)]
pub struct Cursor {
    state: CursorState,
    /// Last explicit transaction that read through this cursor.
    txn: Option<TxnId>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Rewinds to `Initial` when `tid` differs from the last transaction
    /// served. Auto-commit reads never call this.
    pub fn align(&mut self, tid: TxnId) {
        if self.txn != Some(tid) {
            trace!(tid = tid.as_u64(), "new transaction, cursor rewound");
            self.state = CursorState::Initial;
            self.txn = Some(tid);
        }
    }

    /// Point lookup. Returns the first payload under `key` visible to `tid`
    /// and parks the cursor on it; on a miss, remembers `key` for a later
    /// `get_next`.
    pub fn get(&mut self, ix: &mut IndexState, key: Bytes, tid: TxnId) -> Option<String> {
        if let Some(entry) = ix.trie.search(&key) {
            if let Some((_, payload)) = self.land(ix, entry, tid) {
                return Some(payload);
            }
        }
        trace!(tid = tid.as_u64(), "get missed, cursor exhausted at key");
        self.state = CursorState::ExhaustedAtKey { key };
        None
    }

    /// Advances the scan. Returns the next (canonical key, payload) pair
    /// visible to `tid`, or None once the index is exhausted. The cursor
    /// keeps its position on exhaustion.
    pub fn get_next(&mut self, ix: &mut IndexState, tid: TxnId) -> Option<(Bytes, String)> {
        let resume_after = match self.state.clone() {
            CursorState::Initial => {
                let entry = ix.trie.minimum()?;
                if let Some(hit) = self.land(ix, entry, tid) {
                    return Some(hit);
                }
                ix.trie.entry(entry).key.clone()
            }
            CursorState::Positioned { key, next } => {
                if let Some(version) = ix.versions.next_visible(next, &ix.active, tid) {
                    let found = ix.versions.get(version);
                    let payload = found.payload.clone();
                    self.state = CursorState::Positioned {
                        key: key.clone(),
                        next: found.next,
                    };
                    return Some((key, payload));
                }
                key
            }
            CursorState::ExhaustedAtKey { key } => {
                // A concurrent insert may have created the key since.
                if let Some(entry) = ix.trie.search(&key) {
                    if let Some(hit) = self.land(ix, entry, tid) {
                        return Some(hit);
                    }
                }
                key
            }
        };
        self.scan_after(ix, resume_after, tid)
    }

    /// Walks successors of `key` until one holds a version visible to `tid`.
    fn scan_after(&mut self, ix: &mut IndexState, mut key: Bytes, tid: TxnId) -> Option<(Bytes, String)> {
        loop {
            let entry = ix.trie.successor(&key)?;
            if let Some(hit) = self.land(ix, entry, tid) {
                return Some(hit);
            }
            trace!(tid = tid.as_u64(), "skipping key with no visible version");
            key = ix.trie.entry(entry).key.clone();
        }
    }

    /// Positions the cursor on the first version of `entry` visible to `tid`.
    fn land(&mut self, ix: &mut IndexState, entry: Ref<KeyEntry>, tid: TxnId) -> Option<(Bytes, String)> {
        let entry = ix.trie.entry(entry);
        let version = ix.versions.next_visible(entry.head, &ix.active, tid)?;
        let key = entry.key.clone();
        let found = ix.versions.get(version);
        let payload = found.payload.clone();
        self.state = CursorState::Positioned {
            key: key.clone(),
            next: found.next,
        };
        Some((key, payload))
    }
}
