//! Per-key version lists.
//!
//! Each key entry heads a singly linked chain of versions kept in insertion
//! order. A version carries its payload plus the write and read timestamps the
//! transaction predicates inspect. Removed versions are unlinked and marked
//! dead but keep their `next` link, so a cursor parked on one can still walk
//! forward.

use nibble_common::{NibbleError, Result, TxnId};
use tracing::trace;

use crate::trie::{Arena, Ref};
use crate::txn::ActiveTxns;

pub type VersionRef = Ref<VersionEntry>;

/// One (payload, timestamps) pair under a key entry.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub payload: String,
    pub write_ts: u64,
    pub read_ts: u64,
    pub next: Option<VersionRef>,
    live: bool,
}

impl VersionEntry {
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    #[inline]
    fn mark_dead(&mut self) {
        self.live = false;
    }
}

/// A version removed by a delete, kept for undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedVersion {
    pub payload: String,
    pub write_ts: u64,
    pub read_ts: u64,
    /// Offset in the chain at the moment of removal.
    pub position: usize,
}

/// Arena holding every version entry of one index.
pub struct VersionStore {
    arena: Arena<VersionEntry>,
}

impl VersionStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn get(&self, r: VersionRef) -> &VersionEntry {
        self.arena.get(r)
    }

    /// Iterates the live chain starting at `head`.
    pub fn chain(&self, head: Option<VersionRef>) -> impl Iterator<Item = VersionRef> + '_ {
        std::iter::successors(head, move |r| self.arena.get(*r).next)
    }

    /// Number of versions in the chain starting at `head`.
    pub fn count(&self, head: Option<VersionRef>) -> usize {
        self.chain(head).count()
    }

    /// Returns the first live version at or after `from` that `tid` may read,
    /// raising its read timestamp to `tid`.
    pub fn next_visible(
        &mut self,
        from: Option<VersionRef>,
        active: &ActiveTxns,
        tid: TxnId,
    ) -> Option<VersionRef> {
        let mut cursor = from;
        while let Some(r) = cursor {
            let version = self.arena.get_mut(r);
            if version.is_live() && active.is_readable(tid, version.write_ts) {
                version.read_ts = version.read_ts.max(tid.as_u64());
                return Some(r);
            }
            cursor = version.next;
        }
        None
    }

    /// Appends a version stamped with the given timestamps.
    ///
    /// Fails with `EntryExists` if any version in the chain, visible or not,
    /// already carries `payload`.
    pub fn insert(
        &mut self,
        head: &mut Option<VersionRef>,
        payload: &str,
        write_ts: u64,
        read_ts: u64,
    ) -> Result<VersionRef> {
        self.insert_at(head, payload, write_ts, read_ts, usize::MAX)
    }

    /// Links a version in at `position` (clamped to the chain length).
    pub fn insert_at(
        &mut self,
        head: &mut Option<VersionRef>,
        payload: &str,
        write_ts: u64,
        read_ts: u64,
        position: usize,
    ) -> Result<VersionRef> {
        let mut prev = None;
        for (i, r) in self.chain(*head).enumerate() {
            if self.arena.get(r).payload == payload {
                return Err(NibbleError::EntryExists);
            }
            if i < position {
                prev = Some(r);
            }
        }

        let next = match prev {
            None => *head,
            Some(prev) => self.arena.get(prev).next,
        };
        let r = self.arena.allocate(VersionEntry {
            payload: payload.to_string(),
            write_ts,
            read_ts,
            next,
            live: true,
        })?;
        match prev {
            None => *head = Some(r),
            Some(prev) => self.arena.get_mut(prev).next = Some(r),
        }
        Ok(r)
    }

    /// Removes versions from the chain at `head`.
    ///
    /// Without `payload` every version must be writable by `tid`, otherwise
    /// nothing is removed. With `payload` only the matching version is
    /// checked. `force` skips the writability predicate entirely.
    pub fn delete(
        &mut self,
        head: &mut Option<VersionRef>,
        payload: Option<&str>,
        active: &ActiveTxns,
        tid: TxnId,
        force: bool,
    ) -> Result<Vec<RemovedVersion>> {
        match payload {
            None => {
                let refs: Vec<VersionRef> = self.chain(*head).collect();
                if !force {
                    for &r in &refs {
                        self.check_writable(r, active, tid)?;
                    }
                }
                *head = None;
                Ok(refs
                    .into_iter()
                    .enumerate()
                    .map(|(position, r)| self.retire(r, position))
                    .collect())
            }
            Some(payload) => {
                let mut prev: Option<VersionRef> = None;
                let mut cursor = *head;
                let mut position = 0;
                while let Some(r) = cursor {
                    let version = self.arena.get(r);
                    if version.payload == payload {
                        if !force {
                            self.check_writable(r, active, tid)?;
                        }
                        let next = version.next;
                        match prev {
                            None => *head = next,
                            Some(prev) => self.arena.get_mut(prev).next = next,
                        }
                        return Ok(vec![self.retire(r, position)]);
                    }
                    prev = Some(r);
                    cursor = version.next;
                    position += 1;
                }
                Err(NibbleError::EntryNotFound)
            }
        }
    }

    fn check_writable(&self, r: VersionRef, active: &ActiveTxns, tid: TxnId) -> Result<()> {
        let version = self.arena.get(r);
        if active.is_writable(tid, version.write_ts, version.read_ts) {
            return Ok(());
        }
        trace!(
            tid = tid.as_u64(),
            write_ts = version.write_ts,
            read_ts = version.read_ts,
            "write conflict"
        );
        Err(NibbleError::WriteConflict {
            tid,
            write_ts: version.write_ts,
            read_ts: version.read_ts,
        })
    }

    /// Marks an unlinked version dead and hands its contents to the caller.
    /// The `next` link stays so parked cursors can move past it.
    fn retire(&mut self, r: VersionRef, position: usize) -> RemovedVersion {
        let version = self.arena.get_mut(r);
        version.mark_dead();
        RemovedVersion {
            payload: std::mem::take(&mut version.payload),
            write_ts: version.write_ts,
            read_ts: version.read_ts,
            position,
        }
    }
}
