//! Trie node and key entry records.

use bytes::Bytes;

use super::arena::Ref;
use super::constants::FANOUT;
use crate::version::VersionRef;

/// One child slot of a trie node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Empty,
    /// Interior node one level deeper.
    Branch(Ref<TrieNode>),
    /// The single key entry stored under this prefix.
    Leaf(Ref<KeyEntry>),
}

impl Slot {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

/// Fixed-arity interior node.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    pub slots: [Slot; FANOUT],
}

impl TrieNode {
    /// Returns true if every slot is empty.
    pub fn is_childless(&self) -> bool {
        self.slots.iter().all(Slot::is_empty)
    }
}

/// Trie leaf for one distinct canonical key, heading its version list.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub key: Bytes,
    pub head: Option<VersionRef>,
}

impl KeyEntry {
    pub fn new(key: Bytes) -> Self {
        Self { key, head: None }
    }

    /// A key entry is live while it holds at least one version.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.head.is_some()
    }
}
