//! Order-preserving radix trie over canonical key bytes.

use bytes::Bytes;
use nibble_common::{LeafPruning, NibbleError, Result};

use super::arena::{Arena, Ref};
use super::constants::{digit_at, levels_for};
use super::types::{KeyEntry, Slot, TrieNode};

/// Radix-16 trie mapping canonical keys of one fixed width to key entries.
///
/// A leaf sits at the shallowest level where its key's digit path diverges
/// from every other stored key, so lookups stop as soon as they meet a leaf.
/// The zero-length key never enters the trie and lives in a reserved slot.
pub struct ByteTrie {
    nodes: Arena<TrieNode>,
    entries: Arena<KeyEntry>,
    root: Ref<TrieNode>,
    null_entry: Option<Ref<KeyEntry>>,
    /// Canonical key width in bytes.
    width: usize,
    /// Number of digit levels (`2 * width`).
    levels: usize,
    /// Nodes on the all-zero digit path, indexed by depth. Empty when
    /// shortcuts are disabled.
    anchors: Vec<Ref<TrieNode>>,
}

impl ByteTrie {
    /// Creates an empty trie for keys of `width` bytes.
    ///
    /// With `shortcuts`, the all-zero digit path is built up front so that
    /// descents for left-padded keys can start at their first significant
    /// byte instead of the root.
    pub fn new(width: usize, shortcuts: bool, capacity: usize) -> Result<Self> {
        let levels = levels_for(width);
        let mut nodes = Arena::with_capacity(capacity.max(if shortcuts { levels } else { 1 }));
        let root = nodes.allocate(TrieNode::default())?;

        let mut anchors = Vec::new();
        if shortcuts {
            anchors.reserve(levels);
            anchors.push(root);
            let mut parent = root;
            for _ in 1..levels {
                let child = nodes.allocate(TrieNode::default())?;
                nodes.get_mut(parent).slots[0] = Slot::Branch(child);
                anchors.push(child);
                parent = child;
            }
        }

        Ok(Self {
            nodes,
            entries: Arena::with_capacity(capacity),
            root,
            null_entry: None,
            width,
            levels,
            anchors,
        })
    }

    #[inline]
    pub fn entry(&self, r: Ref<KeyEntry>) -> &KeyEntry {
        self.entries.get(r)
    }

    #[inline]
    pub fn entry_mut(&mut self, r: Ref<KeyEntry>) -> &mut KeyEntry {
        self.entries.get_mut(r)
    }

    /// Total trie nodes allocated, including ones no longer reachable.
    pub fn nodes_allocated(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Descent helpers
    // =========================================================================

    /// Node and depth at which a descent for `key` starts.
    ///
    /// Digits above the returned depth are all zero, so the skipped path is
    /// exactly `anchors[0..depth]` taking slot 0 at each level.
    #[inline]
    fn start(&self, key: &[u8]) -> (Ref<TrieNode>, usize) {
        if self.anchors.is_empty() {
            return (self.root, 0);
        }
        let first_significant = key.iter().position(|&b| b != 0).unwrap_or(key.len());
        let depth = (first_significant * 2).min(self.anchors.len() - 1);
        (self.anchors[depth], depth)
    }

    /// Anchors and the root are never collapsed. They are the first nodes
    /// allocated, so their references sort below every other node.
    #[inline]
    fn is_pinned(&self, node: Ref<TrieNode>) -> bool {
        node == self.root || node.index() < self.anchors.len()
    }

    fn check_width(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.width {
            return Err(NibbleError::Internal(format!(
                "canonical key has {} bytes, trie expects {}",
                key.len(),
                self.width
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Finds the key entry for `key`, dead or alive.
    pub fn search(&self, key: &[u8]) -> Option<Ref<KeyEntry>> {
        if key.is_empty() {
            return self.null_entry;
        }
        if key.len() != self.width {
            return None;
        }

        let (mut node, mut depth) = self.start(key);
        while depth < self.levels {
            match self.nodes.get(node).slots[digit_at(key, depth)] {
                Slot::Empty => return None,
                Slot::Branch(child) => {
                    node = child;
                    depth += 1;
                }
                Slot::Leaf(entry) => {
                    return (self.entries.get(entry).key.as_ref() == key).then_some(entry);
                }
            }
        }
        None
    }

    /// Smallest key entry, dead or alive. The zero-length key sorts first.
    pub fn minimum(&self) -> Option<Ref<KeyEntry>> {
        self.null_entry.or_else(|| self.leftmost(self.root))
    }

    /// Smallest key entry strictly greater than `key`.
    ///
    /// Walks `key`'s digit path recording, per level, the node and the first
    /// sibling slot after the one taken. Backtracking pops that stack, so no
    /// node needs a parent reference.
    pub fn successor(&self, key: &[u8]) -> Option<Ref<KeyEntry>> {
        if key.is_empty() {
            return self.leftmost(self.root);
        }
        if key.len() != self.width {
            return None;
        }

        let (mut node, mut depth) = self.start(key);
        let mut stack: Vec<(Ref<TrieNode>, usize)> = Vec::with_capacity(self.levels);
        stack.extend(self.anchors[..depth].iter().map(|&anchor| (anchor, 1)));

        while depth < self.levels {
            let digit = digit_at(key, depth);
            match self.nodes.get(node).slots[digit] {
                Slot::Branch(child) => {
                    stack.push((node, digit + 1));
                    node = child;
                    depth += 1;
                }
                Slot::Leaf(entry) => {
                    // The only key under this prefix: if larger, nothing
                    // between it and `key` can exist.
                    if self.entries.get(entry).key.as_ref() > key {
                        return Some(entry);
                    }
                    stack.push((node, digit + 1));
                    break;
                }
                Slot::Empty => {
                    stack.push((node, digit + 1));
                    break;
                }
            }
        }

        while let Some((node, from)) = stack.pop() {
            for slot in &self.nodes.get(node).slots[from..] {
                match *slot {
                    Slot::Empty => {}
                    Slot::Leaf(entry) => return Some(entry),
                    Slot::Branch(child) => {
                        // Detached leaves can leave childless branches behind.
                        if let Some(entry) = self.leftmost(child) {
                            return Some(entry);
                        }
                    }
                }
            }
        }
        None
    }

    /// Leftmost leaf below `start`, skipping empty subtrees.
    fn leftmost(&self, start: Ref<TrieNode>) -> Option<Ref<KeyEntry>> {
        let mut stack = vec![(start, 0usize)];
        while let Some((node, from)) = stack.pop() {
            let slots = &self.nodes.get(node).slots;
            for (i, slot) in slots.iter().enumerate().skip(from) {
                match *slot {
                    Slot::Empty => {}
                    Slot::Leaf(entry) => return Some(entry),
                    Slot::Branch(child) => {
                        stack.push((node, i + 1));
                        stack.push((child, 0));
                        break;
                    }
                }
            }
        }
        None
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Returns the key entry for `key`, creating it if absent.
    pub fn insert_or_create(&mut self, key: &Bytes) -> Result<Ref<KeyEntry>> {
        if key.is_empty() {
            if let Some(entry) = self.null_entry {
                return Ok(entry);
            }
            let entry = self.entries.allocate(KeyEntry::new(key.clone()))?;
            self.null_entry = Some(entry);
            return Ok(entry);
        }
        self.check_width(key)?;

        let (mut node, mut depth) = self.start(key);
        while depth < self.levels {
            let digit = digit_at(key, depth);
            match self.nodes.get(node).slots[digit] {
                Slot::Empty => {
                    let entry = self.entries.allocate(KeyEntry::new(key.clone()))?;
                    self.nodes.get_mut(node).slots[digit] = Slot::Leaf(entry);
                    return Ok(entry);
                }
                Slot::Branch(child) => {
                    node = child;
                    depth += 1;
                }
                Slot::Leaf(existing) => {
                    if self.entries.get(existing).key == *key {
                        return Ok(existing);
                    }
                    return self.split(node, depth, existing, key);
                }
            }
        }
        Err(NibbleError::Internal(
            "trie descent ran past the key width".to_string(),
        ))
    }

    /// Replaces the leaf at `node[digit(key, depth)]` with a chain of branches
    /// along the shared digits, then places both leaves where the paths
    /// diverge.
    fn split(
        &mut self,
        mut node: Ref<TrieNode>,
        mut depth: usize,
        existing: Ref<KeyEntry>,
        key: &Bytes,
    ) -> Result<Ref<KeyEntry>> {
        let existing_key = self.entries.get(existing).key.clone();
        let entry = self.entries.allocate(KeyEntry::new(key.clone()))?;

        loop {
            let branch = self.nodes.allocate(TrieNode::default())?;
            self.nodes.get_mut(node).slots[digit_at(key, depth)] = Slot::Branch(branch);
            node = branch;
            depth += 1;
            if depth >= self.levels {
                return Err(NibbleError::Internal(
                    "split reached the last level with identical digits".to_string(),
                ));
            }

            let old_digit = digit_at(&existing_key, depth);
            let new_digit = digit_at(key, depth);
            if old_digit != new_digit {
                let slots = &mut self.nodes.get_mut(node).slots;
                slots[old_digit] = Slot::Leaf(existing);
                slots[new_digit] = Slot::Leaf(entry);
                return Ok(entry);
            }
        }
    }

    /// Unlinks the leaf for `key` according to `pruning`. Returns true if a
    /// leaf was detached.
    ///
    /// Only called once the entry's version list is empty.
    pub fn remove_leaf(&mut self, key: &[u8], pruning: LeafPruning) -> bool {
        if pruning == LeafPruning::Retain {
            return false;
        }
        if key.is_empty() {
            return self.null_entry.take().is_some();
        }
        if key.len() != self.width {
            return false;
        }

        let (mut node, mut depth) = self.start(key);
        let mut path: Vec<(Ref<TrieNode>, usize)> = Vec::new();
        loop {
            if depth >= self.levels {
                return false;
            }
            let digit = digit_at(key, depth);
            match self.nodes.get(node).slots[digit] {
                Slot::Branch(child) => {
                    path.push((node, digit));
                    node = child;
                    depth += 1;
                }
                Slot::Leaf(entry) if self.entries.get(entry).key.as_ref() == key => {
                    self.nodes.get_mut(node).slots[digit] = Slot::Empty;
                    break;
                }
                _ => return false,
            }
        }

        if pruning == LeafPruning::Collapse {
            while self.nodes.get(node).is_childless() && !self.is_pinned(node) {
                let Some((parent, digit)) = path.pop() else {
                    break;
                };
                self.nodes.get_mut(parent).slots[digit] = Slot::Empty;
                node = parent;
            }
        }
        true
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Counts reachable branch nodes and key entries.
    pub fn reachable(&self) -> (usize, Vec<Ref<KeyEntry>>) {
        let mut nodes = 0;
        let mut leaves: Vec<Ref<KeyEntry>> = self.null_entry.into_iter().collect();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            nodes += 1;
            for slot in self.nodes.get(node).slots.iter().rev() {
                match *slot {
                    Slot::Empty => {}
                    Slot::Leaf(entry) => leaves.push(entry),
                    Slot::Branch(child) => stack.push(child),
                }
            }
        }
        (nodes, leaves)
    }
}
