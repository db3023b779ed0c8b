//! Append-only arenas addressed by typed integer references.
//!
//! Every trie node, key entry, and version entry of an index lives in one of
//! its arenas. Records are never freed individually; the whole arena goes
//! away with the index, so a reference stays valid for the index lifetime.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use nibble_common::{NibbleError, Result};

/// Compact reference to a record of type `T` inside an [`Arena<T>`].
pub struct Ref<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    #[inline]
    fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Position of the record inside its arena.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

// Manual impls: derives would require `T` to implement these traits.
impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({})", self.index)
    }
}

/// Growable record store. Reference values map directly to Vec indices.
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Arena<T> {
    /// Creates an empty arena with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Stores `value` and returns its reference.
    #[inline]
    pub fn allocate(&mut self, value: T) -> Result<Ref<T>> {
        let index = u32::try_from(self.items.len())
            .map_err(|_| NibbleError::Internal("arena reference space exhausted".to_string()))?;
        self.items.push(value);
        Ok(Ref::new(index))
    }

    /// Resolves a reference. References handed out by this arena are never
    /// invalidated, so resolution cannot miss.
    #[inline]
    pub fn get(&self, r: Ref<T>) -> &T {
        &self.items[r.index()]
    }

    /// Resolves a reference for mutation.
    #[inline]
    pub fn get_mut(&mut self, r: Ref<T>) -> &mut T {
        &mut self.items[r.index()]
    }

    /// Number of records ever allocated.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
