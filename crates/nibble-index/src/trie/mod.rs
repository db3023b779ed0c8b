//! Radix-16 trie over fixed-width canonical keys.
//!
//! Every level consumes one 4-bit digit, high nibble first:
//!
//! ```text
//! key 0x12 0x34        root
//!                       │ slot 1
//!                     branch
//!                       │ slot 2
//!                     branch ── slot 3 ──▶ leaf (0x1234)
//!                       └──── slot 7 ──▶ leaf (0x1270)
//! ```
//!
//! A slot is empty, a branch to the next level, or a leaf referencing a key
//! entry. A leaf sits at the shallowest depth where its digit path differs
//! from every other key; inserting a key that collides with a leaf splits the
//! leaf into a chain of branches down to the first differing digit.
//!
//! ## Storage
//!
//! Nodes and key entries live in two [`Arena`]s and are addressed by typed
//! [`Ref`] indices. Nothing is freed while the trie lives: unlinked nodes and
//! entries simply become unreachable.
//!
//! ## String shortcuts
//!
//! String keys are right-justified with zero bytes, so most of them share a
//! long all-zero prefix. With shortcuts enabled that zero path is built when
//! the trie is created and a descent jumps straight to the level of the key's
//! first significant byte. Those anchor nodes are never collapsed.

mod arena;
mod constants;
mod tree;
mod types;

pub use arena::{Arena, Ref};
pub use tree::ByteTrie;
pub use types::KeyEntry;
