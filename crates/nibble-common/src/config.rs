//! Configuration structures for Nibble.

use crate::error::{NibbleError, Result};
use serde::{Deserialize, Serialize};

/// Largest string key width accepted by [`EngineConfig::validate`].
pub const MAX_SUPPORTED_VARCHAR_LEN: usize = 4096;

/// Engine-wide configuration, captured by every index at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Canonical width of string keys in bytes. Longer strings are rejected.
    pub max_varchar_len: usize,
    /// Maximum payload length in bytes.
    pub max_payload_len: usize,
    /// Maximum index name length in bytes.
    pub max_index_name_len: usize,
    /// What happens to a key entry whose version list becomes empty.
    pub leaf_pruning: LeafPruning,
    /// Pre-build the zero-pad path of string indexes and start descents at
    /// the first significant digit.
    pub varchar_shortcuts: bool,
    /// Initial capacity of each arena, in records.
    pub initial_node_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_varchar_len: 128,
            max_payload_len: 100,
            max_index_name_len: 32,
            leaf_pruning: LeafPruning::Detach,
            varchar_shortcuts: true,
            initial_node_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Checks bounds that the index structures depend on.
    pub fn validate(&self) -> Result<()> {
        if self.max_varchar_len == 0 || self.max_varchar_len > MAX_SUPPORTED_VARCHAR_LEN {
            return Err(NibbleError::ConfigError(format!(
                "max_varchar_len must be in 1..={}, got {}",
                MAX_SUPPORTED_VARCHAR_LEN, self.max_varchar_len
            )));
        }
        if self.max_payload_len == 0 {
            return Err(NibbleError::ConfigError(
                "max_payload_len must be positive".to_string(),
            ));
        }
        if self.max_index_name_len == 0 {
            return Err(NibbleError::ConfigError(
                "max_index_name_len must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Treatment of a key entry left without versions after a delete.
///
/// All three behave as "key not present" to callers; they differ only in
/// how much trie structure is kept around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LeafPruning {
    /// Keep the leaf in place as a dead entry. A later insert of the same key
    /// revives it.
    Retain,
    /// Unlink the leaf from its parent slot.
    #[default]
    Detach,
    /// Unlink the leaf and remove branches left without children.
    Collapse,
}
