//! Name to index mapping.
//!
//! The registry is not transactional: create and drop take effect
//! immediately for every thread. Dropping only unregisters the name and flags
//! the index; handles still holding it observe `IndexNotFound` on their next
//! call and the memory goes away with the last handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use nibble_common::{EngineConfig, KeyType, NibbleError, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::index::Index;

pub struct Registry {
    indexes: RwLock<BTreeMap<String, Arc<Index>>>,
    config: EngineConfig,
}

impl Registry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            indexes: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > self.config.max_index_name_len || name.contains('\0') {
            return Err(NibbleError::InvalidParameter {
                name: "index_name".to_string(),
                value: name.to_string(),
            });
        }
        Ok(())
    }

    /// Registers a new empty index under `name`.
    pub fn create(&self, key_type: KeyType, name: &str) -> Result<()> {
        self.check_name(name)?;

        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(NibbleError::IndexAlreadyExists(name.to_string()));
        }
        let index = Index::new(name, key_type, &self.config)?;
        indexes.insert(name.to_string(), Arc::new(index));

        debug!(index = name, key_type = %key_type, "created index");
        Ok(())
    }

    /// Unregisters `name` and flags the index as dropped.
    pub fn drop(&self, name: &str) -> Result<()> {
        let index = self
            .indexes
            .write()
            .remove(name)
            .ok_or_else(|| NibbleError::DropFailed(name.to_string()))?;
        index.mark_dropped();

        debug!(index = name, "dropped index");
        Ok(())
    }

    pub fn open(&self, name: &str) -> Result<Arc<Index>> {
        self.indexes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NibbleError::IndexNotFound(name.to_string()))
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.indexes.read().keys().cloned().collect()
    }
}
