use std::collections::BTreeMap;

use stratum_core::{Scope, ScopeKey};

use crate::error::StorageError;
use crate::traits::{ScopeStore, StoredEntry, WriteBatch, WriteOp};

/// Volatile store backed by a sorted map.
#[derive(Debug, Clone, Default)]
pub struct MemoryScopeStore {
    entries: BTreeMap<ScopeKey, StoredEntry>,
}

impl MemoryScopeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ScopeStore for MemoryScopeStore {
    fn get(&self, key: &ScopeKey) -> Result<Option<StoredEntry>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn keys(&self, scope: Scope) -> Result<Vec<ScopeKey>, StorageError> {
        Ok(self
            .entries
            .keys()
            .filter(|key| key.scope() == scope)
            .cloned()
            .collect())
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<(), StorageError> {
        for op in batch.ops() {
            match op {
                WriteOp::Put(key, entry) => {
                    self.entries.insert(key.clone(), entry.clone());
                }
                WriteOp::Remove(key) => {
                    self.entries.remove(key);
                }
            }
        }
        Ok(())
    }
}
