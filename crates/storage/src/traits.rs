use stratum_core::{ContentSnapshot, ExemptionSet, Scope, ScopeKey};

use crate::error::StorageError;

/// What one (scope, key) slot holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub snapshot: ContentSnapshot,
    /// Parties the write that produced this entry was told not to affect.
    pub exemptions: ExemptionSet,
    /// Value the slot held immediately before that write, kept for exempted parties.
    pub superseded: Option<ContentSnapshot>,
}

impl StoredEntry {
    pub fn new(snapshot: ContentSnapshot) -> Self {
        Self {
            snapshot,
            exemptions: ExemptionSet::new(),
            superseded: None,
        }
    }

    pub fn with_exemptions(
        snapshot: ContentSnapshot,
        exemptions: ExemptionSet,
        superseded: Option<ContentSnapshot>,
    ) -> Self {
        Self {
            snapshot,
            exemptions,
            superseded,
        }
    }

    pub(crate) fn encode_exemptions(&self) -> Result<Vec<u8>, StorageError> {
        rmp_serde::to_vec_named(&self.exemptions)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub(crate) fn decode_exemptions(bytes: &[u8]) -> Result<ExemptionSet, StorageError> {
        rmp_serde::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put(ScopeKey, StoredEntry),
    Remove(ScopeKey),
}

/// A group of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: ScopeKey, entry: StoredEntry) -> &mut Self {
        self.ops.push(WriteOp::Put(key, entry));
        self
    }

    pub fn remove(&mut self, key: ScopeKey) -> &mut Self {
        self.ops.push(WriteOp::Remove(key));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Persistence collaborator holding one snapshot per (scope, key).
pub trait ScopeStore {
    fn get(&self, key: &ScopeKey) -> Result<Option<StoredEntry>, StorageError>;

    /// Every stored key of the given scope, in key order.
    fn keys(&self, scope: Scope) -> Result<Vec<ScopeKey>, StorageError>;

    /// Apply every op in the batch or none of them.
    fn apply(&mut self, batch: &WriteBatch) -> Result<(), StorageError>;

    fn set(&mut self, key: ScopeKey, entry: StoredEntry) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(key, entry);
        self.apply(&batch)
    }

    fn remove(&mut self, key: ScopeKey) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.remove(key);
        self.apply(&batch)
    }

    fn contains(&self, key: &ScopeKey) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// BLAKE3 digest over every stored entry in (scope, key) order. Two stores
    /// with equal digests hold byte-identical content.
    fn state_digest(&self) -> Result<[u8; 32], StorageError> {
        let mut hasher = blake3::Hasher::new();
        for scope in Scope::ALL {
            let mut keys = self.keys(scope)?;
            keys.sort();
            for key in keys {
                let Some(entry) = self.get(&key)? else {
                    continue;
                };
                hasher.update(scope.as_str().as_bytes());
                hasher.update(&[0]);
                hasher.update(key.key_str().as_bytes());
                hasher.update(&[0]);
                hasher.update(&entry.snapshot.to_msgpack()?);
                hasher.update(&entry.encode_exemptions()?);
                match &entry.superseded {
                    Some(previous) => {
                        hasher.update(&[1]);
                        hasher.update(&previous.to_msgpack()?);
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }
        Ok(*hasher.finalize().as_bytes())
    }
}

impl<S: ScopeStore + ?Sized> ScopeStore for Box<S> {
    fn get(&self, key: &ScopeKey) -> Result<Option<StoredEntry>, StorageError> {
        (**self).get(key)
    }

    fn keys(&self, scope: Scope) -> Result<Vec<ScopeKey>, StorageError> {
        (**self).keys(scope)
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<(), StorageError> {
        (**self).apply(batch)
    }
}
