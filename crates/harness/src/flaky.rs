use std::cell::Cell;

use stratum_core::{Scope, ScopeKey};
use stratum_storage::{ScopeStore, StorageError, StoredEntry, WriteBatch};

/// Store wrapper that injects collaborator failures.
pub struct FlakyStore<S> {
    inner: S,
    reads_left: Cell<Option<usize>>,
    fail_batches: bool,
}

impl<S: ScopeStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads_left: Cell::new(None),
            fail_batches: false,
        }
    }

    /// Allow `n` more reads (`get` or `keys`), then fail every read.
    pub fn fail_reads_after(&mut self, n: usize) {
        self.reads_left.set(Some(n));
    }

    pub fn fail_batches(&mut self, fail: bool) {
        self.fail_batches = fail;
    }

    pub fn heal(&mut self) {
        self.reads_left.set(None);
        self.fail_batches = false;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn read(&self) -> Result<(), StorageError> {
        match self.reads_left.get() {
            Some(0) => Err(StorageError::Unavailable("injected read failure".into())),
            Some(n) => {
                self.reads_left.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<S: ScopeStore> ScopeStore for FlakyStore<S> {
    fn get(&self, key: &ScopeKey) -> Result<Option<StoredEntry>, StorageError> {
        self.read()?;
        self.inner.get(key)
    }

    fn keys(&self, scope: Scope) -> Result<Vec<ScopeKey>, StorageError> {
        self.read()?;
        self.inner.keys(scope)
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<(), StorageError> {
        if self.fail_batches {
            return Err(StorageError::Unavailable("injected write failure".into()));
        }
        self.inner.apply(batch)
    }
}
