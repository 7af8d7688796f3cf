use stratum_core::{
    CategoryKey, ContentSnapshot, CoreError, PageAddress, ScopeKey, Section, SectionId, TenantKey,
    differs,
};
use stratum_engine::{Engine, EngineConfig, EngineError, ResolvedFrom};
use stratum_storage::{ScopeStore, SqliteScopeStore, StorageError, StoredEntry};

use crate::flaky::FlakyStore;

/// One operator at the editing surface, over an in-memory SQLite store.
pub struct Editor<S: ScopeStore = SqliteScopeStore> {
    pub engine: Engine<S>,
}

impl Editor<SqliteScopeStore> {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let store = SqliteScopeStore::open_in_memory()?;
        Ok(Self {
            engine: Engine::new(config, store)?,
        })
    }
}

impl Editor<FlakyStore<SqliteScopeStore>> {
    pub fn flaky() -> Result<Self, EngineError> {
        let store = FlakyStore::new(SqliteScopeStore::open_in_memory()?);
        Ok(Self {
            engine: Engine::new(EngineConfig::default(), store)?,
        })
    }
}

impl<S: ScopeStore> Editor<S> {
    /// Write straight to the store, bypassing conflict detection.
    pub fn seed(&mut self, key: ScopeKey, snapshot: ContentSnapshot) -> Result<(), StorageError> {
        self.engine.store_mut().set(key, StoredEntry::new(snapshot))
    }

    /// What `address` shows right now.
    pub fn shows(&self, address: &str) -> Result<ContentSnapshot, Box<dyn std::error::Error>> {
        Ok(self.engine.resolve(&PageAddress::new(address)?)?.snapshot)
    }

    pub fn source_of(&self, address: &str) -> Result<ResolvedFrom, Box<dyn std::error::Error>> {
        Ok(self.engine.resolve(&PageAddress::new(address)?)?.source)
    }

    pub fn digest(&self) -> Result<[u8; 32], StorageError> {
        self.engine.store().state_digest()
    }
}

/// Snapshot with one text section per name. Section identities depend only
/// on position, so equal name lists build equal snapshots.
pub fn sections(names: &[&str]) -> ContentSnapshot {
    let sections = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let mut section = Section::new("text", *name);
            section.id = SectionId::from_bytes([index as u8 + 1; 16]);
            section
        })
        .collect();
    ContentSnapshot::new(sections)
}

/// Structural equality, ignoring identities.
pub fn same(a: &ContentSnapshot, b: &ContentSnapshot) -> bool {
    !differs(a, b)
}

pub fn page(address: &str) -> Result<ScopeKey, CoreError> {
    Ok(ScopeKey::Individual(PageAddress::new(address)?))
}

pub fn tenant(key: &str) -> ScopeKey {
    ScopeKey::Tenant(TenantKey::new(key))
}

pub fn category(key: &str) -> ScopeKey {
    ScopeKey::Category(CategoryKey::new(key))
}
