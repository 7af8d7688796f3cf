pub mod config;
pub mod coordinator;
pub mod defaults;
pub mod detector;
pub mod editing;
pub mod error;
pub mod resolver;

pub use config::{AddressConfig, EngineConfig, StorageConfig};
pub use coordinator::{
    CoordinatorState, OverrideAck, OverrideWarning, PendingWrite, ProposeOutcome,
    ResolutionAction, ResolutionCoordinator,
};
pub use defaults::DesignDefaults;
pub use detector::{Conflict, ConflictScan, detect_conflicts, scan_conflicts};
pub use editing::{EditSession, EditingScopeContext};
pub use error::EngineError;
pub use resolver::{Placement, Resolution, ResolvedFrom, Resolver};

use stratum_core::{AddressPatterns, ContentSnapshot, PageAddress, ScopeKey};
use stratum_storage::{ScopeStore, SqliteScopeStore};

/// One editor's view of the scope hierarchy: resolution, the open edit
/// session, and the write path through the resolution coordinator.
pub struct Engine<S: ScopeStore> {
    config: EngineConfig,
    patterns: AddressPatterns,
    store: S,
    editing: EditingScopeContext,
    coordinator: ResolutionCoordinator,
}

impl Engine<SqliteScopeStore> {
    /// Open the SQLite store named by `config.storage.path`, or an in-memory
    /// one when no path is configured.
    pub fn open(config: EngineConfig) -> Result<Self, EngineError> {
        let store = match config.storage.path.as_deref() {
            Some(path) => SqliteScopeStore::open(path)?,
            None => SqliteScopeStore::open_in_memory()?,
        };
        Self::new(config, store)
    }
}

impl<S: ScopeStore> Engine<S> {
    pub fn new(config: EngineConfig, store: S) -> Result<Self, EngineError> {
        let patterns = config.address_patterns()?;
        Ok(Self {
            config,
            patterns,
            store,
            editing: EditingScopeContext::new(),
            coordinator: ResolutionCoordinator::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn patterns(&self) -> &AddressPatterns {
        &self.patterns
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn resolver(&self) -> Resolver<'_, S> {
        Resolver::new(&self.store, &self.patterns, &self.config.defaults)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub fn resolve(&self, address: &PageAddress) -> Result<Resolution, EngineError> {
        Ok(self.resolver().resolve(address, &self.editing)?)
    }

    /// Resolve under an explicit editing context instead of the engine's own.
    pub fn resolve_with(
        &self,
        address: &PageAddress,
        editing: &EditingScopeContext,
    ) -> Result<Resolution, EngineError> {
        Ok(self.resolver().resolve(address, editing)?)
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Open an edit session on `target`, replacing any open one. A write still
    /// awaiting a conflict decision is cancelled.
    ///
    /// The draft starts from the stored snapshot, or from a fresh copy of what
    /// the next broader tier currently shows when the slot is empty.
    pub fn begin_edit(&mut self, target: ScopeKey) -> Result<&ContentSnapshot, EngineError> {
        self.cancel_pending("new edit session");

        let (draft, exemptions) = match self.store.get(&target)? {
            Some(entry) => (entry.snapshot, entry.exemptions),
            None => {
                let seed = self.resolver().seed_for(&target)?;
                tracing::debug!(scope_key = %target, source = ?seed.source, "seeding draft");
                (seed.snapshot.duplicate(), Default::default())
            }
        };

        let session = EditSession {
            target,
            draft,
            exemptions,
        };
        if let Some(previous) = self.editing.begin(session) {
            tracing::debug!(scope_key = %previous.target, "replaced open edit session");
        }
        self.editing
            .session()
            .map(|s| &s.draft)
            .ok_or(EngineError::NoActiveEdit)
    }

    pub fn update_draft(&mut self, snapshot: ContentSnapshot) -> Result<(), EngineError> {
        let draft = self.editing.draft_mut().ok_or(EngineError::NoActiveEdit)?;
        *draft = snapshot;
        Ok(())
    }

    pub fn editing(&self) -> &EditingScopeContext {
        &self.editing
    }

    /// Close the session without saving. Leaving also cancels a pending write.
    pub fn end_edit(&mut self) -> Option<EditSession> {
        self.cancel_pending("edit session closed");
        self.editing.clear()
    }

    /// Propose the draft for the edited slot. The session closes once the
    /// write lands; with conflicts it stays open until a decision commits.
    pub fn commit_edit(&mut self) -> Result<ProposeOutcome, EngineError> {
        let session = self.editing.session().ok_or(EngineError::NoActiveEdit)?;
        let target = session.target.clone();
        let draft = session.draft.clone();

        let outcome = self.propose_write(target, draft)?;
        if outcome == ProposeOutcome::Committed {
            self.editing.clear();
        }
        Ok(outcome)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn propose_write(
        &mut self,
        target: ScopeKey,
        snapshot: ContentSnapshot,
    ) -> Result<ProposeOutcome, EngineError> {
        self.coordinator.propose(
            &mut self.store,
            &self.patterns,
            &self.config.defaults,
            target,
            snapshot,
        )
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        self.coordinator.pending()
    }

    pub fn coordinator_state(&self) -> CoordinatorState {
        self.coordinator.state()
    }

    pub fn override_warning(&self) -> Result<OverrideWarning, EngineError> {
        self.coordinator.override_warning()
    }

    pub fn apply_override(&mut self, ack: OverrideAck) -> Result<(), EngineError> {
        let target = self.coordinator.apply_override(&mut self.store, ack)?;
        self.close_session_for(&target);
        Ok(())
    }

    pub fn apply_skip(&mut self) -> Result<(), EngineError> {
        let target = self.coordinator.apply_skip(&mut self.store)?;
        self.close_session_for(&target);
        Ok(())
    }

    /// Discard the pending write. The edit session, if any, stays open.
    pub fn cancel(&mut self) -> Result<PendingWrite, EngineError> {
        self.coordinator.cancel()
    }

    /// Remove the stored slot so resolution falls through to the next tier.
    /// Returns whether anything was removed.
    pub fn reset_to_default(&mut self, key: &ScopeKey) -> Result<bool, EngineError> {
        if self.coordinator.pending().is_some() {
            return Err(EngineError::WriteAlreadyPending);
        }
        if !self.store.contains(key)? {
            return Ok(false);
        }
        self.store.remove(key.clone())?;
        tracing::info!(scope_key = %key, "reset to default");
        Ok(true)
    }

    /// Dry-run scan: which slots would a write of `snapshot` to `target` shadow.
    pub fn detect_conflicts(
        &self,
        target: &ScopeKey,
        snapshot: &ContentSnapshot,
    ) -> Result<Vec<Conflict>, EngineError> {
        detect_conflicts(&self.resolver(), target, snapshot)
            .map_err(|source| EngineError::ConflictDetectionIncomplete { source })
    }

    /// Navigating away from the editor discards any held write.
    fn cancel_pending(&mut self, reason: &'static str) {
        if self.coordinator.pending().is_none() {
            return;
        }
        match self.coordinator.cancel() {
            Ok(dropped) => tracing::debug!(scope_key = %dropped.target, reason, "held write dropped"),
            Err(err) => tracing::warn!(reason, "could not drop held write: {err}"),
        }
    }

    fn close_session_for(&mut self, target: &ScopeKey) {
        if self.editing.target() == Some(target) {
            self.editing.clear();
        }
    }
}
