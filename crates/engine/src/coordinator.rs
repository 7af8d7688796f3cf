use std::fmt::Write as _;

use stratum_core::{AddressPatterns, ContentSnapshot, ExemptionSet, ScopeKey};
use stratum_storage::{ScopeStore, StoredEntry, WriteBatch};

use crate::defaults::DesignDefaults;
use crate::detector::{Conflict, ConflictScan, scan_conflicts};
use crate::error::EngineError;
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    ConflictsPending,
    /// A decision is being committed.
    Resolving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionAction {
    Override,
    Skip,
    Cancel,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Skip => "skip",
            Self::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    Committed,
    ConflictsPending(Vec<Conflict>),
}

/// A broad write held back until the operator picks an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub target: ScopeKey,
    pub snapshot: ContentSnapshot,
    pub conflicts: Vec<Conflict>,
    /// Copies that no longer diverge; cleared by whichever action commits.
    pub stale: Vec<ScopeKey>,
    /// Value the target slot held when the write was proposed.
    pub superseded: Option<ContentSnapshot>,
    generation: u64,
}

impl PendingWrite {
    /// Whether `override` deletes the conflicting slot. Tenant templates also
    /// cover pages outside a category, so a category override exempts them.
    pub fn deletes_on_override(&self, conflict: &Conflict) -> bool {
        !matches!(
            (&self.target, &conflict.entry),
            (ScopeKey::Category(_), ScopeKey::Tenant(_))
        )
    }
}

/// The destructive-action notice for `override`. Must be shown to the
/// operator; only acknowledging it yields the token `apply_override` takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideWarning {
    generation: u64,
    deletions: Vec<Conflict>,
}

impl OverrideWarning {
    pub fn deletions(&self) -> &[Conflict] {
        &self.deletions
    }

    pub fn message(&self) -> String {
        let mut text = format!(
            "Overriding will permanently delete {} customization(s):\n",
            self.deletions.len()
        );
        for conflict in &self.deletions {
            let _ = writeln!(text, "  - {}", conflict.display_name);
        }
        text.push_str("This cannot be undone.");
        text
    }

    pub fn acknowledge(self) -> OverrideAck {
        OverrideAck {
            generation: self.generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideAck {
    generation: u64,
}

/// Mediates broad writes: scan, suspend on conflicts, apply one operator
/// decision. The store is never touched while a write is pending.
#[derive(Debug)]
pub struct ResolutionCoordinator {
    state: CoordinatorState,
    pending: Option<PendingWrite>,
    generation: u64,
}

impl Default for ResolutionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionCoordinator {
    pub fn new() -> Self {
        Self {
            state: CoordinatorState::Idle,
            pending: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn pending(&self) -> Option<&PendingWrite> {
        self.pending.as_ref()
    }

    /// Propose a write. Commits directly when nothing conflicts, otherwise
    /// holds the write and returns the conflicts.
    pub fn propose<S: ScopeStore + ?Sized>(
        &mut self,
        store: &mut S,
        patterns: &AddressPatterns,
        defaults: &DesignDefaults,
        target: ScopeKey,
        snapshot: ContentSnapshot,
    ) -> Result<ProposeOutcome, EngineError> {
        if self.pending.is_some() {
            return Err(EngineError::WriteAlreadyPending);
        }

        let (ConflictScan { conflicts, stale }, superseded) = {
            let resolver = Resolver::new(&*store, patterns, defaults);
            let scanned = scan_conflicts(&resolver, &target, &snapshot).and_then(|scan| {
                let superseded = store.get(&target)?.map(|entry| entry.snapshot);
                Ok((scan, superseded))
            });
            scanned.map_err(|source| {
                tracing::warn!(scope_key = %target, "conflict scan aborted: {source}");
                EngineError::ConflictDetectionIncomplete { source }
            })?
        };

        if conflicts.is_empty() {
            commit(store, &target, StoredEntry::new(snapshot), &stale)?;
            tracing::info!(
                scope_key = %target,
                cleared = stale.len(),
                "write committed without conflicts"
            );
            return Ok(ProposeOutcome::Committed);
        }

        self.generation += 1;
        tracing::info!(
            scope_key = %target,
            conflicts = conflicts.len(),
            "write suspended pending operator decision"
        );
        self.pending = Some(PendingWrite {
            target,
            snapshot,
            conflicts: conflicts.clone(),
            stale,
            superseded,
            generation: self.generation,
        });
        self.state = CoordinatorState::ConflictsPending;
        Ok(ProposeOutcome::ConflictsPending(conflicts))
    }

    pub fn override_warning(&self) -> Result<OverrideWarning, EngineError> {
        let pending = self.pending.as_ref().ok_or(EngineError::NoPendingWrite)?;
        Ok(OverrideWarning {
            generation: pending.generation,
            deletions: pending
                .conflicts
                .iter()
                .filter(|c| pending.deletes_on_override(c))
                .cloned()
                .collect(),
        })
    }

    /// Delete the conflicting slots and commit the write. Slots that
    /// `override` cannot delete are exempted instead.
    pub fn apply_override<S: ScopeStore + ?Sized>(
        &mut self,
        store: &mut S,
        ack: OverrideAck,
    ) -> Result<ScopeKey, EngineError> {
        let pending = self.pending.as_ref().ok_or(EngineError::NoPendingWrite)?;
        if pending.generation != ack.generation {
            return Err(EngineError::StaleAcknowledgement);
        }
        self.resolve_with(store, ResolutionAction::Override, |pending| {
            let (deleted, kept): (Vec<&Conflict>, Vec<&Conflict>) = pending
                .conflicts
                .iter()
                .partition(|c| pending.deletes_on_override(c));
            let mut removals: Vec<ScopeKey> =
                deleted.into_iter().map(|c| c.entry.clone()).collect();
            removals.extend(pending.stale.iter().cloned());
            let entry = if kept.is_empty() {
                StoredEntry::new(pending.snapshot.clone())
            } else {
                StoredEntry::with_exemptions(
                    pending.snapshot.clone(),
                    kept.into_iter().map(|c| c.entry.clone()).collect(),
                    pending.superseded.clone(),
                )
            };
            (entry, removals)
        })
    }

    /// Commit the write, exempting every conflicting slot. Only stale copies
    /// are removed.
    pub fn apply_skip<S: ScopeStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> Result<ScopeKey, EngineError> {
        self.resolve_with(store, ResolutionAction::Skip, |pending| {
            let exemptions: ExemptionSet =
                pending.conflicts.iter().map(|c| c.entry.clone()).collect();
            let entry = StoredEntry::with_exemptions(
                pending.snapshot.clone(),
                exemptions,
                pending.superseded.clone(),
            );
            (entry, pending.stale.clone())
        })
    }

    /// Drop the pending write. The store is not touched.
    pub fn cancel(&mut self) -> Result<PendingWrite, EngineError> {
        let pending = self.pending.take().ok_or(EngineError::NoPendingWrite)?;
        self.state = CoordinatorState::Idle;
        tracing::info!(
            scope_key = %pending.target,
            action = ResolutionAction::Cancel.as_str(),
            "pending write discarded"
        );
        Ok(pending)
    }

    fn resolve_with<S, F>(
        &mut self,
        store: &mut S,
        action: ResolutionAction,
        plan: F,
    ) -> Result<ScopeKey, EngineError>
    where
        S: ScopeStore + ?Sized,
        F: FnOnce(&PendingWrite) -> (StoredEntry, Vec<ScopeKey>),
    {
        let pending = self.pending.take().ok_or(EngineError::NoPendingWrite)?;
        self.state = CoordinatorState::Resolving;

        let (entry, removals) = plan(&pending);
        match commit(store, &pending.target, entry, &removals) {
            Ok(()) => {
                self.state = CoordinatorState::Idle;
                tracing::info!(
                    scope_key = %pending.target,
                    action = action.as_str(),
                    removed = removals.len(),
                    "pending write committed"
                );
                Ok(pending.target)
            }
            Err(err) => {
                self.pending = Some(pending);
                self.state = CoordinatorState::ConflictsPending;
                Err(err)
            }
        }
    }
}

fn commit<S: ScopeStore + ?Sized>(
    store: &mut S,
    target: &ScopeKey,
    entry: StoredEntry,
    removals: &[ScopeKey],
) -> Result<(), EngineError> {
    let mut batch = WriteBatch::new();
    for key in removals {
        batch.remove(key.clone());
    }
    batch.put(target.clone(), entry);
    store.apply(&batch).map_err(|source| {
        tracing::warn!(scope_key = %target, "commit failed: {source}");
        EngineError::CommitFailure {
            target: target.clone(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::{CategoryKey, PageAddress, Section, SectionId, TenantKey};
    use stratum_storage::MemoryScopeStore;

    fn snap(names: &[&str]) -> ContentSnapshot {
        let sections = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut section = Section::new("text", *name);
                section.id = SectionId::from_bytes([i as u8; 16]);
                section
            })
            .collect();
        ContentSnapshot::new(sections)
    }

    fn page(s: &str) -> ScopeKey {
        ScopeKey::Individual(PageAddress::new(s).expect("valid address"))
    }

    struct Fixture {
        store: MemoryScopeStore,
        patterns: AddressPatterns,
        defaults: DesignDefaults,
        coordinator: ResolutionCoordinator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryScopeStore::new(),
                patterns: AddressPatterns::default(),
                defaults: DesignDefaults::default(),
                coordinator: ResolutionCoordinator::new(),
            }
        }

        fn propose(
            &mut self,
            target: ScopeKey,
            snapshot: ContentSnapshot,
        ) -> Result<ProposeOutcome, EngineError> {
            self.coordinator.propose(
                &mut self.store,
                &self.patterns,
                &self.defaults,
                target,
                snapshot,
            )
        }
    }

    #[test]
    fn unconflicted_write_commits_immediately() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        let outcome = fx.propose(ScopeKey::Global, snap(&["g"]))?;
        assert_eq!(outcome, ProposeOutcome::Committed);
        assert_eq!(fx.coordinator.state(), CoordinatorState::Idle);
        let stored = fx.store.get(&ScopeKey::Global)?.ok_or(EngineError::NoPendingWrite)?;
        assert_eq!(stored.snapshot, snap(&["g"]));
        assert!(stored.exemptions.is_empty());
        Ok(())
    }

    #[test]
    fn conflicted_write_is_held_without_touching_store() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["mine"])))?;
        let before = fx.store.state_digest()?;

        let outcome = fx.propose(ScopeKey::Global, snap(&["g"]))?;
        let ProposeOutcome::ConflictsPending(conflicts) = outcome else {
            panic!("expected conflicts");
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(fx.coordinator.state(), CoordinatorState::ConflictsPending);
        assert_eq!(fx.store.state_digest()?, before);

        assert!(matches!(
            fx.propose(ScopeKey::Global, snap(&["again"])),
            Err(EngineError::WriteAlreadyPending)
        ));
        Ok(())
    }

    #[test]
    fn skip_records_exemptions_and_previous_value() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(ScopeKey::Global, StoredEntry::new(snap(&["old"])))?;
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["mine"])))?;
        fx.propose(ScopeKey::Global, snap(&["new"]))?;

        let target = fx.coordinator.apply_skip(&mut fx.store)?;
        assert_eq!(target, ScopeKey::Global);
        assert_eq!(fx.coordinator.state(), CoordinatorState::Idle);

        let global = fx.store.get(&ScopeKey::Global)?.ok_or(EngineError::NoPendingWrite)?;
        assert_eq!(global.snapshot, snap(&["new"]));
        assert!(global.exemptions.covers_key(&page("tenantA/issue/current")));
        assert_eq!(global.superseded, Some(snap(&["old"])));
        assert!(fx.store.contains(&page("tenantA/issue/current"))?);
        Ok(())
    }

    #[test]
    fn override_deletes_conflicts() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["a"])))?;
        fx.store.set(ScopeKey::Tenant(TenantKey::new("tenantB")), StoredEntry::new(snap(&["b"])))?;
        fx.propose(ScopeKey::Global, snap(&["new"]))?;

        let warning = fx.coordinator.override_warning()?;
        assert_eq!(warning.deletions().len(), 2);
        assert!(warning.message().contains("All pages of tenantB"));
        assert!(warning.message().contains("tenantA/issue/current"));

        fx.coordinator.apply_override(&mut fx.store, warning.acknowledge())?;
        assert!(!fx.store.contains(&page("tenantA/issue/current"))?);
        assert!(!fx.store.contains(&ScopeKey::Tenant(TenantKey::new("tenantB")))?);
        let global = fx.store.get(&ScopeKey::Global)?.ok_or(EngineError::NoPendingWrite)?;
        assert!(global.exemptions.is_empty());
        Ok(())
    }

    #[test]
    fn stale_copies_are_cleared_by_every_commit() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(ScopeKey::Global, StoredEntry::new(snap(&["old"])))?;
        fx.store.set(page("tenantB/issue/current"), StoredEntry::new(snap(&["old"])))?;
        assert_eq!(fx.propose(ScopeKey::Global, snap(&["new"]))?, ProposeOutcome::Committed);
        assert!(!fx.store.contains(&page("tenantB/issue/current"))?);

        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["mine"])))?;
        fx.store.set(page("tenantB/issue/current"), StoredEntry::new(snap(&["new"])))?;
        fx.propose(ScopeKey::Global, snap(&["newer"]))?;
        let pending = fx.coordinator.pending().ok_or(EngineError::NoPendingWrite)?;
        assert_eq!(pending.stale, vec![page("tenantB/issue/current")]);

        fx.coordinator.apply_skip(&mut fx.store)?;
        let global = fx.store.get(&ScopeKey::Global)?.ok_or(EngineError::NoPendingWrite)?;
        assert!(!global.exemptions.covers_key(&page("tenantB/issue/current")));
        assert!(!fx.store.contains(&page("tenantB/issue/current"))?);
        assert!(fx.store.contains(&page("tenantA/issue/current"))?);
        Ok(())
    }

    #[test]
    fn override_clears_stale_copies_with_conflicts() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        let fallback = fx.defaults.fallback.duplicate();
        fx.store.set(ScopeKey::Tenant(TenantKey::new("tenantA")), StoredEntry::new(fallback))?;
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["mine"])))?;
        fx.propose(ScopeKey::Global, snap(&["new"]))?;

        let warning = fx.coordinator.override_warning()?;
        assert_eq!(warning.deletions().len(), 1);
        fx.coordinator.apply_override(&mut fx.store, warning.acknowledge())?;
        assert!(fx.store.keys(stratum_core::Scope::Individual)?.is_empty());
        assert!(fx.store.keys(stratum_core::Scope::Tenant)?.is_empty());
        Ok(())
    }

    #[test]
    fn category_override_exempts_tenant_templates() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        let template = ScopeKey::Tenant(TenantKey::new("tenantA"));
        fx.store.set(template.clone(), StoredEntry::new(snap(&["tenant"])))?;
        fx.store.set(page("tenantA/issue/archive"), StoredEntry::new(snap(&["mine"])))?;
        let archive = ScopeKey::Category(CategoryKey::new("archive"));
        let ProposeOutcome::ConflictsPending(conflicts) = fx.propose(archive.clone(), snap(&["new"]))?
        else {
            panic!("expected conflicts");
        };
        assert_eq!(conflicts.len(), 2);

        let warning = fx.coordinator.override_warning()?;
        assert_eq!(warning.deletions().len(), 1);
        assert!(!warning.message().contains("All pages of tenantA"));
        fx.coordinator.apply_override(&mut fx.store, warning.acknowledge())?;

        assert!(!fx.store.contains(&page("tenantA/issue/archive"))?);
        assert!(fx.store.contains(&template)?);
        let stored = fx.store.get(&archive)?.ok_or(EngineError::NoPendingWrite)?;
        assert!(stored.exemptions.covers_key(&template));
        Ok(())
    }

    #[test]
    fn acknowledgement_from_earlier_write_is_rejected() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["a"])))?;
        fx.propose(ScopeKey::Global, snap(&["first"]))?;
        let stale = fx.coordinator.override_warning()?.acknowledge();
        fx.coordinator.cancel()?;

        fx.propose(ScopeKey::Global, snap(&["second"]))?;
        assert!(matches!(
            fx.coordinator.apply_override(&mut fx.store, stale),
            Err(EngineError::StaleAcknowledgement)
        ));
        assert_eq!(fx.coordinator.state(), CoordinatorState::ConflictsPending);
        assert!(fx.store.contains(&page("tenantA/issue/current"))?);
        Ok(())
    }

    #[test]
    fn cancel_returns_to_idle() -> Result<(), EngineError> {
        let mut fx = Fixture::new();
        fx.store.set(page("tenantA/issue/current"), StoredEntry::new(snap(&["a"])))?;
        fx.propose(ScopeKey::Global, snap(&["g"]))?;

        let dropped = fx.coordinator.cancel()?;
        assert_eq!(dropped.target, ScopeKey::Global);
        assert_eq!(fx.coordinator.state(), CoordinatorState::Idle);
        assert!(fx.coordinator.pending().is_none());
        assert!(!fx.store.contains(&ScopeKey::Global)?);
        assert!(matches!(fx.coordinator.cancel(), Err(EngineError::NoPendingWrite)));
        Ok(())
    }

    #[test]
    fn actions_without_pending_write_fail() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.coordinator.apply_skip(&mut fx.store),
            Err(EngineError::NoPendingWrite)
        ));
        assert!(matches!(
            fx.coordinator.override_warning(),
            Err(EngineError::NoPendingWrite)
        ));
    }
}
