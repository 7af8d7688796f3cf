use std::collections::BTreeSet;

use stratum_core::{
    ContentSnapshot, Difference, Scope, ScopeKey, TenantKey, differs, first_difference,
};
use stratum_storage::{ScopeStore, StorageError};

use crate::resolver::{Placement, Resolution, Resolver, broader};

/// A narrower slot that a proposed broad write would not reach, and whose
/// content is a deliberate divergence rather than a stale copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub entry: ScopeKey,
    pub tenant: Option<TenantKey>,
    pub display_name: String,
    /// How the slot diverges from the default it would otherwise fall back to.
    pub difference: Difference,
}

impl Conflict {
    pub fn address(&self) -> Option<&stratum_core::PageAddress> {
        self.entry.address()
    }
}

/// Result of scanning the slots a broad write would shadow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictScan {
    pub conflicts: Vec<Conflict>,
    /// Slots holding a copy of the value they already inherit, or of the
    /// proposed value. They are removed with the write so the new value
    /// reaches them.
    pub stale: Vec<ScopeKey>,
}

/// Find every narrower slot shadowing a proposed write to `target`.
///
/// Each candidate is compared against the value it would resolve to from the
/// target's tier upwards if it were removed. Candidates structurally equal to
/// that default are stale copies and not conflicts; so are candidates equal
/// to the proposed snapshot, since nothing would be lost. Any store failure
/// aborts the scan.
pub fn detect_conflicts<S: ScopeStore + ?Sized>(
    resolver: &Resolver<'_, S>,
    target: &ScopeKey,
    proposed: &ContentSnapshot,
) -> Result<Vec<Conflict>, StorageError> {
    scan_conflicts(resolver, target, proposed).map(|scan| scan.conflicts)
}

/// Like [`detect_conflicts`], but also reports the stale copies the write
/// should clear.
///
/// A stale copy is only cleared when nothing between it and the target
/// would catch the page once it is gone. A tenant template is never cleared
/// by a category write, since it also covers pages outside that category.
pub fn scan_conflicts<S: ScopeStore + ?Sized>(
    resolver: &Resolver<'_, S>,
    target: &ScopeKey,
    proposed: &ContentSnapshot,
) -> Result<ConflictScan, StorageError> {
    if !target.scope().is_broad() {
        return Ok(ConflictScan::default());
    }

    let patterns = resolver.patterns();
    let mut candidates: Vec<(ScopeKey, Placement)> = Vec::new();

    match target {
        ScopeKey::Tenant(tenant) => {
            for key in resolver.store().keys(Scope::Individual)? {
                let placement = Placement::of_key(&key, patterns);
                if placement.tenant.as_ref() == Some(tenant) {
                    candidates.push((key, placement));
                }
            }
        }
        ScopeKey::Category(category) => {
            let mut tenants = BTreeSet::new();
            for key in resolver.store().keys(Scope::Individual)? {
                let placement = Placement::of_key(&key, patterns);
                if placement.category.as_ref() == Some(category) {
                    tenants.extend(placement.tenant.clone());
                    candidates.push((key, placement));
                }
            }
            // A tenant template shadows the category for that tenant's pages
            // in it, but only tenants with a known page there are reported.
            for key in resolver.store().keys(Scope::Tenant)? {
                let mut placement = Placement::of_key(&key, patterns);
                if placement.tenant.as_ref().is_some_and(|t| tenants.contains(t)) {
                    placement.category = Some(category.clone());
                    candidates.push((key, placement));
                }
            }
        }
        _ => {
            for scope in [Scope::Individual, Scope::Tenant, Scope::Category] {
                for key in resolver.store().keys(scope)? {
                    let placement = Placement::of_key(&key, patterns);
                    candidates.push((key, placement));
                }
            }
        }
    }

    let mut scan = ConflictScan::default();
    for (key, placement) in candidates {
        let Some(entry) = resolver.store().get(&key)? else {
            continue;
        };
        let fallback = resolver.current_default(&placement, target.scope())?;
        let difference = first_difference(&entry.snapshot, &fallback.snapshot);
        if let Some(difference) = difference.filter(|_| differs(&entry.snapshot, proposed)) {
            scan.conflicts.push(Conflict {
                display_name: display_name(&key),
                tenant: placement.tenant,
                entry: key,
                difference,
            });
        } else if clears_to_target(resolver, target, &key, &placement, &fallback)? {
            scan.stale.push(key);
        }
    }

    tracing::debug!(
        scope_key = %target,
        conflicts = scan.conflicts.len(),
        stale = scan.stale.len(),
        "conflict scan complete"
    );
    Ok(scan)
}

/// Whether removing `key` lets the page fall through to the target's tier.
fn clears_to_target<S: ScopeStore + ?Sized>(
    resolver: &Resolver<'_, S>,
    target: &ScopeKey,
    key: &ScopeKey,
    placement: &Placement,
    fallback: &Resolution,
) -> Result<bool, StorageError> {
    if matches!(target, ScopeKey::Category(_)) && key.scope() == Scope::Tenant {
        return Ok(false);
    }
    match broader(key.scope()) {
        Some(scope) if scope < target.scope() => {
            let below = resolver.current_default(placement, scope)?;
            Ok(below.source == fallback.source)
        }
        _ => Ok(true),
    }
}

fn display_name(key: &ScopeKey) -> String {
    match key {
        ScopeKey::Individual(address) => address.to_string(),
        ScopeKey::Tenant(tenant) => format!("All pages of {tenant}"),
        ScopeKey::Category(category) => format!("All {category} pages"),
        ScopeKey::Global => "All pages".to_string(),
    }
}
