//! Hierarchy resolution: which snapshot is authoritative for a page.
//!
//! Tiers are walked most specific first (individual, tenant, category,
//! global) and the first slot that applies wins; the design default closes
//! the walk. An open edit session pre-empts the stored value of the slot it
//! edits, and a global draft pre-empts every stored tier, for every address
//! not in the session's exemption set.

use stratum_core::{
    AddressPatterns, CategoryKey, ContentSnapshot, ExemptionSet, PageAddress, Scope, ScopeKey,
    TenantKey,
};
use stratum_storage::{ScopeStore, StorageError};

use crate::defaults::DesignDefaults;
use crate::editing::{EditSession, EditingScopeContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// Unsaved draft of the open edit session.
    Draft(ScopeKey),
    Stored(ScopeKey),
    /// Pre-write value kept on a broad entry for parties exempted from that write.
    Superseded(ScopeKey),
    DesignDefault,
}

impl ResolvedFrom {
    pub fn scope_key(&self) -> Option<&ScopeKey> {
        match self {
            Self::Draft(key) | Self::Stored(key) | Self::Superseded(key) => Some(key),
            Self::DesignDefault => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub snapshot: ContentSnapshot,
    pub source: ResolvedFrom,
}

/// Position of a resolution target in the hierarchy. Pages know all their
/// keys; tenant and category slots only know their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub address: Option<PageAddress>,
    pub tenant: Option<TenantKey>,
    pub category: Option<CategoryKey>,
}

impl Placement {
    pub fn page(address: PageAddress, patterns: &AddressPatterns) -> Self {
        let (tenant, category) = patterns.keys_of(&address);
        Self {
            address: Some(address),
            tenant,
            category,
        }
    }

    /// Placement of a stored slot, as seen by the tiers broader than it.
    pub fn of_key(key: &ScopeKey, patterns: &AddressPatterns) -> Self {
        match key {
            ScopeKey::Individual(address) => Self::page(address.clone(), patterns),
            ScopeKey::Tenant(tenant) => Self {
                tenant: Some(tenant.clone()),
                ..Self::default()
            },
            ScopeKey::Category(category) => Self {
                category: Some(category.clone()),
                ..Self::default()
            },
            ScopeKey::Global => Self::default(),
        }
    }

    pub fn key_at(&self, scope: Scope) -> Option<ScopeKey> {
        match scope {
            Scope::Individual => self.address.clone().map(ScopeKey::Individual),
            Scope::Tenant => self.tenant.clone().map(ScopeKey::Tenant),
            Scope::Category => self.category.clone().map(ScopeKey::Category),
            Scope::Global => Some(ScopeKey::Global),
        }
    }

    pub fn is_exempt(&self, exemptions: &ExemptionSet) -> bool {
        match &self.address {
            Some(address) => {
                exemptions.covers(address, self.tenant.as_ref(), self.category.as_ref())
            }
            None => {
                self.tenant.as_ref().is_some_and(|t| exemptions.tenants.contains(t))
                    || self
                        .category
                        .as_ref()
                        .is_some_and(|c| exemptions.categories.contains(c))
            }
        }
    }
}

pub struct Resolver<'a, S: ?Sized> {
    store: &'a S,
    patterns: &'a AddressPatterns,
    defaults: &'a DesignDefaults,
}

impl<'a, S: ScopeStore + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S, patterns: &'a AddressPatterns, defaults: &'a DesignDefaults) -> Self {
        Self {
            store,
            patterns,
            defaults,
        }
    }

    pub fn patterns(&self) -> &AddressPatterns {
        self.patterns
    }

    pub fn store(&self) -> &S {
        self.store
    }

    /// Placement of a page, warning when a tier key cannot be derived.
    pub fn locate(&self, address: &PageAddress) -> Placement {
        let placement = Placement::page(address.clone(), self.patterns);
        if placement.tenant.is_none() || placement.category.is_none() {
            tracing::warn!(
                address = %address,
                tenant = placement.tenant.is_some(),
                category = placement.category.is_some(),
                "address unresolvable at some tiers, skipping them"
            );
        }
        placement
    }

    /// Effective snapshot for a page under the given editing context.
    pub fn resolve(
        &self,
        address: &PageAddress,
        editing: &EditingScopeContext,
    ) -> Result<Resolution, StorageError> {
        let placement = self.locate(address);
        let resolution = self.walk(&placement, editing.session(), Scope::Individual)?;
        tracing::debug!(address = %address, source = ?resolution.source, "resolved");
        Ok(resolution)
    }

    /// What the placement shows from `from` and broader tiers only, ignoring
    /// any edit session. This is the value a slot narrower than `from` would
    /// fall back to if it were removed.
    pub fn current_default(
        &self,
        placement: &Placement,
        from: Scope,
    ) -> Result<Resolution, StorageError> {
        self.walk(placement, None, from)
    }

    /// Seed for a new edit of `target`: the value of the next broader tier.
    pub fn seed_for(&self, target: &ScopeKey) -> Result<Resolution, StorageError> {
        let placement = Placement::of_key(target, self.patterns);
        match broader(target.scope()) {
            Some(scope) => self.current_default(&placement, scope),
            None => Ok(self.design_default(&placement)),
        }
    }

    fn walk(
        &self,
        placement: &Placement,
        session: Option<&EditSession>,
        from: Scope,
    ) -> Result<Resolution, StorageError> {
        if let Some(session) = session
            && session.target == ScopeKey::Global
            && !placement.is_exempt(&session.exemptions)
        {
            return Ok(Resolution {
                snapshot: session.draft.clone(),
                source: ResolvedFrom::Draft(ScopeKey::Global),
            });
        }

        for scope in Scope::ALL.into_iter().filter(|scope| *scope >= from) {
            let Some(key) = placement.key_at(scope) else {
                continue;
            };

            if let Some(session) = session
                && session.target == key
                && !placement.is_exempt(&session.exemptions)
            {
                return Ok(Resolution {
                    snapshot: session.draft.clone(),
                    source: ResolvedFrom::Draft(key),
                });
            }

            if let Some(entry) = self.store.get(&key)? {
                if !placement.is_exempt(&entry.exemptions) {
                    return Ok(Resolution {
                        snapshot: entry.snapshot,
                        source: ResolvedFrom::Stored(key),
                    });
                }
                if let Some(previous) = entry.superseded {
                    return Ok(Resolution {
                        snapshot: previous,
                        source: ResolvedFrom::Superseded(key),
                    });
                }
            }
        }

        Ok(self.design_default(placement))
    }

    fn design_default(&self, placement: &Placement) -> Resolution {
        Resolution {
            snapshot: self
                .defaults
                .for_category(placement.category.as_ref())
                .clone(),
            source: ResolvedFrom::DesignDefault,
        }
    }
}

/// Next less specific tier.
pub fn broader(scope: Scope) -> Option<Scope> {
    match scope {
        Scope::Individual => Some(Scope::Tenant),
        Scope::Tenant => Some(Scope::Category),
        Scope::Category => Some(Scope::Global),
        Scope::Global => None,
    }
}
