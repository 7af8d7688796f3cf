use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::address::{CategoryKey, PageAddress, TenantKey};

/// Precedence tier at which content can be stored. Declared most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Individual,
    Tenant,
    Category,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Individual, Scope::Tenant, Scope::Category, Scope::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Tenant => "tenant",
            Self::Category => "category",
            Self::Global => "global",
        }
    }

    /// Broad scopes can shadow narrower entries and therefore go through conflict detection.
    pub fn is_broad(&self) -> bool {
        !matches!(self, Self::Individual)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (scope, key) pair addressing exactly one slot in the scope store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScopeKey {
    Individual(PageAddress),
    Tenant(TenantKey),
    Category(CategoryKey),
    Global,
}

impl ScopeKey {
    pub fn scope(&self) -> Scope {
        match self {
            Self::Individual(_) => Scope::Individual,
            Self::Tenant(_) => Scope::Tenant,
            Self::Category(_) => Scope::Category,
            Self::Global => Scope::Global,
        }
    }

    /// Storage key within the scope. Global is a singleton and uses the empty string.
    pub fn key_str(&self) -> &str {
        match self {
            Self::Individual(address) => address.as_str(),
            Self::Tenant(tenant) => tenant.as_str(),
            Self::Category(category) => category.as_str(),
            Self::Global => "",
        }
    }

    pub fn from_parts(scope: Scope, key: &str) -> Result<Self, CoreError> {
        match scope {
            Scope::Individual => Ok(Self::Individual(PageAddress::new(key)?)),
            Scope::Tenant => Ok(Self::Tenant(TenantKey::new(key))),
            Scope::Category => Ok(Self::Category(CategoryKey::new(key))),
            Scope::Global if key.is_empty() => Ok(Self::Global),
            Scope::Global => Err(CoreError::InvalidData(format!(
                "global scope takes no key, got {key:?}"
            ))),
        }
    }

    pub fn address(&self) -> Option<&PageAddress> {
        match self {
            Self::Individual(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            other => write!(f, "{}:{}", other.scope(), other.key_str()),
        }
    }
}
