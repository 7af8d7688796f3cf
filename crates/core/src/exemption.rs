use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::address::{CategoryKey, PageAddress, TenantKey};
use crate::scope::ScopeKey;

/// Parties opted out of a broad write. An address is exempt when the address
/// itself, its tenant, or its category is listed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExemptionSet {
    #[serde(default)]
    pub addresses: BTreeSet<PageAddress>,
    #[serde(default)]
    pub tenants: BTreeSet<TenantKey>,
    #[serde(default)]
    pub categories: BTreeSet<CategoryKey>,
}

impl ExemptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.tenants.is_empty() && self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.addresses.len() + self.tenants.len() + self.categories.len()
    }

    /// Record the narrower entry so that it keeps precedence over the broad write.
    /// Returns false for keys that cannot be exempted (Global).
    pub fn insert(&mut self, key: &ScopeKey) -> bool {
        match key {
            ScopeKey::Individual(address) => self.addresses.insert(address.clone()),
            ScopeKey::Tenant(tenant) => self.tenants.insert(tenant.clone()),
            ScopeKey::Category(category) => self.categories.insert(category.clone()),
            ScopeKey::Global => false,
        }
    }

    pub fn covers(
        &self,
        address: &PageAddress,
        tenant: Option<&TenantKey>,
        category: Option<&CategoryKey>,
    ) -> bool {
        self.addresses.contains(address)
            || tenant.is_some_and(|t| self.tenants.contains(t))
            || category.is_some_and(|c| self.categories.contains(c))
    }

    /// Whether a tenant or category as a whole is exempt (used when scanning
    /// entries that are not a single address).
    pub fn covers_key(&self, key: &ScopeKey) -> bool {
        match key {
            ScopeKey::Individual(address) => self.addresses.contains(address),
            ScopeKey::Tenant(tenant) => self.tenants.contains(tenant),
            ScopeKey::Category(category) => self.categories.contains(category),
            ScopeKey::Global => false,
        }
    }
}

impl FromIterator<ScopeKey> for ExemptionSet {
    fn from_iter<I: IntoIterator<Item = ScopeKey>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(&key);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_tenant_and_category_exemptions() {
        let a = PageAddress::new("tenantA/issue/current").unwrap();
        let b = PageAddress::new("tenantB/issue/current").unwrap();
        let tenant_a = TenantKey::new("tenantA");
        let tenant_b = TenantKey::new("tenantB");
        let current = CategoryKey::new("current");

        let by_address: ExemptionSet = [ScopeKey::Individual(a.clone())].into_iter().collect();
        assert!(by_address.covers(&a, Some(&tenant_a), Some(&current)));
        assert!(!by_address.covers(&b, Some(&tenant_b), Some(&current)));

        let by_tenant: ExemptionSet = [ScopeKey::Tenant(tenant_b.clone())].into_iter().collect();
        assert!(by_tenant.covers(&b, Some(&tenant_b), None));
        assert!(!by_tenant.covers(&a, Some(&tenant_a), None));
        assert!(!by_tenant.covers(&b, None, None));

        let by_category: ExemptionSet =
            [ScopeKey::Category(current.clone())].into_iter().collect();
        assert!(by_category.covers(&a, None, Some(&current)));
    }

    #[test]
    fn global_cannot_be_exempted() {
        let mut set = ExemptionSet::new();
        assert!(!set.insert(&ScopeKey::Global));
        assert!(set.is_empty());
    }
}
