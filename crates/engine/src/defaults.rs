use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stratum_core::{CategoryKey, ContentSnapshot, Section};

/// Static design defaults: what an address shows when no scope stores anything for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignDefaults {
    pub fallback: ContentSnapshot,
    pub by_category: BTreeMap<CategoryKey, ContentSnapshot>,
}

impl Default for DesignDefaults {
    fn default() -> Self {
        Self {
            fallback: ContentSnapshot::new(vec![Section::new("content", "Content")]),
            by_category: BTreeMap::new(),
        }
    }
}

impl DesignDefaults {
    pub fn new(fallback: ContentSnapshot) -> Self {
        Self {
            fallback,
            by_category: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: CategoryKey, snapshot: ContentSnapshot) -> Self {
        self.by_category.insert(category, snapshot);
        self
    }

    pub fn for_category(&self, category: Option<&CategoryKey>) -> &ContentSnapshot {
        category
            .and_then(|c| self.by_category.get(c))
            .unwrap_or(&self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_default_overrides_fallback() {
        let archive = ContentSnapshot::new(vec![Section::new("list", "Archive")]);
        let defaults =
            DesignDefaults::default().with_category(CategoryKey::new("archive"), archive.clone());

        assert_eq!(defaults.for_category(Some(&CategoryKey::new("archive"))), &archive);
        assert_eq!(
            defaults.for_category(Some(&CategoryKey::new("current"))),
            &defaults.fallback
        );
        assert_eq!(defaults.for_category(None), &defaults.fallback);
    }
}
