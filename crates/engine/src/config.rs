use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stratum_core::AddressPatterns;
use stratum_core::address::{DEFAULT_CATEGORY_PATTERN, DEFAULT_TENANT_PATTERN};

use crate::defaults::DesignDefaults;
use crate::error::EngineError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub address: AddressConfig,
    pub storage: StorageConfig,
    pub defaults: DesignDefaults,
}

/// Pattern extraction for tenant and category keys. Each regex needs a
/// named group `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    pub tenant_pattern: String,
    pub category_pattern: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            tenant_pattern: DEFAULT_TENANT_PATTERN.to_string(),
            category_pattern: DEFAULT_CATEGORY_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. `None` keeps everything in memory.
    pub path: Option<String>,
}

impl EngineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&contents)
            .map_err(|e| EngineError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn address_patterns(&self) -> Result<AddressPatterns, EngineError> {
        Ok(AddressPatterns::new(
            &self.address.tenant_pattern,
            &self.address.category_pattern,
        )?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply `STRATUM_*` overrides read through `lookup`. Blank values are
    /// ignored; patterns that fail to compile are logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = read("STRATUM_DB_PATH") {
            self.storage.path = Some(path);
        }

        if let Some(pattern) = read("STRATUM_TENANT_PATTERN") {
            match AddressPatterns::new(&pattern, &self.address.category_pattern) {
                Ok(_) => self.address.tenant_pattern = pattern,
                Err(err) => tracing::warn!("invalid STRATUM_TENANT_PATTERN, ignoring: {err}"),
            }
        }

        if let Some(pattern) = read("STRATUM_CATEGORY_PATTERN") {
            match AddressPatterns::new(&self.address.tenant_pattern, &pattern) {
                Ok(_) => self.address.category_pattern = pattern,
                Err(err) => tracing::warn!("invalid STRATUM_CATEGORY_PATTERN, ignoring: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use stratum_core::{CategoryKey, PageAddress, TenantKey};

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn overrides_replace_path_and_patterns() -> Result<(), EngineError> {
        let mut config = EngineConfig::default();
        config.apply_overrides_from(lookup(&[
            ("STRATUM_DB_PATH", "  /var/lib/stratum.db "),
            ("STRATUM_TENANT_PATTERN", r"^(?P<key>[^.]+)\."),
        ]));
        assert_eq!(config.storage.path.as_deref(), Some("/var/lib/stratum.db"));

        let patterns = config.address_patterns()?;
        let address = PageAddress::new("acme.example/current")?;
        assert_eq!(patterns.tenant_of(&address), Some(TenantKey::new("acme")));
        assert_eq!(config.address.category_pattern, AddressConfig::default().category_pattern);
        Ok(())
    }

    #[test]
    fn blank_and_invalid_overrides_are_ignored() {
        let mut config = EngineConfig::default();
        config.storage.path = Some("kept.db".into());
        config.apply_overrides_from(lookup(&[
            ("STRATUM_DB_PATH", "   "),
            ("STRATUM_TENANT_PATTERN", "(unclosed"),
            ("STRATUM_CATEGORY_PATTERN", "^no-key-group$"),
        ]));
        assert_eq!(config.storage.path.as_deref(), Some("kept.db"));
        assert_eq!(config.address, AddressConfig::default());
    }

    #[test]
    fn empty_config_uses_defaults() -> Result<(), EngineError> {
        let config = EngineConfig::from_toml_str("")?;
        assert_eq!(config.address, AddressConfig::default());
        assert_eq!(config.storage.path, None);
        assert_eq!(config.defaults.fallback.sections.len(), 1);
        assert!(config.defaults.by_category.is_empty());
        Ok(())
    }

    #[test]
    fn parses_patterns_storage_and_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config = EngineConfig::from_toml_str(
            r#"
            [address]
            tenant_pattern = '^/(?P<key>[a-z]+)/'
            category_pattern = '/(?P<key>toc|article)/'

            [storage]
            path = "/var/lib/stratum/scopes.db"

            [[defaults.fallback.sections]]
            kind = "hero"
            name = "Masthead"
            layout = "full"

            [[defaults.fallback.sections]]
            kind = "toc"
            name = "Contents"

            [[defaults.by_category.toc.sections]]
            kind = "toc"
            name = "Issue contents"
            "#,
        )?;

        assert_eq!(config.storage.path.as_deref(), Some("/var/lib/stratum/scopes.db"));
        assert_eq!(config.defaults.fallback.sections.len(), 2);
        assert_eq!(config.defaults.fallback.sections[0].layout, "full");
        let toc = config
            .defaults
            .by_category
            .get(&CategoryKey::new("toc"))
            .ok_or("missing toc default")?;
        assert_eq!(toc.sections[0].name, "Issue contents");

        let patterns = config.address_patterns()?;
        let address = PageAddress::new("/acme/toc/12")?;
        assert_eq!(patterns.tenant_of(&address), Some(TenantKey::new("acme")));
        assert_eq!(patterns.category_of(&address), Some(CategoryKey::new("toc")));
        Ok(())
    }

    #[test]
    fn bad_pattern_is_a_core_error() -> Result<(), EngineError> {
        let config = EngineConfig::from_toml_str("[address]\ntenant_pattern = '^(['\n")?;
        assert!(matches!(config.address_patterns(), Err(EngineError::Core(_))));
        Ok(())
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("[address"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stratum.toml");
        std::fs::write(&path, "[storage]\npath = \"scopes.db\"\n")?;
        let config = EngineConfig::load(&path)?;
        assert!(config.storage.path.is_some());
        Ok(())
    }
}
