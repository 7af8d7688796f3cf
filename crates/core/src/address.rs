use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DEFAULT_TENANT_PATTERN: &str = r"^(?P<key>[^/]+)/";
pub const DEFAULT_CATEGORY_PATTERN: &str = r"^[^/]+/(?:[^/]+/)*(?P<key>current|archive)(?:/|$)";

const KEY_GROUP: &str = "key";

macro_rules! string_key {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_key!(TenantKey);
string_key!(CategoryKey);

/// Opaque identifier of one renderable page.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageAddress(String);

impl PageAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(CoreError::InvalidAddress(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PageAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PageAddress> for String {
    fn from(value: PageAddress) -> Self {
        value.0
    }
}

impl fmt::Debug for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageAddress({:?})", self.0)
    }
}

impl fmt::Display for PageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts tenant and category keys from page addresses.
///
/// Both patterns must define a named capture group `key`. An address that a
/// pattern does not match simply has no key at that tier.
#[derive(Debug, Clone)]
pub struct AddressPatterns {
    tenant: Regex,
    category: Regex,
}

impl AddressPatterns {
    pub fn new(tenant_pattern: &str, category_pattern: &str) -> Result<Self, CoreError> {
        Ok(Self {
            tenant: compile(tenant_pattern)?,
            category: compile(category_pattern)?,
        })
    }

    pub fn tenant_of(&self, address: &PageAddress) -> Option<TenantKey> {
        capture_key(&self.tenant, address).map(TenantKey::new)
    }

    pub fn category_of(&self, address: &PageAddress) -> Option<CategoryKey> {
        capture_key(&self.category, address).map(CategoryKey::new)
    }

    /// Both keys at once, in tier order.
    pub fn keys_of(&self, address: &PageAddress) -> (Option<TenantKey>, Option<CategoryKey>) {
        (self.tenant_of(address), self.category_of(address))
    }
}

impl Default for AddressPatterns {
    fn default() -> Self {
        Self {
            tenant: Regex::new(DEFAULT_TENANT_PATTERN).expect("default tenant pattern compiles"),
            category: Regex::new(DEFAULT_CATEGORY_PATTERN)
                .expect("default category pattern compiles"),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, CoreError> {
    let regex = Regex::new(pattern).map_err(|e| CoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    if !regex.capture_names().any(|name| name == Some(KEY_GROUP)) {
        return Err(CoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: format!("missing named group `{KEY_GROUP}`"),
        });
    }
    Ok(regex)
}

fn capture_key(regex: &Regex, address: &PageAddress) -> Option<String> {
    regex
        .captures(address.as_str())
        .and_then(|caps| caps.name(KEY_GROUP))
        .map(|m| m.as_str().to_string())
        .filter(|key| !key.is_empty())
}
