pub mod address;
pub mod differ;
pub mod error;
pub mod exemption;
pub mod ids;
pub mod prop_value;
pub mod scope;
pub mod snapshot;

pub use address::{AddressPatterns, CategoryKey, PageAddress, TenantKey};
pub use differ::{Difference, differs, first_difference};
pub use error::CoreError;
pub use exemption::ExemptionSet;
pub use ids::*;
pub use prop_value::PropValue;
pub use scope::{Scope, ScopeKey};
pub use snapshot::{Area, ContentSnapshot, Item, Section};
