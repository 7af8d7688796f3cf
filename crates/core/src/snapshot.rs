use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::ids::{AreaId, ItemId, SectionId};
use crate::prop_value::PropValue;

/// One version of a page's content: an ordered tree of sections, areas and items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub id: SectionId,
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub style: BTreeMap<String, PropValue>,
    #[serde(default)]
    pub areas: Vec<Area>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Area {
    #[serde(default)]
    pub id: AreaId,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// A widget placed in an area. Opaque to resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: ItemId,
    pub widget: String,
    #[serde(default)]
    pub props: BTreeMap<String, PropValue>,
}

impl ContentSnapshot {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Assign a fresh identity to every node, leaving structure untouched.
    pub fn regenerate_ids(&mut self) {
        for section in &mut self.sections {
            section.id = SectionId::new();
            for area in &mut section.areas {
                area.id = AreaId::new();
                for item in &mut area.items {
                    item.id = ItemId::new();
                }
            }
        }
    }

    /// Copy used when content moves between scopes: same structure, new identities.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.regenerate_ids();
        copy
    }

    pub fn item_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.areas)
            .map(|a| a.items.len())
            .sum()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// BLAKE3 digest of the serialized snapshot, identities included.
    pub fn content_digest(&self) -> Result<[u8; 32], CoreError> {
        Ok(*blake3::hash(&self.to_msgpack()?).as_bytes())
    }
}

impl Section {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            kind: kind.into(),
            name: name.into(),
            layout: String::new(),
            style: BTreeMap::new(),
            areas: Vec::new(),
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    pub fn with_style(mut self, key: impl Into<String>, value: PropValue) -> Self {
        self.style.insert(key.into(), value);
        self
    }

    pub fn with_area(mut self, area: Area) -> Self {
        self.areas.push(area);
        self
    }

    /// Serialized form of the style descriptor, the unit the differ compares.
    pub fn style_bytes(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(&self.style).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

impl Area {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }
}

impl Item {
    pub fn new(widget: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            widget: widget.into(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: PropValue) -> Self {
        self.props.insert(key.into(), value);
        self
    }
}
