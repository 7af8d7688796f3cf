//! Shallow structural comparison of content snapshots.
//!
//! Node identities are regenerated on every copy between scopes, so they are
//! never compared. Sections are compared pairwise in order on kind, name,
//! layout, serialized style and area count. Changes below the area level are
//! deliberately not observed.

use crate::snapshot::{ContentSnapshot, Section};

/// First observed structural difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Difference {
    SectionCount { left: usize, right: usize },
    Kind { index: usize },
    Name { index: usize },
    Layout { index: usize },
    Style { index: usize },
    AreaCount { index: usize, left: usize, right: usize },
}

/// True when the snapshots are not structurally equivalent.
pub fn differs(a: &ContentSnapshot, b: &ContentSnapshot) -> bool {
    first_difference(a, b).is_some()
}

pub fn first_difference(a: &ContentSnapshot, b: &ContentSnapshot) -> Option<Difference> {
    if a.sections.len() != b.sections.len() {
        return Some(Difference::SectionCount {
            left: a.sections.len(),
            right: b.sections.len(),
        });
    }
    a.sections
        .iter()
        .zip(&b.sections)
        .enumerate()
        .find_map(|(index, (left, right))| section_difference(index, left, right))
}

fn section_difference(index: usize, left: &Section, right: &Section) -> Option<Difference> {
    if left.kind != right.kind {
        return Some(Difference::Kind { index });
    }
    if left.name != right.name {
        return Some(Difference::Name { index });
    }
    if left.layout != right.layout {
        return Some(Difference::Layout { index });
    }
    // An unserializable style cannot be shown equal; report it as a difference.
    match (left.style_bytes(), right.style_bytes()) {
        (Ok(l), Ok(r)) if l == r => {}
        _ => return Some(Difference::Style { index }),
    }
    if left.areas.len() != right.areas.len() {
        return Some(Difference::AreaCount {
            index,
            left: left.areas.len(),
            right: right.areas.len(),
        });
    }
    None
}
