//! Translation completeness accounting.

use crate::tree::{Scalar, Tree};
use serde::Serialize;

/// Count terminal leaf positions in `base`. Containers are not counted.
pub fn count_leaves(base: &Tree) -> usize {
    match base {
        Tree::Leaf(_) => 1,
        Tree::Object(map) => map.values().map(count_leaves).sum(),
        Tree::Array(items) => items.iter().map(count_leaves).sum(),
    }
}

/// Count base leaves that carry a real translation.
///
/// A leaf counts when the translation has a non-null, non-empty value at the
/// same path that also differs from the base value. A translation identical
/// to the source text is treated as untranslated, which also catches strings
/// that are legitimately the same in both languages (brand names, "OK").
pub fn count_translated(base: &Tree, translation: Option<&Tree>) -> usize {
    match base {
        Tree::Leaf(source) => match translation {
            Some(Tree::Leaf(value)) if is_translated(source, value) => 1,
            _ => 0,
        },
        Tree::Object(map) => map
            .iter()
            .map(|(key, child)| count_translated(child, translation.and_then(|t| t.child(key))))
            .sum(),
        Tree::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| {
                count_translated(child, translation.and_then(|t| t.child(&i.to_string())))
            })
            .sum(),
    }
}

/// Whether `value` is a real translation of `source`.
pub fn is_translated(source: &Scalar, value: &Scalar) -> bool {
    match value {
        Scalar::Null => false,
        Scalar::String(s) if s.is_empty() => false,
        _ => value != source,
    }
}

/// Completeness of one translation against its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub total: usize,
    pub translated: usize,
    pub percent: u32,
}

impl Completeness {
    pub fn measure(base: &Tree, translation: Option<&Tree>) -> Self {
        let total = count_leaves(base);
        let translated = count_translated(base, translation);
        Self {
            total,
            translated,
            percent: percent(translated, total),
        }
    }
}

/// `round(100 * translated / total)`, with an empty base reported as 0%.
pub fn percent(translated: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * translated as f64 / total as f64).round() as u32
}
