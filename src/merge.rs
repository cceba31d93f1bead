//! Base/translation reconciliation.
//!
//! The base document is the schema: the merged output has exactly the base's
//! shape, with translated leaves substituted wherever the translation has one.

use crate::tree::Tree;

/// Build a full translation document shaped like `base`.
///
/// * A base leaf takes the translation's leaf at the same path if it is
///   defined (present and not `null`), otherwise the base value.
/// * A base container is rebuilt key by key in base order. Keys that only
///   exist in the translation are dropped.
///
/// A translation container sitting where the base has a leaf is ignored, so
/// the result never changes shape.
pub fn merge(base: &Tree, translation: Option<&Tree>) -> Tree {
    match base {
        Tree::Leaf(_) => match translation {
            Some(Tree::Leaf(value)) if !value.is_null() => Tree::Leaf(value.clone()),
            _ => base.clone(),
        },
        Tree::Object(entries) => Tree::Object(
            entries
                .iter()
                .map(|(key, child)| {
                    let translated = translation.and_then(|t| t.child(key));
                    (key.clone(), merge(child, translated))
                })
                .collect(),
        ),
        Tree::Array(items) => Tree::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let translated = translation.and_then(|t| t.child(&i.to_string()));
                    merge(child, translated)
                })
                .collect(),
        ),
    }
}

/// True when `a` and `b` have the same keys and container kinds at every level.
pub fn same_shape(a: &Tree, b: &Tree) -> bool {
    match (a, b) {
        (Tree::Leaf(_), Tree::Leaf(_)) => true,
        (Tree::Object(x), Tree::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && same_shape(va, vb))
        }
        (Tree::Array(x), Tree::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(va, vb)| same_shape(va, vb))
        }
        _ => false,
    }
}
