//! Key-path addressing over [`Tree`] documents.

use crate::tree::{parse_index, Tree};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when writing through a key path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("Path is empty")]
    EmptyPath,

    #[error("Path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Writing would replace an existing leaf with an object.
    #[error("Value at '{path}' is a leaf and cannot hold nested keys")]
    LeafInTheWay { path: KeyPath },

    #[error("'{key}' is not an array index (at '{path}')")]
    NotAnIndex { path: KeyPath, key: String },

    #[error("Index {index} is out of range at '{path}'")]
    IndexOutOfRange { path: KeyPath, index: usize },

    #[error("Path '{0}' does not exist in the base document")]
    UnknownPath(KeyPath),
}

/// Ordered sequence of keys from the document root.
///
/// Displays as its keys joined by `.`; deserializes from either a string
/// array (`["header","title"]`) or that dotted form (`"header.title"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn prefix(&self, len: usize) -> KeyPath {
        KeyPath(self.0[..len].to_vec())
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(keys: Vec<String>) -> Self {
        Self(keys)
    }
}

impl From<&[&str]> for KeyPath {
    fn from(keys: &[&str]) -> Self {
        Self(keys.iter().map(|k| k.to_string()).collect())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(KeyPath::default());
        }
        let keys: Vec<String> = s.split('.').map(str::to_string).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        Ok(KeyPath(keys))
    }
}

impl<'de> Deserialize<'de> for KeyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Keys(Vec<String>),
            Dotted(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Keys(keys) => Ok(KeyPath(keys)),
            Repr::Dotted(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Walk `path` from the root. Returns `None` as soon as a key is missing or a
/// leaf is reached before the path ends.
pub fn get_value_at_path<'a>(tree: &'a Tree, path: &KeyPath) -> Option<&'a Tree> {
    path.keys()
        .iter()
        .try_fold(tree, |node, key| node.child(key))
}

/// Remove the entry named by the last segment of `path`.
///
/// Returns `false` without touching the tree when the path is empty or any
/// segment is missing. Object removal keeps the order of the remaining keys;
/// array removal shifts later elements down.
pub fn delete_at_path(tree: &mut Tree, path: &KeyPath) -> bool {
    let Some((last, parents)) = path.keys().split_last() else {
        return false;
    };

    let mut current = tree;
    for key in parents {
        match current.child_mut(key) {
            Some(next) => current = next,
            None => return false,
        }
    }

    match current {
        Tree::Object(map) => map.shift_remove(last).is_some(),
        Tree::Array(items) => match parse_index(last) {
            Some(i) if i < items.len() => {
                items.remove(i);
                true
            }
            _ => false,
        },
        Tree::Leaf(_) => false,
    }
}

/// Assign `value` at `path`, creating empty objects for missing intermediate
/// keys.
///
/// An existing leaf is never turned into an object: if a prefix of `path`
/// already holds a leaf the call fails with [`PathError::LeafInTheWay`] and
/// the tree is left unchanged. Array intermediates must already exist; at the
/// final segment an index equal to the length appends.
pub fn set_value_at_path(tree: &mut Tree, path: &KeyPath, value: Tree) -> Result<(), PathError> {
    let (last, parents) = path.keys().split_last().ok_or(PathError::EmptyPath)?;

    let mut current = tree;
    for (depth, key) in parents.iter().enumerate() {
        current = match current {
            Tree::Object(map) => map.entry(key.clone()).or_insert_with(Tree::empty_object),
            Tree::Array(items) => {
                let index = parse_index(key).ok_or_else(|| PathError::NotAnIndex {
                    path: path.prefix(depth),
                    key: key.clone(),
                })?;
                items.get_mut(index).ok_or_else(|| PathError::IndexOutOfRange {
                    path: path.prefix(depth),
                    index,
                })?
            }
            Tree::Leaf(_) => {
                return Err(PathError::LeafInTheWay {
                    path: path.prefix(depth),
                })
            }
        };
    }

    match current {
        Tree::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Tree::Array(items) => {
            let index = parse_index(last).ok_or_else(|| PathError::NotAnIndex {
                path: path.prefix(parents.len()),
                key: last.clone(),
            })?;
            if index < items.len() {
                items[index] = value;
            } else if index == items.len() {
                items.push(value);
            } else {
                return Err(PathError::IndexOutOfRange {
                    path: path.prefix(parents.len()),
                    index,
                });
            }
            Ok(())
        }
        Tree::Leaf(_) => Err(PathError::LeafInTheWay {
            path: path.prefix(parents.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> Tree {
        Tree::from(value)
    }

    fn path(s: &str) -> KeyPath {
        s.parse().expect("valid path")
    }

    // ==================== KeyPath ====================

    #[test]
    fn test_keypath_display_and_parse() {
        let p = path("header.title");
        assert_eq!(p.keys(), &["header".to_string(), "title".to_string()]);
        assert_eq!(p.to_string(), "header.title");
        assert!(path("").is_empty());
    }

    #[test]
    fn test_keypath_rejects_empty_segments() {
        assert!(matches!(
            "a..b".parse::<KeyPath>(),
            Err(PathError::EmptySegment(_))
        ));
        assert!(".a".parse::<KeyPath>().is_err());
    }

    #[test]
    fn test_keypath_equality_is_by_keys() {
        assert_eq!(path("a.b"), KeyPath::from(&["a", "b"][..]));
        assert_ne!(path("a.b"), path("b.a"));
    }

    #[test]
    fn test_keypath_deserialize_array_or_dotted() {
        let from_array: KeyPath = serde_json::from_value(json!(["a", "b.c"])).unwrap();
        assert_eq!(from_array.len(), 2);
        assert_eq!(from_array.keys()[1], "b.c");

        let from_string: KeyPath = serde_json::from_value(json!("a.b")).unwrap();
        assert_eq!(from_string, path("a.b"));

        assert!(serde_json::from_value::<KeyPath>(json!("a..b")).is_err());
    }

    #[test]
    fn test_keypath_serializes_as_array() {
        assert_eq!(serde_json::to_value(path("a.b")).unwrap(), json!(["a", "b"]));
    }

    // ==================== get_value_at_path ====================

    #[test]
    fn test_get_value_at_path() {
        let doc = tree(json!({"header": {"title": "Hi", "links": ["Home", "About"]}}));
        assert_eq!(get_value_at_path(&doc, &path("header.title")), Some(&Tree::leaf("Hi")));
        assert_eq!(
            get_value_at_path(&doc, &path("header.links.1")),
            Some(&Tree::leaf("About"))
        );
        assert_eq!(get_value_at_path(&doc, &path("")), Some(&doc));
    }

    #[test]
    fn test_get_value_at_missing_path() {
        let doc = tree(json!({"header": {"title": "Hi"}}));
        assert!(get_value_at_path(&doc, &path("footer.title")).is_none());
        assert!(get_value_at_path(&doc, &path("header.title.deeper")).is_none());
        assert!(get_value_at_path(&doc, &path("header.missing")).is_none());
    }

    // ==================== delete_at_path ====================

    #[test]
    fn test_delete_at_path_removes_key() {
        let mut doc = tree(json!({"a": {"b": 1, "c": 2, "d": 3}}));
        assert!(delete_at_path(&mut doc, &path("a.c")));
        assert_eq!(
            serde_json::to_string(&doc).unwrap(),
            r#"{"a":{"b":1,"d":3}}"#
        );
    }

    #[test]
    fn test_delete_at_path_noop_cases() {
        let original = tree(json!({"a": {"b": 1}}));
        let mut doc = original.clone();
        assert!(!delete_at_path(&mut doc, &path("")));
        assert!(!delete_at_path(&mut doc, &path("x.b")));
        assert!(!delete_at_path(&mut doc, &path("a.x")));
        assert!(!delete_at_path(&mut doc, &path("a.b.c")));
        assert_eq!(doc, original);
    }

    #[test]
    fn test_delete_at_path_in_array() {
        let mut doc = tree(json!({"list": ["a", "b", "c"]}));
        assert!(delete_at_path(&mut doc, &path("list.1")));
        assert_eq!(doc, tree(json!({"list": ["a", "c"]})));
        assert!(!delete_at_path(&mut doc, &path("list.5")));
    }

    #[test]
    fn test_delete_whole_subtree() {
        let mut doc = tree(json!({"a": {"b": {"c": 1}}, "z": 2}));
        assert!(delete_at_path(&mut doc, &path("a")));
        assert_eq!(doc, tree(json!({"z": 2})));
    }

    // ==================== set_value_at_path ====================

    #[test]
    fn test_set_value_creates_intermediates() {
        let mut doc = Tree::empty_object();
        set_value_at_path(&mut doc, &path("a.b.c"), Tree::leaf("x")).unwrap();
        assert_eq!(doc, tree(json!({"a": {"b": {"c": "x"}}})));
    }

    #[test]
    fn test_set_value_overwrites_leaf_at_final_segment() {
        let mut doc = tree(json!({"a": {"b": "old"}}));
        set_value_at_path(&mut doc, &path("a.b"), Tree::leaf("new")).unwrap();
        assert_eq!(doc, tree(json!({"a": {"b": "new"}})));
    }

    #[test]
    fn test_set_value_refuses_to_nest_under_leaf() {
        let original = tree(json!({"a": "leaf"}));
        let mut doc = original.clone();
        let err = set_value_at_path(&mut doc, &path("a.b"), Tree::leaf("x")).unwrap_err();
        assert_eq!(err, PathError::LeafInTheWay { path: path("a") });
        assert_eq!(doc, original);
    }

    #[test]
    fn test_set_value_failure_leaves_no_partial_objects() {
        let original = tree(json!({"list": ["a"]}));
        let mut doc = original.clone();
        let err = set_value_at_path(&mut doc, &path("list.4.x"), Tree::leaf("y")).unwrap_err();
        assert!(matches!(err, PathError::IndexOutOfRange { index: 4, .. }));
        assert_eq!(doc, original);
    }

    #[test]
    fn test_set_value_in_array() {
        let mut doc = tree(json!({"list": ["a", "b"]}));
        set_value_at_path(&mut doc, &path("list.0"), Tree::leaf("A")).unwrap();
        set_value_at_path(&mut doc, &path("list.2"), Tree::leaf("C")).unwrap();
        assert_eq!(doc, tree(json!({"list": ["A", "b", "C"]})));

        let err = set_value_at_path(&mut doc, &path("list.9"), Tree::leaf("Z")).unwrap_err();
        assert!(matches!(err, PathError::IndexOutOfRange { index: 9, .. }));

        let err = set_value_at_path(&mut doc, &path("list.x"), Tree::leaf("Z")).unwrap_err();
        assert!(matches!(err, PathError::NotAnIndex { .. }));
    }

    #[test]
    fn test_set_value_empty_path() {
        let mut doc = Tree::empty_object();
        assert_eq!(
            set_value_at_path(&mut doc, &path(""), Tree::leaf("x")),
            Err(PathError::EmptyPath)
        );
    }

    #[test]
    fn test_set_then_get_roundtrip_path() {
        let mut doc = tree(json!({"nav": {}}));
        set_value_at_path(&mut doc, &path("nav.home"), Tree::leaf("Start")).unwrap();
        assert_eq!(get_value_at_path(&doc, &path("nav.home")), Some(&Tree::leaf("Start")));
    }
}
