//! Tagged JSON tree used for base and translation documents.
//!
//! Documents arrive as JSON text and are decoded once into [`Tree`], so the
//! reconciliation code can match on leaf/object/array instead of probing
//! untyped values at runtime. Object keys keep their insertion order.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::path::Path;

/// A terminal JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to read a scalar out of a JSON value. Containers are rejected.
    pub fn from_value(value: Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(b)),
            Value::Number(n) => Some(Scalar::Number(n)),
            Value::String(s) => Some(Scalar::String(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Number(n) => Value::Number(n),
            Scalar::String(s) => Value::String(s),
        }
    }
}

/// A JSON document as a tagged tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Tree {
    Leaf(Scalar),
    Object(IndexMap<String, Tree>),
    Array(Vec<Tree>),
}

impl Default for Tree {
    fn default() -> Self {
        Tree::empty_object()
    }
}

impl Tree {
    pub fn empty_object() -> Self {
        Tree::Object(IndexMap::new())
    }

    pub fn leaf(value: impl Into<Scalar>) -> Self {
        Tree::Leaf(value.into())
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Tree::Leaf(_))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Tree::Leaf(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a direct child by key.
    ///
    /// Arrays are addressed by their canonical decimal index (`"0"`, `"12"`),
    /// so the same key sequence works whichever container kind it meets.
    pub fn child(&self, key: &str) -> Option<&Tree> {
        match self {
            Tree::Object(map) => map.get(key),
            Tree::Array(items) => parse_index(key).and_then(|i| items.get(i)),
            Tree::Leaf(_) => None,
        }
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut Tree> {
        match self {
            Tree::Object(map) => map.get_mut(key),
            Tree::Array(items) => parse_index(key).and_then(move |i| items.get_mut(i)),
            Tree::Leaf(_) => None,
        }
    }

    /// Collect every leaf with its key path, in document order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &Scalar)> {
        let mut out = Vec::new();
        collect_leaves(self, &mut Vec::new(), &mut out);
        out
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Tree> {
        serde_json::from_str(text)
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }

    pub fn to_pretty_string(&self) -> String {
        // Value serialization cannot fail: keys are always strings.
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }
}

/// Compact JSON text.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn collect_leaves<'a>(
    node: &'a Tree,
    prefix: &mut Vec<String>,
    out: &mut Vec<(Vec<String>, &'a Scalar)>,
) {
    match node {
        Tree::Leaf(scalar) => out.push((prefix.clone(), scalar)),
        Tree::Object(map) => {
            for (key, child) in map {
                prefix.push(key.clone());
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
        Tree::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                prefix.push(i.to_string());
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
    }
}

/// Parse an array index key. Only canonical forms are accepted: no sign,
/// no leading zeros.
pub(crate) fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

impl From<Value> for Tree {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Tree::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Tree::from(v)))
                    .collect(),
            ),
            Value::Array(items) => Tree::Array(items.into_iter().map(Tree::from).collect()),
            Value::Null => Tree::Leaf(Scalar::Null),
            Value::Bool(b) => Tree::Leaf(Scalar::Bool(b)),
            Value::Number(n) => Tree::Leaf(Scalar::Number(n)),
            Value::String(s) => Tree::Leaf(Scalar::String(s)),
        }
    }
}

impl From<Tree> for Value {
    fn from(tree: Tree) -> Self {
        match tree {
            Tree::Leaf(scalar) => Value::from(scalar),
            Tree::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            Tree::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

/// Read a JSON document from disk.
pub fn read_document(path: &Path) -> Result<Tree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Tree::from_json_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_decode_keeps_object_order() {
        let tree = Tree::from_json_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        match &tree {
            Tree::Object(map) => {
                let keys: Vec<_> = map.keys().cloned().collect();
                assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(
            serde_json::to_string(&tree).unwrap(),
            r#"{"zeta":1,"alpha":2,"mid":3}"#
        );
    }

    #[test]
    fn test_value_conversion_preserves_content() {
        let value = json!({"a": [1, "two", null, true], "b": {"c": 1.5}});
        let tree = Tree::from(value.clone());
        assert_eq!(tree.to_value(), value);
    }

    #[test]
    fn test_child_lookup_on_object_and_array() {
        let tree = Tree::from(json!({"items": ["x", "y"]}));
        let items = tree.child("items").unwrap();
        assert_eq!(items.child("1"), Some(&Tree::leaf("y")));
        assert_eq!(items.child("2"), None);
        assert_eq!(items.child("01"), None);
        assert_eq!(items.child("+1"), None);
        assert_eq!(tree.child("missing"), None);
        assert_eq!(Tree::leaf("x").child("anything"), None);
    }

    #[test]
    fn test_leaves_in_document_order() {
        let tree = Tree::from(json!({"a": {"b": "B", "c": ["C0", "C1"]}, "d": 4}));
        let paths: Vec<String> = tree
            .leaves()
            .into_iter()
            .map(|(path, _)| path.join("."))
            .collect();
        assert_eq!(paths, vec!["a.b", "a.c.0", "a.c.1", "d"]);
    }

    #[test]
    fn test_empty_containers_have_no_leaves() {
        let tree = Tree::from(json!({"a": {}, "b": []}));
        assert!(tree.leaves().is_empty());
    }

    #[test]
    fn test_scalar_from_value_rejects_containers() {
        assert_eq!(Scalar::from_value(json!("hi")), Some(Scalar::from("hi")));
        assert_eq!(Scalar::from_value(json!(null)), Some(Scalar::Null));
        assert!(Scalar::from_value(json!({})).is_none());
        assert!(Scalar::from_value(json!([])).is_none());
    }

    #[test]
    fn test_read_document_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("en.json");
        std::fs::write(&path, r#"{"header": {"title": "Hello"}}"#).unwrap();

        let tree = read_document(&path).expect("Should read document");
        assert_eq!(tree, Tree::from(json!({"header": {"title": "Hello"}})));
    }

    #[test]
    fn test_read_document_invalid_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_document(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON"));
    }

    #[test]
    fn test_display_is_compact_json_in_order() {
        let tree = Tree::from_json_str(r#"{ "b": [1, null], "a": "x" }"#).unwrap();
        assert_eq!(tree.to_string(), r#"{"b":[1,null],"a":"x"}"#);
        assert_eq!(Tree::from_json_str(&tree.to_string()).unwrap(), tree);
    }

    #[test]
    fn test_read_document_missing_file() {
        let result = read_document(Path::new("/non/existent/base.json"));
        assert!(result.is_err());
    }
}
