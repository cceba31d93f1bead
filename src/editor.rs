//! Editing state for one (project, language) translation.
//!
//! The session keeps the reconciled translation document and two transient
//! per-path annotations: a "saved" marker that stays lit for
//! [`SAVED_HIGHLIGHT_SECS`] after an edit, and a pending AI suggestion.
//! Markers never reach the store.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::completeness::is_translated;
use crate::i18n::Language;
use crate::merge::merge;
use crate::path::{get_value_at_path, set_value_at_path, KeyPath, PathError};
use crate::tree::{Scalar, Tree};

/// How long a path stays marked as saved after an edit.
pub const SAVED_HIGHLIGHT_SECS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldStatus {
    Untranslated,
    Saved,
    Suggested,
    Translated,
}

/// One editable leaf as presented to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorField {
    /// Dotted addressing key (`header.title`)
    pub key: String,
    pub path: KeyPath,
    pub base_value: Value,
    pub value: Value,
    pub status: FieldStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EditorSession {
    language: Language,
    base: Tree,
    // Always the merge of `base` with the last loaded or edited document
    translation: Tree,
    saved: HashMap<KeyPath, DateTime<Utc>>,
    suggestions: HashMap<KeyPath, String>,
}

impl EditorSession {
    pub fn new(language: Language, base: Tree, translation: Option<&Tree>) -> Self {
        let translation = merge(&base, translation);
        Self {
            language,
            base,
            translation,
            saved: HashMap::new(),
            suggestions: HashMap::new(),
        }
    }

    /// Set one leaf and return the full document to persist.
    ///
    /// `path` must name a leaf of the base document. The path is marked as
    /// saved until `now + SAVED_HIGHLIGHT_SECS` and any pending suggestion for
    /// it is dropped.
    pub fn apply_edit(
        &mut self,
        path: &KeyPath,
        value: Scalar,
        now: DateTime<Utc>,
    ) -> Result<Tree, PathError> {
        self.require_base_leaf(path)?;

        let mut next = self.translation.clone();
        set_value_at_path(&mut next, path, Tree::Leaf(value))?;
        self.translation = merge(&self.base, Some(&next));

        self.saved
            .insert(path.clone(), now + Duration::seconds(SAVED_HIGHLIGHT_SECS));
        self.suggestions.remove(path);

        Ok(self.translation.clone())
    }

    pub fn record_suggestion(&mut self, path: &KeyPath, text: String) -> Result<(), PathError> {
        self.require_base_leaf(path)?;
        self.suggestions.insert(path.clone(), text);
        Ok(())
    }

    /// Apply the pending suggestion for `path` as an edit.
    ///
    /// Returns `Ok(None)` when nothing was suggested for the path.
    pub fn accept_suggestion(
        &mut self,
        path: &KeyPath,
        now: DateTime<Utc>,
    ) -> Result<Option<Tree>, PathError> {
        let Some(text) = self.suggestions.get(path).cloned() else {
            return Ok(None);
        };
        self.apply_edit(path, Scalar::String(text), now).map(Some)
    }

    /// Drop saved markers whose highlight window has passed.
    pub fn expire_saved(&mut self, now: DateTime<Utc>) {
        self.saved.retain(|_, until| *until > now);
    }

    /// One entry per base leaf, in base order.
    ///
    /// Status precedence: untranslated (non-canonical languages only), then
    /// saved, then suggested, then translated.
    pub fn fields(&self, now: DateTime<Utc>) -> Vec<EditorField> {
        self.base
            .leaves()
            .into_iter()
            .map(|(keys, base_value)| {
                let path = KeyPath::from(keys);
                let value = get_value_at_path(&self.translation, &path)
                    .and_then(Tree::as_scalar)
                    .unwrap_or(base_value);
                let suggestion = self.suggestions.get(&path).cloned();

                let status = if !self.language.is_canonical() && !is_translated(base_value, value) {
                    FieldStatus::Untranslated
                } else if self.saved.get(&path).is_some_and(|until| *until > now) {
                    FieldStatus::Saved
                } else if suggestion.is_some() {
                    FieldStatus::Suggested
                } else {
                    FieldStatus::Translated
                };

                EditorField {
                    key: path.to_string(),
                    base_value: Value::from(base_value.clone()),
                    value: Value::from(value.clone()),
                    path,
                    status,
                    suggestion,
                }
            })
            .collect()
    }

    /// Reload the translation after a change made outside this session.
    pub fn replace_translation(&mut self, translation: Option<&Tree>) {
        self.translation = merge(&self.base, translation);
    }

    /// Swap in a new base document, dropping markers for paths it no longer has.
    pub fn rebase(&mut self, base: Tree, translation: Option<&Tree>) {
        self.base = base;
        self.replace_translation(translation);

        let base = &self.base;
        let is_leaf = |path: &KeyPath| {
            matches!(get_value_at_path(base, path), Some(Tree::Leaf(_)))
        };
        self.saved.retain(|path, _| is_leaf(path));
        self.suggestions.retain(|path, _| is_leaf(path));
    }

    fn require_base_leaf(&self, path: &KeyPath) -> Result<(), PathError> {
        if path.is_empty() {
            return Err(PathError::EmptyPath);
        }
        match get_value_at_path(&self.base, path) {
            Some(Tree::Leaf(_)) => Ok(()),
            _ => Err(PathError::UnknownPath(path.clone())),
        }
    }
}
