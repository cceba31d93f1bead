//! Persistence seam for projects and their translation documents.
//!
//! [`PgStore`](crate::db::PgStore) is the production implementation;
//! [`MemoryStore`] backs development runs without a database and the tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::i18n::Language;
use crate::tree::Tree;

/// A project and its base document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "baseJson")]
    pub base: Tree,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Project listing entry (no document body).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Project> for ProjectSummary {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id.clone(),
            name: project.name.clone(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// One language's translation document for a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub project_id: String,
    pub language: Language,
    #[serde(rename = "json")]
    pub document: Tree,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A new base document together with every translation re-derived from it.
#[derive(Debug, Clone)]
pub struct SchemaChange {
    pub project_id: String,
    pub base: Tree,
    pub translations: Vec<(Language, Tree)>,
}

/// Raised by [`Store::apply_schema_change`] when one language's document
/// could not be written. Nothing from the change has been persisted.
#[derive(Debug, Error)]
#[error("Failed to write the {language} translation")]
pub struct PropagationFailure {
    pub language: Language,
    #[source]
    pub source: anyhow::Error,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// All projects, newest first.
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>>;

    async fn create_project(&self, name: &str, base: &Tree) -> Result<Project>;

    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// Removes the project and all of its translations.
    async fn delete_project(&self, id: &str) -> Result<bool>;

    /// Replace the base document only. Translations are left as they are.
    async fn update_base(&self, id: &str, base: &Tree) -> Result<Option<Project>>;

    async fn get_translation(
        &self,
        project_id: &str,
        language: Language,
    ) -> Result<Option<TranslationRecord>>;

    async fn list_translations(&self, project_id: &str) -> Result<Vec<TranslationRecord>>;

    async fn upsert_translation(
        &self,
        project_id: &str,
        language: Language,
        document: &Tree,
    ) -> Result<TranslationRecord>;

    /// Write the base and every listed translation as one unit.
    ///
    /// Returns `Ok(None)` if the project does not exist. A failed language
    /// write surfaces as a [`PropagationFailure`] and leaves the store as it
    /// was before the call.
    async fn apply_schema_change(&self, change: SchemaChange) -> Result<Option<Project>>;
}

#[derive(Default)]
struct MemoryState {
    // Insertion order doubles as creation order
    projects: IndexMap<String, Project>,
    translations: HashMap<(String, Language), TranslationRecord>,
}

/// In-process store. Every operation holds a single lock, so a schema change
/// is applied atomically.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_language: std::sync::Mutex<Option<Language>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of a `language` document fail.
    #[cfg(test)]
    pub(crate) fn fail_writes_for(&self, language: Language) {
        *self
            .fail_language
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(language);
    }

    #[cfg(test)]
    pub(crate) fn allow_writes(&self) {
        *self
            .fail_language
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    fn failing_language(&self) -> Option<Language> {
        *self
            .fail_language
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let state = self.state.read().await;
        Ok(state.projects.values().rev().map(ProjectSummary::from).collect())
    }

    async fn create_project(&self, name: &str, base: &Tree) -> Result<Project> {
        let now = Utc::now();
        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            base: base.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        state.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self.state.read().await.projects.get(id).cloned())
    }

    async fn delete_project(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.projects.shift_remove(id).is_some();
        state.translations.retain(|(project_id, _), _| project_id != id);
        Ok(removed)
    }

    async fn update_base(&self, id: &str, base: &Tree) -> Result<Option<Project>> {
        let mut state = self.state.write().await;
        Ok(state.projects.get_mut(id).map(|project| {
            project.base = base.clone();
            project.updated_at = Utc::now();
            project.clone()
        }))
    }

    async fn get_translation(
        &self,
        project_id: &str,
        language: Language,
    ) -> Result<Option<TranslationRecord>> {
        let state = self.state.read().await;
        Ok(state
            .translations
            .get(&(project_id.to_string(), language))
            .cloned())
    }

    async fn list_translations(&self, project_id: &str) -> Result<Vec<TranslationRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .translations
            .values()
            .filter(|record| record.project_id == project_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.language.code());
        Ok(records)
    }

    async fn upsert_translation(
        &self,
        project_id: &str,
        language: Language,
        document: &Tree,
    ) -> Result<TranslationRecord> {
        if self.failing_language() == Some(language) {
            bail!("Simulated write failure for {}", language);
        }
        let mut state = self.state.write().await;
        if !state.projects.contains_key(project_id) {
            bail!("Project {} does not exist", project_id);
        }

        let now = Utc::now();
        let record = state
            .translations
            .entry((project_id.to_string(), language))
            .and_modify(|record| {
                record.document = document.clone();
                record.updated_at = now;
            })
            .or_insert_with(|| TranslationRecord {
                project_id: project_id.to_string(),
                language,
                document: document.clone(),
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn apply_schema_change(&self, change: SchemaChange) -> Result<Option<Project>> {
        let mut state = self.state.write().await;
        if !state.projects.contains_key(&change.project_id) {
            return Ok(None);
        }

        // Validate every write before touching the state
        if let Some(failing) = self.failing_language() {
            if change.translations.iter().any(|(lang, _)| *lang == failing) {
                return Err(PropagationFailure {
                    language: failing,
                    source: anyhow::anyhow!("simulated write failure"),
                }
                .into());
            }
        }

        let now = Utc::now();
        for (language, document) in change.translations {
            state
                .translations
                .entry((change.project_id.clone(), language))
                .and_modify(|record| {
                    record.document = document.clone();
                    record.updated_at = now;
                })
                .or_insert_with(|| TranslationRecord {
                    project_id: change.project_id.clone(),
                    language,
                    document: document.clone(),
                    created_at: now,
                    updated_at: now,
                });
        }

        let project = state
            .projects
            .get_mut(&change.project_id)
            .map(|project| {
                project.base = change.base;
                project.updated_at = now;
                project.clone()
            });
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Tree {
        Tree::from(value)
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let store = MemoryStore::new();
        let base = doc(json!({"title": "Hello"}));

        let created = store.create_project("Website", &base).await.unwrap();
        assert_eq!(created.name, "Website");
        assert_eq!(created.base, base);
        assert!(uuid::Uuid::parse_str(&created.id).is_ok());

        let fetched = store.get_project(&created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_get_missing_project() {
        let store = MemoryStore::new();
        assert!(store.get_project("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_projects_newest_first() {
        let store = MemoryStore::new();
        let first = store.create_project("First", &Tree::empty_object()).await.unwrap();
        let second = store.create_project("Second", &Tree::empty_object()).await.unwrap();

        let listed = store.list_projects().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn test_delete_project_cascades_to_translations() {
        let store = MemoryStore::new();
        let project = store.create_project("P", &Tree::empty_object()).await.unwrap();
        store
            .upsert_translation(&project.id, Language::FRENCH, &Tree::empty_object())
            .await
            .unwrap();

        assert!(store.delete_project(&project.id).await.unwrap());
        assert!(store.list_translations(&project.id).await.unwrap().is_empty());
        assert!(!store.delete_project(&project.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_translation_keeps_created_at() {
        let store = MemoryStore::new();
        let project = store.create_project("P", &Tree::empty_object()).await.unwrap();

        let first = store
            .upsert_translation(&project.id, Language::GERMAN, &doc(json!({"a": "1"})))
            .await
            .unwrap();
        let second = store
            .upsert_translation(&project.id, Language::GERMAN, &doc(json!({"a": "2"})))
            .await
            .unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.document, doc(json!({"a": "2"})));
        assert_eq!(store.list_translations(&project.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_translation_unknown_project() {
        let store = MemoryStore::new();
        let result = store
            .upsert_translation("missing", Language::GERMAN, &Tree::empty_object())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_base_leaves_translations() {
        let store = MemoryStore::new();
        let project = store.create_project("P", &doc(json!({"a": "A"}))).await.unwrap();
        store
            .upsert_translation(&project.id, Language::FRENCH, &doc(json!({"a": "Fa"})))
            .await
            .unwrap();

        let updated = store
            .update_base(&project.id, &doc(json!({"b": "B"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.base, doc(json!({"b": "B"})));

        let fr = store
            .get_translation(&project.id, Language::FRENCH)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fr.document, doc(json!({"a": "Fa"})));
    }

    #[tokio::test]
    async fn test_apply_schema_change_writes_everything() {
        let store = MemoryStore::new();
        let project = store.create_project("P", &doc(json!({"a": "A"}))).await.unwrap();

        let change = SchemaChange {
            project_id: project.id.clone(),
            base: doc(json!({"a": "A", "b": "B"})),
            translations: vec![
                (Language::FRENCH, doc(json!({"a": "Fa", "b": "B"}))),
                (Language::GERMAN, doc(json!({"a": "A", "b": "B"}))),
            ],
        };
        let updated = store.apply_schema_change(change).await.unwrap().unwrap();
        assert_eq!(updated.base, doc(json!({"a": "A", "b": "B"})));

        let records = store.list_translations(&project.id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].language, Language::GERMAN);
        assert_eq!(records[1].document, doc(json!({"a": "Fa", "b": "B"})));
    }

    #[tokio::test]
    async fn test_apply_schema_change_failure_writes_nothing() {
        let store = MemoryStore::new();
        let base = doc(json!({"a": "A"}));
        let project = store.create_project("P", &base).await.unwrap();
        store
            .upsert_translation(&project.id, Language::FRENCH, &doc(json!({"a": "Fa"})))
            .await
            .unwrap();
        store.fail_writes_for(Language::GERMAN);

        let change = SchemaChange {
            project_id: project.id.clone(),
            base: doc(json!({"a": "A", "b": "B"})),
            translations: vec![
                (Language::FRENCH, doc(json!({"a": "Fa", "b": "B"}))),
                (Language::GERMAN, doc(json!({"a": "A", "b": "B"}))),
            ],
        };
        let err = store.apply_schema_change(change).await.unwrap_err();
        let failure = err.downcast_ref::<PropagationFailure>().expect("PropagationFailure");
        assert_eq!(failure.language, Language::GERMAN);

        assert_eq!(store.get_project(&project.id).await.unwrap().unwrap().base, base);
        let fr = store
            .get_translation(&project.id, Language::FRENCH)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fr.document, doc(json!({"a": "Fa"})));
        assert!(store
            .get_translation(&project.id, Language::GERMAN)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_apply_schema_change_missing_project() {
        let store = MemoryStore::new();
        let change = SchemaChange {
            project_id: "missing".to_string(),
            base: Tree::empty_object(),
            translations: vec![],
        };
        assert!(store.apply_schema_change(change).await.unwrap().is_none());
    }

    #[test]
    fn test_project_serializes_with_api_field_names() {
        let now = Utc::now();
        let project = Project {
            id: "p1".to_string(),
            name: "Site".to_string(),
            base: doc(json!({"a": "A"})),
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&project).unwrap();
        assert_eq!(value["baseJson"], json!({"a": "A"}));
        assert!(value.get("createdAt").is_some());
    }
}
