//! Project, schema and translation operations.
//!
//! Every persisted translation goes through [`merge`] first, so stored
//! documents always mirror the current base shape. Schema changes that touch
//! every language are committed through [`Store::apply_schema_change`].

use chrono::Utc;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::DocumentCache;
use crate::completeness::Completeness;
use crate::editor::{EditorField, EditorSession};
use crate::error::{AppError, AppResult};
use crate::i18n::Language;
use crate::merge::merge;
use crate::metrics::{MetricsReport, ServiceMetrics};
use crate::path::{delete_at_path, get_value_at_path, set_value_at_path, KeyPath, PathError};
use crate::store::{Project, ProjectSummary, SchemaChange, Store, TranslationRecord};
use crate::suggest::Translator;
use crate::tree::{Scalar, Tree};

type SessionKey = (String, Language);

/// Completeness of one target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageCompleteness {
    pub language: Language,
    #[serde(flatten)]
    pub completeness: Completeness,
}

pub struct TranslationService {
    store: Arc<dyn Store>,
    translator: Arc<dyn Translator>,
    cache: DocumentCache,
    metrics: Arc<ServiceMetrics>,
    sessions: Mutex<HashMap<SessionKey, EditorSession>>,
}

/// Parse a document language, rejecting unknown and disabled codes.
pub fn parse_language(code: &str) -> AppResult<Language> {
    Language::from_code(code.trim()).map_err(|e| AppError::invalid(e.to_string()))
}

impl TranslationService {
    pub fn new(
        store: Arc<dyn Store>,
        translator: Arc<dyn Translator>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            store,
            translator,
            cache: DocumentCache::new(metrics.clone()),
            metrics,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> MetricsReport {
        self.metrics.report()
    }

    // ==================== Projects ====================

    pub async fn list_projects(&self) -> AppResult<Vec<ProjectSummary>> {
        self.store.list_projects().await.map_err(AppError::from_store)
    }

    pub async fn create_project(&self, name: &str, base: Tree) -> AppResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("Project name is required"));
        }
        if !base.is_container() {
            return Err(AppError::invalid(
                "Base document must be a JSON object or array",
            ));
        }

        let seen = self.cache.generation();
        let project = self
            .store
            .create_project(name, &base)
            .await
            .map_err(AppError::from_store)?;
        self.metrics.record_documents_written(1);
        self.cache.put_project(&project, seen);

        info!("Created project {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn get_project(&self, id: &str) -> AppResult<Project> {
        if let Some(project) = self.cache.project(id) {
            return Ok(project);
        }

        let seen = self.cache.generation();
        let project = self
            .store
            .get_project(id)
            .await
            .map_err(AppError::from_store)?
            .ok_or_else(|| AppError::not_found("Project not found"))?;
        self.cache.put_project(&project, seen);
        Ok(project)
    }

    pub async fn delete_project(&self, id: &str) -> AppResult<()> {
        let deleted = self
            .store
            .delete_project(id)
            .await
            .map_err(AppError::from_store)?;

        self.cache.invalidate_project(id);
        self.sessions
            .lock()
            .await
            .retain(|(project_id, _), _| project_id != id);

        if !deleted {
            return Err(AppError::not_found("Project not found"));
        }
        info!("Deleted project {}", id);
        Ok(())
    }

    // ==================== Schema changes ====================

    /// Replace the base document and re-derive every stored translation.
    pub async fn replace_base(&self, id: &str, base: Tree) -> AppResult<Project> {
        if !base.is_container() {
            return Err(AppError::invalid(
                "Base document must be a JSON object or array",
            ));
        }
        let project = self.get_project(id).await?;
        let records = self.list_translations(&project.id).await?;

        let translations = records
            .into_iter()
            .map(|record| {
                let merged = merge(&base, Some(&record.document));
                (record.language, merged)
            })
            .collect();

        self.commit_schema_change(&project.id, base, translations).await
    }

    /// Add a key to the base and every translation.
    ///
    /// Translations receive the base value, so the key shows up as
    /// untranslated until someone edits it.
    pub async fn add_key(&self, id: &str, path: &KeyPath, value: Tree) -> AppResult<Project> {
        if path.is_empty() {
            return Err(AppError::invalid("Key path is required"));
        }
        let project = self.get_project(id).await?;
        if get_value_at_path(&project.base, path).is_some() {
            return Err(AppError::invalid(format!("Key '{}' already exists", path)));
        }

        let mut base = project.base.clone();
        set_value_at_path(&mut base, path, value)?;

        let translations = self
            .list_translations(&project.id)
            .await?
            .into_iter()
            .map(|record| (record.language, merge(&base, Some(&record.document))))
            .collect();

        debug!("Adding key {} to project {}", path, project.id);
        self.commit_schema_change(&project.id, base, translations).await
    }

    /// Delete a key from the base and cascade the deletion to every
    /// translation.
    pub async fn delete_key(&self, id: &str, path: &KeyPath) -> AppResult<Project> {
        if path.is_empty() {
            return Err(AppError::invalid("Key path is required"));
        }
        let project = self.get_project(id).await?;

        let mut base = project.base.clone();
        if !delete_at_path(&mut base, path) {
            return Err(AppError::not_found(format!("Key '{}' not found", path)));
        }

        let translations = self
            .list_translations(&project.id)
            .await?
            .into_iter()
            .map(|mut record| {
                // Delete first so array positions shift the same way as the base
                delete_at_path(&mut record.document, path);
                (record.language, merge(&base, Some(&record.document)))
            })
            .collect();

        debug!("Deleting key {} from project {}", path, project.id);
        self.commit_schema_change(&project.id, base, translations).await
    }

    async fn commit_schema_change(
        &self,
        project_id: &str,
        base: Tree,
        translations: Vec<(Language, Tree)>,
    ) -> AppResult<Project> {
        let written = 1 + translations.len();

        let updated = if translations.is_empty() {
            self.store.update_base(project_id, &base).await
        } else {
            self.store
                .apply_schema_change(SchemaChange {
                    project_id: project_id.to_string(),
                    base: base.clone(),
                    translations: translations.clone(),
                })
                .await
        };

        // Whatever happened, cached copies may now be stale
        self.cache.invalidate_project(project_id);

        let project = updated
            .map_err(|e| {
                warn!("Schema change for project {} failed: {:#}", project_id, e);
                AppError::from_store(e)
            })?
            .ok_or_else(|| AppError::not_found("Project not found"))?;

        self.metrics.record_documents_written(written);

        let mut sessions = self.sessions.lock().await;
        for ((id, language), session) in sessions.iter_mut() {
            if id != project_id {
                continue;
            }
            let document = translations
                .iter()
                .find(|(lang, _)| lang == language)
                .map(|(_, doc)| doc);
            session.rebase(base.clone(), document);
        }

        info!(
            "Updated base of project {} and {} translations",
            project_id,
            translations.len()
        );
        Ok(project)
    }

    // ==================== Translations ====================

    pub async fn get_translation(
        &self,
        id: &str,
        language: Language,
    ) -> AppResult<TranslationRecord> {
        let project = self.get_project(id).await?;
        self.load_translation(&project.id, language)
            .await?
            .ok_or_else(|| AppError::not_found("Translation not found"))
    }

    /// Store a whole translation document, reconciled against the base.
    pub async fn save_translation(
        &self,
        id: &str,
        language: Language,
        document: Tree,
    ) -> AppResult<TranslationRecord> {
        let project = self.get_project(id).await?;
        let merged = merge(&project.base, Some(&document));
        let record = self.persist_translation(&project.id, language, &merged).await?;

        if let Some(session) = self
            .sessions
            .lock()
            .await
            .get_mut(&(project.id.clone(), language))
        {
            session.replace_translation(Some(&record.document));
        }
        Ok(record)
    }

    /// Set one leaf through the editor session and persist the result.
    pub async fn edit_leaf(
        &self,
        id: &str,
        language: Language,
        path: &KeyPath,
        value: Scalar,
    ) -> AppResult<TranslationRecord> {
        let project = self.get_project(id).await?;
        let now = Utc::now();

        self.commit_edit(&project, language, |session| {
            session.apply_edit(path, value, now).map(Some)
        })
        .await?
        .ok_or_else(|| AppError::not_found(format!("Key '{}' not found", path)))
    }

    /// Save the pending suggestion for `path` as the translated value.
    pub async fn accept_suggestion(
        &self,
        id: &str,
        language: Language,
        path: &KeyPath,
    ) -> AppResult<TranslationRecord> {
        let project = self.get_project(id).await?;
        let now = Utc::now();

        let record = self
            .commit_edit(&project, language, |session| {
                session.accept_suggestion(path, now)
            })
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("No suggestion pending for '{}'", path))
            })?;
        debug!("Accepted suggestion for {} ({})", path, language);
        Ok(record)
    }

    /// The full reconciled document for `language`.
    pub async fn export(&self, id: &str, language: Language) -> AppResult<Tree> {
        let project = self.get_project(id).await?;
        let stored = self.load_translation(&project.id, language).await?;
        Ok(merge(&project.base, stored.as_ref().map(|r| &r.document)))
    }

    /// Completeness for every target language.
    pub async fn completeness(&self, id: &str) -> AppResult<Vec<LanguageCompleteness>> {
        let project = self.get_project(id).await?;

        let mut report = Vec::new();
        for language in Language::targets() {
            let stored = self.load_translation(&project.id, language).await?;
            report.push(LanguageCompleteness {
                language,
                completeness: Completeness::measure(
                    &project.base,
                    stored.as_ref().map(|r| &r.document),
                ),
            });
        }
        Ok(report)
    }

    // ==================== Editor ====================

    pub async fn editor_fields(&self, id: &str, language: Language) -> AppResult<Vec<EditorField>> {
        let project = self.get_project(id).await?;
        let now = Utc::now();

        let mut sessions = self.sessions.lock().await;
        let session = self.session_for(&mut sessions, &project, language).await?;
        session.expire_saved(now);
        Ok(session.fields(now))
    }

    // ==================== Suggestions ====================

    /// Ask the translator for one leaf. The suggestion is remembered by the
    /// editor session but not saved.
    pub async fn suggest(&self, id: &str, language: Language, path: &KeyPath) -> AppResult<String> {
        let project = self.get_project(id).await?;
        let source = match get_value_at_path(&project.base, path) {
            Some(Tree::Leaf(Scalar::String(text))) => text.clone(),
            Some(Tree::Leaf(_)) => {
                return Err(AppError::invalid(format!("Value at '{}' is not text", path)))
            }
            Some(_) => {
                return Err(AppError::invalid(format!("'{}' is not a leaf", path)))
            }
            None => return Err(AppError::not_found(format!("Key '{}' not found", path))),
        };

        let suggestion = self
            .translator
            .translate(&source, language)
            .await
            .map_err(|e| {
                warn!("Suggestion for {} ({}) failed: {:#}", path, language, e);
                AppError::Upstream(format!("{:#}", e))
            })?;

        let mut sessions = self.sessions.lock().await;
        let session = self.session_for(&mut sessions, &project, language).await?;
        session.record_suggestion(path, suggestion.clone())?;

        Ok(suggestion)
    }

    /// Free-text translation. Accepts every registered language.
    pub async fn translate_text(&self, text: &str, target: &str) -> AppResult<String> {
        if text.trim().is_empty() || target.trim().is_empty() {
            return Err(AppError::invalid("Text and target language are required"));
        }
        let language =
            Language::any_registered(target.trim()).map_err(|e| AppError::invalid(e.to_string()))?;

        self.translator
            .translate(text, language)
            .await
            .map_err(|e| AppError::Upstream(format!("{:#}", e)))
    }

    // ==================== Helpers ====================

    async fn list_translations(&self, project_id: &str) -> AppResult<Vec<TranslationRecord>> {
        self.store
            .list_translations(project_id)
            .await
            .map_err(AppError::from_store)
    }

    async fn load_translation(
        &self,
        project_id: &str,
        language: Language,
    ) -> AppResult<Option<TranslationRecord>> {
        if let Some(record) = self.cache.translation(project_id, language) {
            return Ok(Some(record));
        }

        let seen = self.cache.generation();
        let record = self
            .store
            .get_translation(project_id, language)
            .await
            .map_err(AppError::from_store)?;
        if let Some(record) = &record {
            self.cache.put_translation(record, seen);
        }
        Ok(record)
    }

    async fn persist_translation(
        &self,
        project_id: &str,
        language: Language,
        document: &Tree,
    ) -> AppResult<TranslationRecord> {
        let written = self
            .store
            .upsert_translation(project_id, language, document)
            .await;
        // Readers that loaded before this point must not cache what they saw
        self.cache.invalidate_translation(project_id, language);
        let record = written.map_err(AppError::from_store)?;

        self.metrics.record_documents_written(1);
        debug!("Saved {} translation of project {}", language, project_id);
        Ok(record)
    }

    /// Run `edit` on a copy of the editor session and persist the document it
    /// returns. The session only takes the edit once the store accepted it.
    async fn commit_edit<F>(
        &self,
        project: &Project,
        language: Language,
        edit: F,
    ) -> AppResult<Option<TranslationRecord>>
    where
        F: FnOnce(&mut EditorSession) -> Result<Option<Tree>, PathError>,
    {
        let mut sessions = self.sessions.lock().await;
        let session = self.session_for(&mut sessions, project, language).await?;

        let mut edited = session.clone();
        let Some(document) = edit(&mut edited)? else {
            return Ok(None);
        };
        let record = self
            .persist_translation(&project.id, language, &document)
            .await?;
        *session = edited;
        Ok(Some(record))
    }

    async fn session_for<'a>(
        &self,
        sessions: &'a mut HashMap<SessionKey, EditorSession>,
        project: &Project,
        language: Language,
    ) -> AppResult<&'a mut EditorSession> {
        match sessions.entry((project.id.clone(), language)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let stored = self.load_translation(&project.id, language).await?;
                Ok(entry.insert(EditorSession::new(
                    language,
                    project.base.clone(),
                    stored.as_ref().map(|r| &r.document),
                )))
            }
        }
    }
}
