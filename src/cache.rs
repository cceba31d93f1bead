//! Read-through cache for project bases and translation documents.
//!
//! Callers check the cache first and fall back to the store on a miss.
//! Every write that touches a project invalidates its entries.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::i18n::Language;
use crate::metrics::ServiceMetrics;
use crate::store::{Project, TranslationRecord};

/// Snapshot of the cache's write counter, taken before a store read.
///
/// A loaded value is only cached if no invalidation happened since the
/// snapshot, so a slow read can never overwrite a newer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Default)]
struct Entries {
    projects: HashMap<String, Project>,
    translations: HashMap<(String, Language), TranslationRecord>,
    generation: u64,
}

pub struct DocumentCache {
    entries: RwLock<Entries>,
    metrics: Arc<ServiceMetrics>,
}

impl DocumentCache {
    pub fn new(metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            metrics,
        }
    }

    pub fn generation(&self) -> Generation {
        Generation(
            self.entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .generation,
        )
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        let found = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .projects
            .get(id)
            .cloned();
        self.record(found.is_some());
        found
    }

    /// Cache `project` unless something was invalidated after `seen`.
    pub fn put_project(&self, project: &Project, seen: Generation) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.generation != seen.0 {
            return false;
        }
        entries.projects.insert(project.id.clone(), project.clone());
        true
    }

    pub fn translation(&self, project_id: &str, language: Language) -> Option<TranslationRecord> {
        let found = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .translations
            .get(&(project_id.to_string(), language))
            .cloned();
        self.record(found.is_some());
        found
    }

    /// Cache `record` unless something was invalidated after `seen`.
    pub fn put_translation(&self, record: &TranslationRecord, seen: Generation) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.generation != seen.0 {
            return false;
        }
        entries
            .translations
            .insert((record.project_id.clone(), record.language), record.clone());
        true
    }

    pub fn invalidate_translation(&self, project_id: &str, language: Language) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.generation += 1;
        entries
            .translations
            .remove(&(project_id.to_string(), language));
    }

    /// Drop the project and all of its translations.
    pub fn invalidate_project(&self, project_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.generation += 1;
        entries.projects.remove(project_id);
        entries.translations.retain(|(id, _), _| id != project_id);
    }

    fn record(&self, hit: bool) {
        if hit {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
        }
    }
}
