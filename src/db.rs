//! PostgreSQL-backed [`Store`].
//!
//! Documents are stored as JSON text rather than JSONB so object key order
//! survives a round trip.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{info, warn};

use crate::i18n::Language;
use crate::store::{
    Project, ProjectSummary, PropagationFailure, SchemaChange, Store, TranslationRecord,
};
use crate::tree::Tree;

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    name: String,
    base_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let base = Tree::from_json_str(&row.base_json)
            .with_context(|| format!("Corrupt base document for project {}", row.id))?;
        Ok(Project {
            id: row.id,
            name: row.name,
            base,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for ProjectSummary {
    fn from(row: SummaryRow) -> Self {
        ProjectSummary {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TranslationRow {
    project_id: String,
    language: String,
    json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TranslationRow> for TranslationRecord {
    type Error = anyhow::Error;

    fn try_from(row: TranslationRow) -> Result<Self> {
        // Disabled languages still load so schema changes keep them aligned
        let language = Language::any_registered(&row.language)?;
        let document = Tree::from_json_str(&row.json).with_context(|| {
            format!(
                "Corrupt {} translation for project {}",
                row.language, row.project_id
            )
        })?;
        Ok(TranslationRecord {
            project_id: row.project_id,
            language,
            document,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and create the tables if they do not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("Connected to PostgreSQL");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                base_json TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create projects table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                language TEXT NOT NULL,
                json TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (project_id, language)
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create translations table")?;

        Ok(())
    }
}

const UPSERT_TRANSLATION: &str = "INSERT INTO translations (project_id, language, json)
     VALUES ($1, $2, $3)
     ON CONFLICT (project_id, language)
     DO UPDATE SET json = EXCLUDED.json, updated_at = NOW()
     RETURNING project_id, language, json, created_at, updated_at";

#[async_trait]
impl Store for PgStore {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT id, name, created_at, updated_at FROM projects ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list projects")?;

        Ok(rows.into_iter().map(ProjectSummary::from).collect())
    }

    async fn create_project(&self, name: &str, base: &Tree) -> Result<Project> {
        let row: ProjectRow = sqlx::query_as(
            "INSERT INTO projects (id, name, base_json) VALUES ($1, $2, $3)
             RETURNING id, name, base_json, created_at, updated_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(name)
        .bind(base.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create project")?;

        row.try_into()
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "SELECT id, name, base_json, created_at, updated_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load project")?;

        row.map(Project::try_from).transpose()
    }

    async fn delete_project(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete project")?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_base(&self, id: &str, base: &Tree) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            "UPDATE projects SET base_json = $2, updated_at = NOW() WHERE id = $1
             RETURNING id, name, base_json, created_at, updated_at",
        )
        .bind(id)
        .bind(base.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update base document")?;

        row.map(Project::try_from).transpose()
    }

    async fn get_translation(
        &self,
        project_id: &str,
        language: Language,
    ) -> Result<Option<TranslationRecord>> {
        let row: Option<TranslationRow> = sqlx::query_as(
            "SELECT project_id, language, json, created_at, updated_at
             FROM translations WHERE project_id = $1 AND language = $2",
        )
        .bind(project_id)
        .bind(language.code())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load translation")?;

        row.map(TranslationRecord::try_from).transpose()
    }

    async fn list_translations(&self, project_id: &str) -> Result<Vec<TranslationRecord>> {
        let rows: Vec<TranslationRow> = sqlx::query_as(
            "SELECT project_id, language, json, created_at, updated_at
             FROM translations WHERE project_id = $1 ORDER BY language",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list translations")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let code = row.language.clone();
            match TranslationRecord::try_from(row) {
                Ok(record) => records.push(record),
                // Unknown language code or unreadable document
                Err(e) => warn!("Skipping {} translation of {}: {:#}", code, project_id, e),
            }
        }
        Ok(records)
    }

    async fn upsert_translation(
        &self,
        project_id: &str,
        language: Language,
        document: &Tree,
    ) -> Result<TranslationRecord> {
        let row: TranslationRow = sqlx::query_as(UPSERT_TRANSLATION)
            .bind(project_id)
            .bind(language.code())
            .bind(document.to_string())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to save {} translation", language))?;

        row.try_into()
    }

    async fn apply_schema_change(&self, change: SchemaChange) -> Result<Option<Project>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        let row: Option<ProjectRow> = sqlx::query_as(
            "UPDATE projects SET base_json = $2, updated_at = NOW() WHERE id = $1
             RETURNING id, name, base_json, created_at, updated_at",
        )
        .bind(&change.project_id)
        .bind(change.base.to_string())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update base document")?;

        let Some(row) = row else {
            tx.rollback().await.context("Failed to roll back")?;
            return Ok(None);
        };

        for (language, document) in &change.translations {
            let written = sqlx::query(UPSERT_TRANSLATION)
                .bind(&change.project_id)
                .bind(language.code())
                .bind(document.to_string())
                .execute(&mut *tx)
                .await;

            if let Err(e) = written {
                // Dropping the transaction rolls it back
                return Err(PropagationFailure {
                    language: *language,
                    source: e.into(),
                }
                .into());
            }
        }

        tx.commit().await.context("Failed to commit schema change")?;
        info!(
            "Applied schema change to project {} ({} translations)",
            change.project_id,
            change.translations.len()
        );

        Project::try_from(row).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ==================== Helper Functions ====================

    fn project_row(base_json: &str) -> ProjectRow {
        let now = Utc::now();
        ProjectRow {
            id: "p1".to_string(),
            name: "Website".to_string(),
            base_json: base_json.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn translation_row(language: &str, json: &str) -> TranslationRow {
        let now = Utc::now();
        TranslationRow {
            project_id: "p1".to_string(),
            language: language.to_string(),
            json: json.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Connect to the database named by `DATABASE_URL`, if any.
    async fn connect_test_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(PgStore::connect(&url).await.expect("Failed to connect"))
    }

    // ==================== ProjectRow Tests ====================

    #[test]
    fn test_project_row_converts() {
        let row = project_row(r#"{"b":"B","a":{"x":"X"}}"#);
        let created_at = row.created_at;

        let project = Project::try_from(row).expect("Should convert");
        assert_eq!(project.id, "p1");
        assert_eq!(project.name, "Website");
        assert_eq!(project.created_at, created_at);
        assert_eq!(project.base, Tree::from(json!({"b": "B", "a": {"x": "X"}})));
    }

    #[test]
    fn test_project_row_keeps_key_order() {
        let text = r#"{"zeta":"Z","alpha":"A","items":["1","2"]}"#;
        let project = Project::try_from(project_row(text)).expect("Should convert");
        assert_eq!(project.base.to_string(), text);
    }

    #[test]
    fn test_project_row_with_corrupt_base() {
        let err = Project::try_from(project_row("{not json")).unwrap_err();
        assert!(err
            .to_string()
            .contains("Corrupt base document for project p1"));
    }

    // ==================== TranslationRow Tests ====================

    #[test]
    fn test_translation_row_converts() {
        let record = TranslationRecord::try_from(translation_row("fr", r#"{"title":"Bienvenue"}"#))
            .expect("Should convert");
        assert_eq!(record.project_id, "p1");
        assert_eq!(record.language, Language::FRENCH);
        assert_eq!(record.document, Tree::from(json!({"title": "Bienvenue"})));
    }

    #[test]
    fn test_translation_row_with_disabled_language() {
        let record = TranslationRecord::try_from(translation_row("pl", r#"{"title":"Witamy"}"#))
            .expect("Disabled languages still load");
        assert_eq!(record.language.code(), "pl");
    }

    #[test]
    fn test_translation_row_with_unknown_language() {
        let err = TranslationRecord::try_from(translation_row("xx", "{}")).unwrap_err();
        assert!(err.to_string().contains("Unknown language code"));
    }

    #[test]
    fn test_translation_row_with_corrupt_json() {
        let err = TranslationRecord::try_from(translation_row("de", "[1,")).unwrap_err();
        assert!(err
            .to_string()
            .contains("Corrupt de translation for project p1"));
    }

    // ==================== SummaryRow Tests ====================

    #[test]
    fn test_summary_row_converts() {
        let now = Utc::now();
        let summary = ProjectSummary::from(SummaryRow {
            id: "p1".to_string(),
            name: "Website".to_string(),
            created_at: now,
            updated_at: now,
        });
        assert_eq!(summary.id, "p1");
        assert_eq!(summary.name, "Website");
        assert_eq!(summary.updated_at, now);
    }

    // ==================== PostgreSQL Tests ====================

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL database"]
    async fn test_pg_project_round_trip() {
        let Some(store) = connect_test_store().await else {
            return;
        };
        let base = Tree::from(json!({"zeta": "Z", "alpha": "A"}));

        let created = store.create_project("Website", &base).await.expect("create");
        let fetched = store
            .get_project(&created.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(fetched.base.to_string(), r#"{"zeta":"Z","alpha":"A"}"#);
        assert!(store
            .list_projects()
            .await
            .expect("list")
            .iter()
            .any(|p| p.id == created.id));

        assert!(store.delete_project(&created.id).await.expect("delete"));
        assert!(store.get_project(&created.id).await.expect("get").is_none());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL database"]
    async fn test_pg_translations_and_schema_change() {
        let Some(store) = connect_test_store().await else {
            return;
        };
        let base = Tree::from(json!({"a": "A"}));
        let project = store.create_project("Website", &base).await.expect("create");

        let first = store
            .upsert_translation(&project.id, Language::FRENCH, &Tree::from(json!({"a": "Fa"})))
            .await
            .expect("insert");
        let second = store
            .upsert_translation(&project.id, Language::FRENCH, &Tree::from(json!({"a": "Fa2"})))
            .await
            .expect("update");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.document, Tree::from(json!({"a": "Fa2"})));

        let change = SchemaChange {
            project_id: project.id.clone(),
            base: Tree::from(json!({"a": "A", "b": "B"})),
            translations: vec![
                (Language::FRENCH, Tree::from(json!({"a": "Fa2", "b": "B"}))),
                (Language::GERMAN, Tree::from(json!({"a": "A", "b": "B"}))),
            ],
        };
        let updated = store
            .apply_schema_change(change)
            .await
            .expect("apply")
            .expect("exists");
        assert_eq!(updated.base, Tree::from(json!({"a": "A", "b": "B"})));
        assert_eq!(
            store.list_translations(&project.id).await.expect("list").len(),
            2
        );

        // Deleting the project cascades to its translations
        store.delete_project(&project.id).await.expect("delete");
        assert!(store
            .get_translation(&project.id, Language::FRENCH)
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL database"]
    async fn test_pg_schema_change_for_missing_project() {
        let Some(store) = connect_test_store().await else {
            return;
        };
        let change = SchemaChange {
            project_id: "missing".to_string(),
            base: Tree::empty_object(),
            translations: vec![],
        };
        assert!(store.apply_schema_change(change).await.expect("apply").is_none());
    }
}
