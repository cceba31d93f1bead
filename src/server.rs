//! HTTP surface.
//!
//! `/health` is public; everything under `/api` requires the bearer token.
//! Handlers parse and validate input, then delegate to
//! [`TranslationService`].

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::completeness::count_leaves;
use crate::config::Config;
use crate::db::PgStore;
use crate::error::{AppError, AppResult};
use crate::i18n::Language;
use crate::metrics::{MetricsReport, ServiceMetrics};
use crate::path::KeyPath;
use crate::security::{require_bearer, Session};
use crate::service::{parse_language, TranslationService};
use crate::store::{MemoryStore, Store};
use crate::suggest::{OpenAiTranslator, Translator};
use crate::tree::{Scalar, Tree};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: Arc<TranslationService>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        translator: Arc<dyn Translator>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            service: Arc::new(TranslationService::new(store, translator, metrics)),
        }
    }

    /// Wire up the configured store and the OpenAI translator.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = match &config.database_url {
            Some(url) => Arc::new(PgStore::connect(url).await?),
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let metrics = Arc::new(ServiceMetrics::new());
        let translator = Arc::new(OpenAiTranslator::new(
            reqwest::Client::new(),
            &config,
            metrics.clone(),
        ));
        Ok(Self::new(config, store, translator, metrics))
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/languages", get(list_languages).post(check_language))
        .route("/upload", post(upload))
        .route("/translate", post(translate_text))
        .route("/metrics", get(metrics))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(replace_base).delete(delete_project),
        )
        .route("/projects/:id/keys", post(add_key).delete(delete_key))
        .route(
            "/projects/:id/translations",
            get(get_translation)
                .put(save_translation)
                .patch(edit_translation),
        )
        .route("/projects/:id/export", get(export))
        .route("/projects/:id/completeness", get(completeness))
        .route("/projects/:id/editor", get(editor))
        .route("/projects/:id/suggestions", post(suggest))
        .route("/projects/:id/suggestions/accept", post(accept_suggestion))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let local_addr = listener.local_addr().context("Failed to read listener address")?;
    info!("Listening on {}", local_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await;
}

/// Resolve when `signal` fires. If the listener could not be installed,
/// never resolve, so the server keeps running instead of shutting down.
async fn wait_for_signal(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal, serving until killed: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ==================== Request bodies ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest {
    name: Option<String>,
    base_json: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceBaseRequest {
    base_json: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AddKeyRequest {
    path: KeyPath,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LanguageQuery {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveTranslationRequest {
    language: Option<String>,
    json: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EditLeafRequest {
    language: String,
    path: KeyPath,
    value: Value,
}

#[derive(Debug, Deserialize)]
struct SuggestRequest {
    language: String,
    path: KeyPath,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest {
    text: Option<String>,
    target_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LanguageRequest {
    language: Option<String>,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::invalid(rejection.body_text()))
}

/// Documents may arrive as JSON values or as JSON text.
fn document(value: Value) -> AppResult<Tree> {
    match value {
        Value::String(text) => {
            Tree::from_json_str(&text).map_err(|_| AppError::invalid("Invalid JSON"))
        }
        other => Ok(Tree::from(other)),
    }
}

/// Query-string key paths are dotted (`a.b`) or a JSON array (`["a.b","c"]`)
/// for keys that themselves contain dots.
fn query_path(raw: &str) -> AppResult<KeyPath> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str(raw)
            .map_err(|_| AppError::invalid("Key path must be a JSON array of strings"));
    }
    Ok(raw.parse::<KeyPath>()?)
}

fn required_language(query: LanguageQuery) -> AppResult<Language> {
    let code = query
        .language
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| AppError::invalid("Language is required"))?;
    parse_language(&code)
}

// ==================== Handlers ====================

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_languages() -> Json<Value> {
    Json(json!({"languages": Language::all_enabled()}))
}

async fn check_language(payload: Result<Json<LanguageRequest>, JsonRejection>) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let supported = request
        .language
        .as_deref()
        .is_some_and(|code| Language::from_code(code).is_ok());
    if !supported {
        return Err(AppError::invalid("Unsupported language"));
    }
    Ok(Json(json!({"languages": Language::all_enabled()})))
}

async fn upload(text: String) -> AppResult<Json<Value>> {
    if text.trim().is_empty() {
        return Err(AppError::invalid("No file provided"));
    }
    let tree = Tree::from_json_str(&text).map_err(|_| AppError::invalid("Invalid JSON file"))?;

    Ok(Json(json!({
        "languages": Language::all_enabled(),
        "message": "File validated successfully",
        "leafCount": count_leaves(&tree),
    })))
}

async fn translate_text(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let translation = state
        .service
        .translate_text(
            request.text.as_deref().unwrap_or_default(),
            request.target_language.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({"translation": translation})))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsReport> {
    Json(state.service.metrics())
}

async fn list_projects(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let projects = state.service.list_projects().await?;
    Ok(Json(json!({"projects": projects})))
}

async fn create_project(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let (Some(name), Some(base)) = (request.name, request.base_json) else {
        return Err(AppError::invalid("Name and base JSON are required"));
    };

    let project = state.service.create_project(&name, document(base)?).await?;
    info!("{} created project {}", session.actor, project.id);
    Ok(Json(json!({"project": project})))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let project = state.service.get_project(&id).await?;
    Ok(Json(json!({"project": project})))
}

async fn replace_base(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    payload: Result<Json<ReplaceBaseRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let base = body(payload)?
        .base_json
        .ok_or_else(|| AppError::invalid("Base JSON is required"))?;

    let project = state.service.replace_base(&id, document(base)?).await?;
    info!("{} replaced base of project {}", session.actor, id);
    Ok(Json(json!({"project": project})))
}

async fn delete_project(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    state.service.delete_project(&id).await?;
    info!("{} deleted project {}", session.actor, id);
    Ok(Json(json!({"success": true})))
}

async fn add_key(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    payload: Result<Json<AddKeyRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let value = request
        .value
        .ok_or_else(|| AppError::invalid("Value is required"))?;

    let project = state
        .service
        .add_key(&id, &request.path, Tree::from(value))
        .await?;
    info!("{} added key {} to project {}", session.actor, request.path, id);
    Ok(Json(json!({"project": project})))
}

async fn delete_key(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> AppResult<Json<Value>> {
    let raw = query
        .path
        .ok_or_else(|| AppError::invalid("Key path is required"))?;
    let path = query_path(&raw)?;

    let project = state.service.delete_key(&id, &path).await?;
    info!("{} deleted key {} from project {}", session.actor, path, id);
    Ok(Json(json!({"project": project})))
}

async fn get_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> AppResult<Json<Value>> {
    let language = required_language(query)?;
    let translation = state.service.get_translation(&id, language).await?;
    Ok(Json(json!({"translation": translation})))
}

async fn save_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SaveTranslationRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let (Some(language), Some(json)) = (request.language, request.json) else {
        return Err(AppError::invalid("Language and json are required"));
    };

    let translation = state
        .service
        .save_translation(&id, parse_language(&language)?, document(json)?)
        .await?;
    Ok(Json(json!({"translation": translation})))
}

async fn edit_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EditLeafRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let language = parse_language(&request.language)?;
    let value = Scalar::from_value(request.value)
        .ok_or_else(|| AppError::invalid("Only leaf values can be edited"))?;

    let translation = state
        .service
        .edit_leaf(&id, language, &request.path, value)
        .await?;
    Ok(Json(json!({"translation": translation})))
}

async fn export(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> AppResult<Json<Tree>> {
    let language = required_language(query)?;
    Ok(Json(state.service.export(&id, language).await?))
}

async fn completeness(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let report = state.service.completeness(&id).await?;
    Ok(Json(json!({"completeness": report})))
}

async fn editor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> AppResult<Json<Value>> {
    let language = required_language(query)?;
    let fields = state.service.editor_fields(&id, language).await?;
    Ok(Json(json!({"language": language, "fields": fields})))
}

async fn suggest(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let language = parse_language(&request.language)?;
    let suggestion = state.service.suggest(&id, language, &request.path).await?;
    Ok(Json(json!({"path": request.path.to_string(), "suggestion": suggestion})))
}

async fn accept_suggestion(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    payload: Result<Json<SuggestRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let request = body(payload)?;
    let language = parse_language(&request.language)?;
    let translation = state
        .service
        .accept_suggestion(&id, language, &request.path)
        .await?;
    info!(
        "{} accepted suggestion for {} ({}) in project {}",
        session.actor, request.path, language, id
    );
    Ok(Json(json!({"translation": translation})))
}
