//! HTTP-facing error type.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::i18n::Language;
use crate::path::PathError;
use crate::store::PropagationFailure;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed request; nothing was written.
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    /// A schema change could not be applied to one language's document.
    #[error("Failed to update the {language} translation: {source}")]
    Propagation {
        language: Language,
        #[source]
        source: anyhow::Error,
    },

    /// The AI completion call failed.
    #[error("Suggestion service failed: {0}")]
    Upstream(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Propagation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts a store error, surfacing a failed language if there is one.
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast::<PropagationFailure>() {
            Ok(failure) => AppError::Propagation {
                language: failure.language,
                source: failure.source,
            },
            Err(other) => AppError::Storage(other),
        }
    }
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:#}", self);
        }

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Storage(anyhow!("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_store_extracts_propagation_failure() {
        let err = anyhow::Error::new(PropagationFailure {
            language: Language::GERMAN,
            source: anyhow!("constraint violated"),
        });

        match AppError::from_store(err) {
            AppError::Propagation { language, .. } => assert_eq!(language, Language::GERMAN),
            other => panic!("Expected Propagation, got {:?}", other),
        }
    }

    #[test]
    fn test_from_store_passes_other_errors_through() {
        let err = AppError::from_store(anyhow!("connection reset"));
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_propagation_message_names_language() {
        let err = AppError::Propagation {
            language: Language::FRENCH,
            source: anyhow!("boom"),
        };
        assert_eq!(err.to_string(), "Failed to update the fr translation: boom");
    }

    #[test]
    fn test_path_error_is_invalid_input() {
        let err: AppError = PathError::EmptyPath.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
