use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppError;
use crate::server::AppState;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API tokens and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Authenticated caller, attached to every `/api` request.
#[derive(Debug, Clone)]
pub struct Session {
    pub actor: String,
}

/// Reject requests without `Authorization: Bearer <API_TOKEN>`.
pub async fn require_bearer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized.into_response();
    };

    if !constant_time_compare(token, &state.config.api_token) {
        warn!("Rejected request to {} with invalid token", req.uri().path());
        return AppError::Unauthorized.into_response();
    }

    req.extensions_mut().insert(Session {
        actor: "admin".to_string(),
    });
    next.run(req).await
}
