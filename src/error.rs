use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AuthProviderError
///
/// Failures while validating or refreshing a session against the hosted auth provider.
/// These never escape the Session Resolver: every variant resolves to "anonymous"
/// before a handler or the Route Gate sees the request.
#[derive(Debug, Error)]
pub enum AuthProviderError {
    #[error("session token invalid: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token refresh request failed: {0}")]
    Refresh(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("no session cookies present")]
    MissingCredentials,
}

/// PrivilegeLookupError
///
/// Failures while reading the privilege row from the data store. The Authorization
/// Guard swallows every variant and resolves it to "not privileged"; a lookup
/// failure must never grant access.
#[derive(Debug, Error)]
pub enum PrivilegeLookupError {
    #[error("privilege query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("privilege row malformed: {0}")]
    Malformed(String),
}

/// RepoError
///
/// Database failure inside a CRUD operation. Unlike privilege lookups, these are
/// surfaced to the API caller as a 500 with the underlying message, mirroring how
/// the store itself reports errors.
#[derive(Debug, Error)]
#[error("database error: {0}")]
pub struct RepoError(#[from] pub sqlx::Error);

/// ApiError
///
/// The only error type handlers return. Serialized as `{ "error": "..." }` with the
/// matching HTTP status. `Unauthorized` is the per-endpoint guard's rejection signal;
/// it carries no detail about whether the session was missing or merely unprivileged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Provider(String),
    #[error(transparent)]
    Database(#[from] RepoError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Provider(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
