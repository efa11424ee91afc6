//! The per-request error taxonomy: every handler in `http` returns
//! `Result<T, ApiError>` and this is the single place status codes and
//! the `{error: <message>}` envelope get decided.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kview_core::Capability;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("malformed input: {0}")]
    BadRequest(String),
    #[error("capability denied: {0}")]
    CapabilityDenied(Capability),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("read-only: write operations are disabled")]
    ReadOnly,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("cluster client not ready: {0}")]
    ClientNotReady(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::CapabilityDenied(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ReadOnly => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ClientNotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // never let a cluster error's text carry a bearer token or cert
        // byte blob through to the client.
        let message = match &self {
            ApiError::CapabilityDenied(cap) => format!("capability denied: {}", cap.name()),
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody { error: message })).into_response()
    }
}

impl From<kview_core::cache::dynamic::DynamicCacheError> for ApiError {
    fn from(e: kview_core::cache::dynamic::DynamicCacheError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<kube::Error> for ApiError {
    fn from(e: kube::Error) -> Self {
        match &e {
            kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound(resp.reason.clone()),
            kube::Error::Api(resp) if resp.code == 409 => ApiError::Conflict(resp.reason.clone()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}
