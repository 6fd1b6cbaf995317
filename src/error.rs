//! Error taxonomy shared by the resolution engine and the login delegator.
//! Variants carry a stable machine code plus a human message, and map onto
//! HTTP statuses for gateways sitting in front of this crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthzError {
    /// No such user, role or workspace.
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },
    /// Policy or connector denial.
    #[error("{code}: {message}")]
    Unauthorized { code: String, message: String },
    /// Malformed query, e.g. a search without any predicate.
    #[error("{code}: {message}")]
    BadRequest { code: String, message: String },
    /// Directory or policy transport failure.
    #[error("{code}: {message}")]
    Unavailable { code: String, message: String },
    /// Concurrent creation of the same object.
    #[error("{code}: {message}")]
    Conflict { code: String, message: String },
    /// Caller cancelled the request or its deadline elapsed.
    #[error("{code}: {message}")]
    Cancelled { code: String, message: String },
    /// Invalid connector or engine configuration.
    #[error("{code}: {message}")]
    Config { code: String, message: String },
}

impl AuthzError {
    pub fn code_str(&self) -> &str {
        match self {
            AuthzError::NotFound { code, .. }
            | AuthzError::Unauthorized { code, .. }
            | AuthzError::BadRequest { code, .. }
            | AuthzError::Unavailable { code, .. }
            | AuthzError::Conflict { code, .. }
            | AuthzError::Cancelled { code, .. }
            | AuthzError::Config { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthzError::NotFound { message, .. }
            | AuthzError::Unauthorized { message, .. }
            | AuthzError::BadRequest { message, .. }
            | AuthzError::Unavailable { message, .. }
            | AuthzError::Conflict { message, .. }
            | AuthzError::Cancelled { message, .. }
            | AuthzError::Config { message, .. } => message.as_str(),
        }
    }

    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unauthorized(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn bad_request(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::BadRequest { code: code.into(), message: msg.into() } }
    pub fn unavailable(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn conflict(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::Conflict { code: code.into(), message: msg.into() } }
    pub fn cancelled(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::Cancelled { code: code.into(), message: msg.into() } }
    pub fn config(code: impl Into<String>, msg: impl Into<String>) -> Self { AuthzError::Config { code: code.into(), message: msg.into() } }

    /// Generic login failure. Callers never learn whether the bind or the
    /// policy gate rejected them; the audit trail carries that distinction.
    pub fn authentication_failed() -> Self {
        AuthzError::unauthorized("authentication_failed", "authentication failed")
    }

    pub fn is_cancelled(&self) -> bool { matches!(self, AuthzError::Cancelled { .. }) }
    pub fn is_conflict(&self) -> bool { matches!(self, AuthzError::Conflict { .. }) }
    pub fn is_not_found(&self) -> bool { matches!(self, AuthzError::NotFound { .. }) }
    pub fn is_unavailable(&self) -> bool { matches!(self, AuthzError::Unavailable { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthzError::NotFound { .. } => 404,
            AuthzError::Unauthorized { .. } => 401,
            AuthzError::BadRequest { .. } => 400,
            AuthzError::Unavailable { .. } => 503,
            AuthzError::Conflict { .. } => 409,
            AuthzError::Cancelled { .. } => 499,
            AuthzError::Config { .. } => 500,
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        AuthzError::config("invalid_json", err.to_string())
    }
}

impl From<anyhow::Error> for AuthzError {
    fn from(err: anyhow::Error) -> Self {
        // Collaborator failures without a richer type are transport failures
        AuthzError::unavailable("collaborator_error", err.to_string())
    }
}
