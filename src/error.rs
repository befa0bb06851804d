//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use thiserror::Error;

/// Startup failures. All of them abort the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid setting {name}: {value}")]
    InvalidSetting { name: &'static str, value: String },
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {path}: {message}")]
    Manifest { path: String, message: String },
    #[error("invalid primary key: entity {entity} column {column}")]
    InvalidPrimaryKey { entity: String, column: String },
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("duplicate route: {verb} {path}")]
    DuplicateRoute { verb: &'static str, path: String },
    #[error("validation: {0}")]
    Validation(String),
}

/// Explicit, expected failure carrying its own status code and reason payload.
///
/// A plain message becomes `{"message": ...}`; any other reason is sent verbatim.
#[derive(Error, Debug, Clone)]
#[error("{code}: {reason}")]
pub struct ResponseCodeError {
    pub code: StatusCode,
    pub reason: Value,
}

impl ResponseCodeError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        ResponseCodeError {
            code,
            reason: serde_json::json!({ "message": message.into() }),
        }
    }

    pub fn with_reason(code: StatusCode, reason: Value) -> Self {
        let reason = match reason {
            Value::String(s) => serde_json::json!({ "message": s }),
            other => other,
        };
        ResponseCodeError { code, reason }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Serialized reason as sent on the wire.
    pub fn body(&self) -> String {
        self.reason.to_string()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Signal(#[from] ResponseCodeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store: {0}")]
    Store(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Signal(e) => e.code,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Signal(e) => (e.code, Json(e.reason)).into_response(),
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}
