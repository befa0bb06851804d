//! Response helpers for resource callbacks.

use crate::error::AppError;
use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 200 with the value as JSON.
pub fn send_json<T: Serialize>(data: T) -> Result<Response, AppError> {
    send_json_with(StatusCode::OK, data)
}

pub fn send_json_with<T: Serialize>(status: StatusCode, data: T) -> Result<Response, AppError> {
    let value = serde_json::to_value(data)?;
    Ok((status, Json(value)).into_response())
}

/// Plain-text body with the given status.
pub fn send_text(status: StatusCode, text: impl Into<String>) -> Response {
    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], text.into()).into_response()
}

/// Status code with an empty body.
pub fn status_only(status: StatusCode) -> Response {
    status.into_response()
}
