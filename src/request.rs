//! Request model handed to resource callbacks, and the global request filter hook.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{rejection::PathRejection, FromRequestParts, Path},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap, Method, Uri},
    response::Response,
};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Ceiling for JSON, urlencoded and text bodies.
pub const BODY_LIMIT: usize = 800 * 1024 * 1024;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Static attribute values attached to a resource descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    String(String),
    Number(f64),
    Bool(bool),
}

pub type Attributes = HashMap<String, Primitive>;

/// Decoded request passed to every resource callback.
#[derive(Clone, Debug)]
pub struct RestRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Route parameters (`:name` segments).
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// JSON body, urlencoded form as an object of strings, raw text, or null when empty.
    pub body: Value,
    pub attributes: Option<Attributes>,
    /// Set by a request filter after authentication.
    pub user: Option<Value>,
}

impl RestRequest {
    /// Build from request parts; route parameters are read from the matched path.
    pub async fn from_parts(mut parts: Parts, body: Body) -> Result<Self, AppError> {
        let params = match Path::<HashMap<String, String>>::from_request_parts(&mut parts, &()).await {
            Ok(Path(params)) => params,
            Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
            Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
        };
        let bytes = to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let body = decode_body(&parts.headers, &bytes)?;
        Ok(Self::new(parts.method, parts.uri, parts.headers, params, body))
    }

    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
        body: Value,
    ) -> Self {
        let query = uri.query().map(parse_query).unwrap_or_default();
        RestRequest {
            method,
            uri,
            headers,
            params,
            query,
            body,
            attributes: None,
            user: None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn is_form(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            == Some(FORM_CONTENT_TYPE)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Top-level body field, `None` when the body is not an object.
    pub fn body_field(&self, key: &str) -> Option<&Value> {
        self.body.as_object().and_then(|m| m.get(key))
    }
}

fn parse_query(q: &str) -> HashMap<String, String> {
    form_urlencoded::parse(q.as_bytes()).into_owned().collect()
}

fn decode_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, AppError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime == "application/json" || mime.ends_with("+json") {
        return serde_json::from_slice(bytes).map_err(|e| AppError::BadRequest(e.to_string()));
    }
    if mime == FORM_CONTENT_TYPE {
        let map: Map<String, Value> = form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Ok(Value::Object(map));
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Continuation that runs the wrapped resource callback.
pub type Next = Box<dyn FnOnce(RestRequest) -> BoxFuture<'static, Response> + Send>;

/// Intercepts every mounted request before the resource runs.
#[async_trait]
pub trait RequestFilter: Send + Sync {
    async fn filter(&self, req: RestRequest, next: Next) -> Response;

    /// Websockets cannot be wrapped; return false to refuse the upgrade.
    async fn admit_ws(&self, _req: &mut RestRequest) -> bool {
        true
    }
}
