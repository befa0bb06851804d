//! Mount registered resources on an axum router under `/rest`.
//!
//! HTTP resources run inside a uniform wrapper: an Error Signal becomes its own status and
//! JSON reason, anything else is logged and answered with 500. Websocket resources hand the
//! upgraded socket straight to the owner's [`WsHandler`].

use crate::error::{AppError, ConfigError, ResponseCodeError};
use crate::registry::{Callback, Handler, ResourceRegistry, Verb, WsHandler};
use crate::request::{Attributes, Next, RequestFilter, RestRequest};
use axum::{
    extract::{ws::WebSocketUpgrade, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, on, MethodFilter, MethodRouter},
    Router,
};
use futures::future::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;

/// Appended to Error Signal bodies when the request was a form post.
pub const BACK_BUTTON: &str = r#"<button onclick="history.back()">back</button>"#;

fn method_filter(verb: Verb) -> MethodFilter {
    match verb {
        Verb::Get | Verb::Ws => MethodFilter::GET,
        Verb::Post => MethodFilter::POST,
        Verb::Put => MethodFilter::PUT,
        Verb::Delete => MethodFilter::DELETE,
    }
}

/// Build the resource router. Descriptors are mounted in path order; two descriptors on the
/// same mounted path and method are rejected.
pub fn resource_routes(
    registry: ResourceRegistry,
    filter: Option<Arc<dyn RequestFilter>>,
) -> Result<Router, ConfigError> {
    let mut seen = HashSet::new();
    let mut mounted: Vec<(String, MethodRouter)> = Vec::new();
    for resource in registry.into_sorted() {
        let full_path = resource.mounted_path();
        // A websocket upgrade is a GET.
        let verb_name = match resource.verb {
            Verb::Ws => Verb::Get.as_str(),
            verb => verb.as_str(),
        };
        if !seen.insert((full_path.clone(), verb_name)) {
            return Err(ConfigError::DuplicateRoute {
                verb: verb_name,
                path: full_path,
            });
        }
        tracing::info!("adding {} with {}", full_path, resource.verb);
        let route = match resource.handler {
            Handler::Http(callback) => http_route(resource.verb, callback, resource.attributes, filter.clone()),
            Handler::Ws(handler) => ws_route(handler, resource.attributes, filter.clone()),
        };
        match mounted.iter().position(|(p, _)| *p == full_path) {
            Some(pos) => {
                let (path, existing) = mounted.remove(pos);
                mounted.insert(pos, (path, existing.merge(route)));
            }
            None => mounted.push((full_path, route)),
        }
    }
    Ok(mounted
        .into_iter()
        .fold(Router::new(), |router, (path, route)| router.route(&path, route)))
}

fn http_route(
    verb: Verb,
    callback: Callback,
    attributes: Option<Attributes>,
    filter: Option<Arc<dyn RequestFilter>>,
) -> MethodRouter {
    on(method_filter(verb), move |req: Request| {
        dispatch(callback.clone(), attributes.clone(), filter.clone(), req)
    })
}

async fn dispatch(
    callback: Callback,
    attributes: Option<Attributes>,
    filter: Option<Arc<dyn RequestFilter>>,
    req: Request,
) -> Response {
    let (parts, body) = req.into_parts();
    let mut rest = match RestRequest::from_parts(parts, body).await {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };
    rest.attributes = attributes;
    let next: Next = Box::new(move |req| run_wrapped(callback, req).boxed());
    match filter {
        Some(filter) => filter.filter(rest, next).await,
        None => next(rest).await,
    }
}

/// Run a resource callback and translate its failure into a response.
pub async fn run_wrapped(callback: Callback, req: RestRequest) -> Response {
    let form = req.is_form();
    match callback(req).await {
        Ok(response) => response,
        Err(AppError::Signal(signal)) => signal_response(&signal, form),
        Err(other) => {
            tracing::error!(error = %other, "resource failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

fn signal_response(signal: &ResponseCodeError, form: bool) -> Response {
    let mut body = signal.body();
    if form {
        body.push_str(BACK_BUTTON);
        (signal.code, [(CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
    } else {
        (signal.code, [(CONTENT_TYPE, "application/json")], body).into_response()
    }
}

fn ws_route(
    handler: Arc<dyn WsHandler>,
    attributes: Option<Attributes>,
    filter: Option<Arc<dyn RequestFilter>>,
) -> MethodRouter {
    get(move |ws: WebSocketUpgrade, req: Request| {
        let (handler, attributes, filter) = (handler.clone(), attributes.clone(), filter.clone());
        async move {
            let (parts, body) = req.into_parts();
            let mut rest = match RestRequest::from_parts(parts, body).await {
                Ok(r) => r,
                Err(e) => return e.into_response(),
            };
            rest.attributes = attributes;
            if let Some(filter) = filter {
                if !filter.admit_ws(&mut rest).await {
                    return StatusCode::FORBIDDEN.into_response();
                }
            }
            ws.on_upgrade(move |socket| async move { handler.on_connected(rest, socket).await })
        }
    })
}
