use async_trait::async_trait;
use autorest_sdk::request::Attributes;
use autorest_sdk::{
    initialize, send_json, AppError, ConfigError, Next, Primitive, RequestFilter, ResourceModule, ResourceOwner,
    ResourceRegistry, ResponseCodeError, RestRequest, RouteOptions, ServerOptions, WsHandler,
};
use axum::body::Body;
use axum::extract::ws::WebSocket;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Library;

async fn find_book(req: RestRequest) -> Result<Response, AppError> {
    match req.param("id") {
        Some("1") => send_json(json!({ "id": 1, "title": "Dune" })),
        _ => Err(ResponseCodeError::not_found("Book not found").into()),
    }
}

async fn broken(_: RestRequest) -> Result<Response, AppError> {
    Err(AppError::Store("disk on fire".into()))
}

async fn echo_attributes(req: RestRequest) -> Result<Response, AppError> {
    let role = match req.attributes.as_ref().and_then(|a| a.get("role")) {
        Some(Primitive::String(s)) => s.clone(),
        _ => String::new(),
    };
    send_json(json!({ "role": role, "user": req.user }))
}

impl ResourceModule for Library {
    fn register(&self, registry: &mut ResourceRegistry) {
        let owner = ResourceOwner::new("Library").with_path(None);
        registry.get(&owner, "book/:id", find_book);
        registry.get(&owner, "broken", broken);
        let mut attributes = Attributes::new();
        attributes.insert("role".into(), Primitive::String("admin".into()));
        registry.get(&owner, RouteOptions::with_attributes("/admin", attributes), echo_attributes);
    }
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn library_app(options: ServerOptions) -> Router {
    let mut registry = ResourceRegistry::new();
    registry.module(&Library);
    initialize(registry, options).unwrap()
}

#[tokio::test]
async fn resources_mount_under_rest_and_owner_path() {
    let (status, body) = call(library_app(ServerOptions::default()), get_req("/rest/library/book/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "id": 1, "title": "Dune" }));

    let (status, _) = call(library_app(ServerOptions::default()), get_req("/library/book/1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signals_become_status_and_reason() {
    let (status, body) = call(library_app(ServerOptions::default()), get_req("/rest/library/book/2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "message": "Book not found" }));
}

#[tokio::test]
async fn other_failures_are_500_with_error_text() {
    let (status, body) = call(library_app(ServerOptions::default()), get_req("/rest/library/broken")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "store: disk on fire");
}

#[tokio::test]
async fn attributes_reach_the_callback() {
    let (status, body) = call(library_app(ServerOptions::default()), get_req("/rest/library/admin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "role": "admin", "user": null }));
}

struct TokenFilter;

#[async_trait]
impl RequestFilter for TokenFilter {
    async fn filter(&self, mut req: RestRequest, next: Next) -> Response {
        match req.headers.get("x-token").and_then(|v| v.to_str().ok()) {
            Some(token) => {
                req.user = Some(json!(token));
                next(req).await
            }
            None => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

#[tokio::test]
async fn filter_wraps_every_resource() {
    let options = || ServerOptions {
        annotated_filter: Some(Arc::new(TokenFilter)),
        ..Default::default()
    };
    let (status, _) = call(library_app(options()), get_req("/rest/library/admin")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/rest/library/admin")
        .header("x-token", "alice")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(library_app(options()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "role": "admin", "user": "alice" }));

    // Errors raised behind the filter are still translated.
    let request = Request::builder()
        .uri("/rest/library/book/9")
        .header("x-token", "alice")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(library_app(options()), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

struct Silent;

#[async_trait]
impl WsHandler for Silent {
    async fn on_connected(&self, _req: RestRequest, _socket: WebSocket) {}
}

#[tokio::test]
async fn duplicate_routes_are_rejected() {
    let owner = ResourceOwner::new("Library");
    let mut registry = ResourceRegistry::new();
    registry.get(&owner, "books", find_book);
    registry.get(&owner, "/books", broken);
    match initialize(registry, ServerOptions::default()) {
        Err(ConfigError::DuplicateRoute { path, .. }) => assert_eq!(path, "/rest/books"),
        other => panic!("expected duplicate route, got {:?}", other.map(|_| ())),
    }

    // A websocket occupies GET on its path.
    let mut registry = ResourceRegistry::new();
    registry.get(&owner, "live", find_book);
    registry.ws(&owner, "live", Arc::new(Silent));
    assert!(matches!(
        initialize(registry, ServerOptions::default()),
        Err(ConfigError::DuplicateRoute { .. })
    ));
}

#[tokio::test]
async fn verbs_share_a_path() {
    let owner = ResourceOwner::new("Library");
    let mut registry = ResourceRegistry::new();
    registry.get(&owner, "shelf", |_| async { send_json("listed") });
    registry.post(&owner, "shelf", |_| async { send_json("created") });
    let app = initialize(registry, ServerOptions::default()).unwrap();

    let request = Request::builder().method("POST").uri("/rest/shelf").body(Body::empty()).unwrap();
    let (status, body) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "\"created\"");
    let (_, body) = call(app, get_req("/rest/shelf")).await;
    assert_eq!(body, "\"listed\"");
}

#[tokio::test]
async fn websocket_requires_upgrade() {
    let owner = ResourceOwner::new("Library");
    let mut registry = ResourceRegistry::new();
    registry.ws(&owner, "live", Arc::new(Silent));
    let app = initialize(registry, ServerOptions::default()).unwrap();
    let (status, _) = call(app, get_req("/rest/live")).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn hooks_run_around_resources() {
    let options = ServerOptions {
        pre_resources: Some(Box::new(|router: Router| router.route("/health", get(|| async { "ok" })))),
        post_resources: Some(Box::new(|router: Router| router.route("/late", get(|| async { "late" })))),
        ..Default::default()
    };
    let app = library_app(options);
    let (status, body) = call(app.clone(), get_req("/health")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    let (status, body) = call(app, get_req("/late")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "late"));
}

#[tokio::test]
async fn cors_headers_when_enabled() {
    let cors = || ServerOptions {
        allow_cors: true,
        ..Default::default()
    };
    let expect_cors = |response: &Response| {
        assert_eq!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Origin, X-Requested-With, Content-Type, Accept"
        );
    };

    let request = Request::builder()
        .uri("/rest/library/book/1")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    expect_cors(&library_app(cors()).oneshot(request).await.unwrap());

    // Plain requests without an Origin and error responses carry them too.
    expect_cors(&library_app(cors()).oneshot(get_req("/rest/library/book/2")).await.unwrap());

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/rest/library/book/1")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
        .body(Body::empty())
        .unwrap();
    let response = library_app(cors()).oneshot(preflight).await.unwrap();
    assert!(response.status().is_success());
    expect_cors(&response);

    let response = library_app(ServerOptions::default())
        .oneshot(get_req("/rest/library/book/1"))
        .await
        .unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn public_dir_serves_files_and_spa_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>app</h1>").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
    let options = || ServerOptions {
        public: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let (status, body) = call(library_app(options()), get_req("/app.js")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "console.log(1)"));
    let (status, body) = call(library_app(options()), get_req("/some/client/route")).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "<h1>app</h1>"));
    // Resources still take precedence.
    let (status, _) = call(library_app(options()), get_req("/rest/library/book/1")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_json_is_rejected_before_the_resource() {
    let request = Request::builder()
        .uri("/rest/library/book/1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let (status, _) = call(library_app(ServerOptions::default()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn undecodable_path_parameters_are_bad_requests() {
    let (status, body) = call(library_app(ServerOptions::default()), get_req("/rest/library/book/%FF")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("UTF-8"), "unexpected body: {}", body);
}
