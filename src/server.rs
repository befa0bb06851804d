//! Server bootstrap: assemble the application router around the registered resources.

use crate::config::{resolve, scan_manifests, ServerConfig};
use crate::error::{AppError, ConfigError};
use crate::handlers::register_entities;
use crate::registry::{ResourceModule, ResourceRegistry};
use crate::request::{RequestFilter, BODY_LIMIT};
use crate::routes::resource_routes;
use crate::store::{EntityStore, PgEntityStore};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    services::{ServeDir, ServeFile},
};

/// Hook run on the router before or after resources are mounted.
pub type RouterHook = Box<dyn FnOnce(Router) -> Router + Send>;

#[derive(Default)]
pub struct ServerOptions {
    /// Static directory; unknown paths fall back to its `index.html`.
    pub public: Option<PathBuf>,
    pub allow_cors: bool,
    pub pre_resources: Option<RouterHook>,
    pub post_resources: Option<RouterHook>,
    /// Wraps every mounted HTTP resource.
    pub annotated_filter: Option<Arc<dyn RequestFilter>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        ServerOptions {
            public: config.public_dir.clone(),
            allow_cors: config.allow_cors,
            ..Default::default()
        }
    }
}

pub const CORS_ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept";

/// Answers preflights.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
        ])
}

/// Build the application: pre hook, resources under `/rest`, post hook, static files, then
/// the CORS and body-size layers over everything.
pub fn initialize(registry: ResourceRegistry, options: ServerOptions) -> Result<Router, ConfigError> {
    let mut app = Router::new();
    if let Some(hook) = options.pre_resources {
        app = hook(app);
    }
    app = app.merge(resource_routes(registry, options.annotated_filter)?);
    if let Some(hook) = options.post_resources {
        app = hook(app);
    }
    if let Some(public) = options.public {
        let index = public.join("index.html");
        app = app.fallback_service(ServeDir::new(&public).fallback(ServeFile::new(index)));
    }
    app = app.layer(
        ServiceBuilder::new()
            .layer(DefaultBodyLimit::max(BODY_LIMIT))
            .layer(RequestBodyLimitLayer::new(BODY_LIMIT)),
    );
    if options.allow_cors {
        // Both headers go on every response, not only on preflights.
        app = app.layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_HEADERS,
                    HeaderValue::from_static(CORS_ALLOW_HEADERS),
                ))
                .layer(cors_layer()),
        );
    }
    Ok(app)
}

pub async fn serve(app: Router, bind: SocketAddr) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind).await.map_err(|e| ConfigError::Io {
        path: bind.to_string(),
        source: e,
    })?;
    let local = listener.local_addr().unwrap_or(bind);
    tracing::info!("listening on {}", local);
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Store(format!("server stopped: {}", e)))
}

/// Scan `dir` for manifests and register their entities against `store`.
pub async fn register_manifests(
    registry: &mut ResourceRegistry,
    dir: &Path,
    store: Arc<dyn EntityStore>,
) -> Result<usize, ConfigError> {
    let found = scan_manifests(dir).await?;
    for (path, _) in &found {
        tracing::info!(path = %path.display(), "manifest loaded");
    }
    let manifests: Vec<_> = found.into_iter().map(|(_, m)| m).collect();
    let resources = resolve(&manifests)?;
    let count = resources.len();
    register_entities(registry, resources, store);
    Ok(count)
}

/// Connect, register `modules` plus manifest entities, and serve until the listener fails.
pub async fn run(config: ServerConfig, modules: &[&dyn ResourceModule], options: ServerOptions) -> Result<(), AppError> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(pool));

    let mut registry = ResourceRegistry::default();
    for module in modules {
        registry.module(*module);
    }
    if let Some(dir) = &config.manifest_dir {
        let count = register_manifests(&mut registry, dir, store.clone()).await?;
        tracing::info!(entities = count, "manifest entities registered");
    }
    let app = initialize(registry, options)?;
    serve(app, config.bind).await
}
