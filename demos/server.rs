//! Demo server: a hand-written resource module with a websocket echo, plus auto-CRUD entities
//! from the manifests under `AUTOREST_MANIFEST_DIR`.

use async_trait::async_trait;
use autorest_sdk::{
    error::ResponseCodeError,
    initialize,
    send_json,
    serve,
    server::register_manifests,
    AppError,
    EntityStore,
    PgEntityStore,
    ResourceModule,
    ResourceOwner,
    ResourceRegistry,
    RestRequest,
    ServerConfig,
    ServerOptions,
    WsHandler,
};
use axum::extract::ws::{Message, WebSocket};
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct Greeter;

struct Echo;

#[async_trait]
impl WsHandler for Echo {
    async fn on_connected(&self, _req: RestRequest, mut socket: WebSocket) {
        while let Some(Ok(msg)) = socket.recv().await {
            if let Message::Text(text) = msg {
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn hello(req: RestRequest) -> Result<Response, AppError> {
    let name = req
        .param("name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ResponseCodeError::bad_request("name required"))?;
    send_json(json!({ "hello": name }))
}

impl ResourceModule for Greeter {
    fn register(&self, registry: &mut ResourceRegistry) {
        let owner = ResourceOwner::new("Greeter").with_path(None);
        registry.get(&owner, "hello/:name", hello);
        registry.ws(&owner, "echo", Arc::new(Echo));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("autorest_sdk=info".parse()?))
        .init();

    let config = ServerConfig::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    let store: Arc<dyn EntityStore> = Arc::new(PgEntityStore::new(pool));

    let mut registry = ResourceRegistry::new();
    registry.module(&Greeter);
    if let Some(dir) = &config.manifest_dir {
        register_manifests(&mut registry, dir, store).await?;
    }

    let app = initialize(registry, ServerOptions::from_config(&config))?;
    serve(app, config.bind).await?;
    Ok(())
}
