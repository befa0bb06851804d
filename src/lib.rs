//! Autorest SDK: declare resources on owning types and serve them under `/rest`, with
//! generated CRUD resources for persisted entities.

pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod service;
pub mod sql;
pub mod store;

pub use config::{resolve, scan_manifests, EntityDef, EntityResource, PkType, ServerConfig};
pub use error::{AppError, ConfigError, ResponseCodeError};
pub use handlers::{
    autosaveable, autosaveable_with_opts, getter, load_one, register_entities, AutosaveOptions, GetterCondition,
    GetterOptions,
};
pub use registry::{ResourceModule, ResourceOwner, ResourceRegistry, RouteOptions, Verb, WsHandler, REST_PREFIX};
pub use request::{Next, Primitive, RequestFilter, RestRequest};
pub use response::{send_json, send_json_with, send_text, status_only};
pub use routes::resource_routes;
pub use server::{initialize, run, serve, ServerOptions};
pub use service::{assign, AssignOptions, FieldAccess, FieldValidator, SetterSchema};
pub use store::{EntityStore, LoadFilter, MemoryStore, PgEntityStore, Record};
