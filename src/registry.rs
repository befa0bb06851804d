//! Resource registry: route descriptors collected at startup and mounted once.
//!
//! Modules register explicitly into a [`ResourceRegistry`] built by the caller; there is no
//! process-wide list. Descriptors are never removed.

use crate::error::AppError;
use crate::request::{Attributes, RestRequest};
use async_trait::async_trait;
use axum::extract::ws::WebSocket;
use axum::response::Response;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Prefix every resource is mounted under.
pub const REST_PREFIX: &str = "/rest";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Ws,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Delete => "delete",
            Verb::Ws => "ws",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// The owning class of a group of resources, with its optional static path prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceOwner {
    pub name: String,
    pub path: Option<String>,
}

impl ResourceOwner {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceOwner {
            name: name.into(),
            path: None,
        }
    }

    /// Set the path prefix. `None` uses the lower-cased owner name; an existing prefix is
    /// extended (`<existing>/<sub>`).
    pub fn with_path(mut self, sub: Option<&str>) -> Self {
        let sub = sub.map(str::to_string).unwrap_or_else(|| self.name.to_lowercase());
        self.path = Some(match self.path.take() {
            Some(existing) => format!("{}/{}", existing, sub),
            None => sub,
        });
        self
    }
}

pub type Callback =
    Arc<dyn Fn(RestRequest) -> BoxFuture<'static, Result<Response, AppError>> + Send + Sync>;

/// Websocket capability of an owner: receives every accepted connection.
#[async_trait]
pub trait WsHandler: Send + Sync {
    async fn on_connected(&self, req: RestRequest, socket: WebSocket);
}

#[derive(Clone)]
pub enum Handler {
    Http(Callback),
    Ws(Arc<dyn WsHandler>),
}

/// Path plus optional static attributes copied onto each request.
#[derive(Clone, Debug, Default)]
pub struct RouteOptions {
    pub path: String,
    pub attributes: Option<Attributes>,
}

impl RouteOptions {
    pub fn with_attributes(path: impl Into<String>, attributes: Attributes) -> Self {
        RouteOptions {
            path: path.into(),
            attributes: Some(attributes),
        }
    }
}

impl From<&str> for RouteOptions {
    fn from(path: &str) -> Self {
        RouteOptions {
            path: path.to_string(),
            attributes: None,
        }
    }
}

impl From<String> for RouteOptions {
    fn from(path: String) -> Self {
        RouteOptions { path, attributes: None }
    }
}

#[derive(Clone)]
pub struct ResourceDescriptor {
    pub verb: Verb,
    pub path: String,
    pub owner: ResourceOwner,
    pub handler: Handler,
    pub attributes: Option<Attributes>,
}

fn leading_slash(s: &str) -> String {
    let trimmed = s.trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl ResourceDescriptor {
    /// `/rest` + owner prefix + descriptor path, each with exactly one leading slash.
    pub fn mounted_path(&self) -> String {
        let owner = self.owner.path.as_deref().map(leading_slash).unwrap_or_default();
        format!("{}{}{}", REST_PREFIX, owner, leading_slash(&self.path))
    }
}

impl std::fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("owner", &self.owner.name)
            .finish()
    }
}

/// Something that contributes resources, e.g. one annotated type.
pub trait ResourceModule {
    fn register(&self, registry: &mut ResourceRegistry);
}

#[derive(Default)]
pub struct ResourceRegistry {
    resources: Vec<ResourceDescriptor>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, descriptor: ResourceDescriptor) {
        self.resources.push(descriptor);
    }

    pub fn module(&mut self, module: &dyn ResourceModule) -> &mut Self {
        module.register(self);
        self
    }

    fn http<F, Fut>(&mut self, verb: Verb, owner: &ResourceOwner, options: RouteOptions, callback: F)
    where
        F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, AppError>> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |req: RestRequest| callback(req).boxed());
        self.push(ResourceDescriptor {
            verb,
            path: options.path,
            owner: owner.clone(),
            handler: Handler::Http(callback),
            attributes: options.attributes,
        });
    }

    pub fn get<F, Fut>(&mut self, owner: &ResourceOwner, options: impl Into<RouteOptions>, callback: F)
    where
        F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, AppError>> + Send + 'static,
    {
        self.http(Verb::Get, owner, options.into(), callback)
    }

    pub fn post<F, Fut>(&mut self, owner: &ResourceOwner, options: impl Into<RouteOptions>, callback: F)
    where
        F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, AppError>> + Send + 'static,
    {
        self.http(Verb::Post, owner, options.into(), callback)
    }

    pub fn put<F, Fut>(&mut self, owner: &ResourceOwner, options: impl Into<RouteOptions>, callback: F)
    where
        F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, AppError>> + Send + 'static,
    {
        self.http(Verb::Put, owner, options.into(), callback)
    }

    pub fn delete<F, Fut>(&mut self, owner: &ResourceOwner, options: impl Into<RouteOptions>, callback: F)
    where
        F: Fn(RestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, AppError>> + Send + 'static,
    {
        self.http(Verb::Delete, owner, options.into(), callback)
    }

    pub fn ws(&mut self, owner: &ResourceOwner, options: impl Into<RouteOptions>, handler: Arc<dyn WsHandler>) {
        let options = options.into();
        self.push(ResourceDescriptor {
            verb: Verb::Ws,
            path: options.path,
            owner: owner.clone(),
            handler: Handler::Ws(handler),
            attributes: options.attributes,
        });
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    /// Descriptors ordered by path (lexicographic, stable for equal paths).
    pub fn into_sorted(mut self) -> Vec<ResourceDescriptor> {
        self.resources.sort_by(|a, b| a.path.cmp(&b.path));
        self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    async fn ok(_: RestRequest) -> Result<Response, AppError> {
        Ok(().into_response())
    }

    #[test]
    fn sorts_paths_lexicographically() {
        let owner = ResourceOwner::new("Thing");
        let mut registry = ResourceRegistry::new();
        registry.get(&owner, "b/x", ok);
        registry.get(&owner, "a/y", ok);
        registry.post(&owner, "a/x", ok);
        registry.get(&owner, "a/x", ok);
        let sorted = registry.into_sorted();
        let paths: Vec<_> = sorted.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["a/x", "a/x", "a/y", "b/x"]);
        assert_eq!(sorted[0].verb, Verb::Post);
        assert_eq!(sorted[1].verb, Verb::Get);
    }

    #[test]
    fn owner_path_defaults_to_lowercase_name_and_nests() {
        let owner = ResourceOwner::new("Shop").with_path(None);
        assert_eq!(owner.path.as_deref(), Some("shop"));
        let nested = owner.with_path(Some("items"));
        assert_eq!(nested.path.as_deref(), Some("shop/items"));
    }

    #[test]
    fn mounted_path_normalizes_slashes() {
        let mut registry = ResourceRegistry::new();
        let owner = ResourceOwner::new("Shop").with_path(Some("/shop"));
        registry.get(&owner, "/items", ok);
        registry.get(&owner, "", ok);
        registry.get(&ResourceOwner::new("Plain"), "status", ok);
        let paths: Vec<_> = registry.iter().map(ResourceDescriptor::mounted_path).collect();
        assert_eq!(paths, ["/rest/shop/items", "/rest/shop", "/rest/status"]);
    }
}
