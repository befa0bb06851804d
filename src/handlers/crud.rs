//! Generic auto-CRUD resources: update, remove and create by entity, plus filtered getters.

use crate::config::EntityDef;
use crate::error::{AppError, ResponseCodeError};
use crate::registry::{ResourceOwner, ResourceRegistry};
use crate::request::RestRequest;
use crate::response::{send_json, send_text, status_only};
use crate::service::{assign, is_truthy, AssignOptions};
use crate::store::{EntityStore, LoadFilter, Record, MATCH_ALL};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;
use std::sync::Arc;

pub const ITEM_REF: &str = "itemRef";
pub const MISSING_ITEM_REF: &str = "missing 'itemRef' id key";
pub const ITEM_NOT_FOUND: &str = "didn't find object with itemRef as id";

/// Supplies the store handle a PUT request works on. It is closed when the request ends.
pub type PoolGen = Arc<dyn Fn() -> Arc<dyn EntityStore> + Send + Sync>;

#[derive(Clone, Default)]
pub struct AutosaveOptions {
    /// Defaults to a fresh session opened from the shared store per request.
    pub pool_gen: Option<PoolGen>,
}

/// `auto/<entity>` base path shared by the generated resources.
pub fn auto_path(entity: &EntityDef) -> String {
    format!("auto/{}", entity.route_segment())
}

/// Load the first match, or fail with 404 `"<Name> not found"`.
pub async fn load_one(
    store: &dyn EntityStore,
    entity: &EntityDef,
    filter: &LoadFilter,
) -> Result<Record, AppError> {
    store
        .load(entity, filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ResponseCodeError::not_found(format!("{} not found", entity.name)).into())
}

pub fn autosaveable(registry: &mut ResourceRegistry, entity: Arc<EntityDef>, store: Arc<dyn EntityStore>) {
    autosaveable_with_opts(registry, entity, store, AutosaveOptions::default())
}

/// Register PUT, DELETE and POST on `auto/<entity>`.
pub fn autosaveable_with_opts(
    registry: &mut ResourceRegistry,
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    opts: AutosaveOptions,
) {
    let owner = ResourceOwner::new(entity.name.clone());
    let path = auto_path(&entity);

    {
        let (entity, store, opts) = (entity.clone(), store.clone(), opts.clone());
        registry.put(&owner, path.clone(), move |req| {
            put_item(entity.clone(), store.clone(), opts.clone(), req)
        });
    }
    {
        let (entity, store) = (entity.clone(), store.clone());
        registry.delete(&owner, path.clone(), move |req| {
            delete_item(entity.clone(), store.clone(), req)
        });
    }
    registry.post(&owner, path, move |req| post_item(entity.clone(), store.clone(), req));
}

async fn put_item(
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    opts: AutosaveOptions,
    req: RestRequest,
) -> Result<Response, AppError> {
    let item_ref = req
        .body_field(ITEM_REF)
        .filter(|v| is_truthy(v))
        .ok_or_else(|| ResponseCodeError::bad_request(MISSING_ITEM_REF))?;
    let id = entity.pk_type.coerce(item_ref)?;
    let session = match &opts.pool_gen {
        Some(pool_gen) => pool_gen(),
        None => store.open_session().await?,
    };
    let result = update_in_session(&entity, session.as_ref(), &id, &req.body).await;
    // Released on every path, including 404 and validation failures.
    session.close().await;
    result
}

async fn update_in_session(
    entity: &EntityDef,
    session: &dyn EntityStore,
    id: &Value,
    body: &Value,
) -> Result<Response, AppError> {
    let loaded = session
        .load_by_id(entity, id)
        .await?
        .ok_or_else(|| ResponseCodeError::not_found(ITEM_NOT_FOUND))?;
    let mut obj = loaded.clone();
    if let Some(errors) = assign(&mut obj, body, &entity.setters, AssignOptions::default()).await {
        return Err(ResponseCodeError::with_reason(StatusCode::BAD_REQUEST, Value::Object(errors)).into());
    }
    let patch = pending_writes(entity, id, &loaded, &obj);
    // The row can be removed between load and update.
    let saved = session
        .update(entity, &patch)
        .await?
        .ok_or_else(|| ResponseCodeError::not_found(ITEM_NOT_FOUND))?;
    send_json(saved)
}

/// The primary key plus every field whose value differs from what was loaded.
pub fn pending_writes(entity: &EntityDef, id: &Value, loaded: &Record, assigned: &Record) -> Record {
    let mut patch = Record::new();
    patch.insert(
        entity.primary_key.clone(),
        entity.id_of(loaded).unwrap_or_else(|| id.clone()),
    );
    for (key, value) in assigned {
        if key != &entity.primary_key && loaded.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    patch
}

async fn delete_item(
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    req: RestRequest,
) -> Result<Response, AppError> {
    let item_ref = req
        .query
        .get(ITEM_REF)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResponseCodeError::bad_request(MISSING_ITEM_REF))?;
    let id = entity.pk_type.parse(item_ref)?;
    let removed = store
        .remove(&entity, &id, true)
        .await?
        .ok_or_else(|| ResponseCodeError::not_found(format!("{} not found", entity.name)))?;
    Ok(send_text(StatusCode::OK, Value::Object(removed).to_string()))
}

async fn post_item(
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    req: RestRequest,
) -> Result<Response, AppError> {
    let mut obj = Record::new();
    // Create does not reject invalid fields; they are left unset.
    if let Some(errors) = assign(&mut obj, &req.body, &entity.setters, AssignOptions::default()).await {
        tracing::warn!(entity = %entity.name, errors = ?errors, "create ignored rejected fields");
    }
    let saved = store.save(&entity, &obj).await?;
    send_json(saved)
}

pub type GetterPredicate = Arc<dyn Fn(&Record, &RestRequest) -> bool + Send + Sync>;

/// How a getter selects rows.
#[derive(Clone)]
pub enum GetterCondition {
    /// Every row (`TRUE = TRUE`).
    All,
    /// Raw SQL condition.
    Sql(String),
    /// Primary key equal to the route parameter named after the getter.
    Id,
    Predicate(GetterPredicate),
}

impl From<Option<&str>> for GetterCondition {
    fn from(condition: Option<&str>) -> Self {
        match condition {
            None => GetterCondition::All,
            Some("id") => GetterCondition::Id,
            Some(c) if c.trim().is_empty() => GetterCondition::All,
            Some(c) => GetterCondition::Sql(c.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct GetterOptions {
    pub name: String,
    pub condition: GetterCondition,
}

impl GetterOptions {
    pub fn new(name: impl Into<String>, condition: GetterCondition) -> Self {
        GetterOptions {
            name: name.into(),
            condition,
        }
    }

    /// `<name>`, or `<name>/:<name>` for id lookups.
    pub fn route(&self) -> String {
        match self.condition {
            GetterCondition::Id => format!("{}/:{}", self.name, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Register GET `auto/<entity>/<name>` returning all matching rows, 404 when none match.
pub fn getter(
    registry: &mut ResourceRegistry,
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    opts: GetterOptions,
) {
    let owner = ResourceOwner::new(entity.name.clone());
    let path = format!("{}/{}", auto_path(&entity), opts.route());
    registry.get(&owner, path, move |req| {
        get_items(entity.clone(), store.clone(), opts.clone(), req)
    });
}

fn getter_filter(entity: &EntityDef, opts: &GetterOptions, req: RestRequest) -> Result<LoadFilter, AppError> {
    Ok(match &opts.condition {
        GetterCondition::All => LoadFilter::Sql(MATCH_ALL.into()),
        GetterCondition::Sql(condition) => LoadFilter::Sql(condition.clone()),
        GetterCondition::Id => {
            let raw = req
                .param(&opts.name)
                .ok_or_else(|| ResponseCodeError::bad_request(format!("missing '{}' parameter", opts.name)))?;
            LoadFilter::PrimaryKey(entity.pk_type.parse(raw)?)
        }
        GetterCondition::Predicate(pred) => {
            let pred = pred.clone();
            LoadFilter::Predicate(Arc::new(move |obj: &Record| pred(obj, &req)))
        }
    })
}

async fn get_items(
    entity: Arc<EntityDef>,
    store: Arc<dyn EntityStore>,
    opts: GetterOptions,
    req: RestRequest,
) -> Result<Response, AppError> {
    let filter = getter_filter(&entity, &opts, req)?;
    let rows = store.load(&entity, &filter).await?;
    if rows.is_empty() {
        return Ok(status_only(StatusCode::NOT_FOUND));
    }
    send_json(rows)
}
