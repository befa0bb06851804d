//! Persistence seam used by auto-CRUD handlers: load, save, flush and remove whole records.

mod memory;
mod postgres;
pub use memory::MemoryStore;
pub use postgres::PgEntityStore;

use crate::config::EntityDef;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A persisted object as a JSON object keyed by column name.
pub type Record = Map<String, Value>;

pub type RecordPredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Which rows a load returns.
#[derive(Clone)]
pub enum LoadFilter {
    /// Raw SQL condition, e.g. `TRUE = TRUE`. Only ever taken from code or manifests.
    Sql(String),
    PrimaryKey(Value),
    Predicate(RecordPredicate),
}

/// Condition that matches every row.
pub const MATCH_ALL: &str = "TRUE = TRUE";

impl LoadFilter {
    pub fn all() -> Self {
        LoadFilter::Sql(MATCH_ALL.into())
    }
}

impl std::fmt::Debug for LoadFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadFilter::Sql(s) => f.debug_tuple("Sql").field(s).finish(),
            LoadFilter::PrimaryKey(v) => f.debug_tuple("PrimaryKey").field(v).finish(),
            LoadFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load(&self, entity: &EntityDef, filter: &LoadFilter) -> Result<Vec<Record>, AppError>;

    async fn load_by_id(&self, entity: &EntityDef, id: &Value) -> Result<Option<Record>, AppError> {
        let rows = self.load(entity, &LoadFilter::PrimaryKey(id.clone())).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a new record; returns it as stored (generated key included).
    async fn save(&self, entity: &EntityDef, record: &Record) -> Result<Record, AppError>;

    /// Write the fields present in `record` to the row keyed by its primary key. Columns not
    /// in `record` are left as stored. `None` when no such row exists.
    async fn update(&self, entity: &EntityDef, record: &Record) -> Result<Option<Record>, AppError>;

    /// Delete by key; `deep` also deletes the entity's child rows.
    async fn remove(&self, entity: &EntityDef, id: &Value, deep: bool) -> Result<Option<Record>, AppError>;

    /// A dedicated handle for one request. Must be released with [`close`](Self::close).
    async fn open_session(&self) -> Result<Arc<dyn EntityStore>, AppError>;

    async fn close(&self) {}
}
