//! In-process [`EntityStore`] for tests and demos. Tables live in a shared map.

use crate::config::{EntityDef, PkType};
use crate::error::AppError;
use crate::store::{EntityStore, LoadFilter, Record, MATCH_ALL};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Tables = HashMap<String, Vec<Record>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    next_id: Arc<AtomicI64>,
    open_sessions: Arc<AtomicUsize>,
    session: bool,
}

fn table_key(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// Insert rows directly, bypassing key generation.
    pub fn seed(&self, entity: &EntityDef, rows: impl IntoIterator<Item = Record>) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        tables
            .entry(table_key(&entity.schema_name, &entity.table_name))
            .or_default()
            .extend(rows);
        Ok(())
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, schema: &str, table: &str) -> Vec<Record> {
        self.lock()
            .map(|t| t.get(&table_key(schema, table)).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn generate_id(&self, pk_type: &PkType) -> Value {
        match pk_type {
            PkType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            PkType::Text => Value::String((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()),
            PkType::Int | PkType::BigInt => Value::Number((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).into()),
        }
    }
}

fn is_match_all(condition: &str) -> bool {
    let normalized: String = condition.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.eq_ignore_ascii_case(MATCH_ALL)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, entity: &EntityDef, filter: &LoadFilter) -> Result<Vec<Record>, AppError> {
        let tables = self.lock()?;
        let rows = tables
            .get(&table_key(&entity.schema_name, &entity.table_name))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let pk = entity.primary_key.as_str();
        match filter {
            LoadFilter::Sql(condition) if is_match_all(condition) => Ok(rows.to_vec()),
            LoadFilter::Sql(condition) => Err(AppError::Store(format!(
                "unsupported condition for memory store: {}",
                condition
            ))),
            LoadFilter::PrimaryKey(id) => Ok(rows.iter().filter(|r| r.get(pk) == Some(id)).cloned().collect()),
            LoadFilter::Predicate(pred) => Ok(rows.iter().filter(|r| pred(*r)).cloned().collect()),
        }
    }

    async fn save(&self, entity: &EntityDef, record: &Record) -> Result<Record, AppError> {
        let mut stored = record.clone();
        if entity.id_of(&stored).is_none() {
            stored.insert(entity.primary_key.clone(), self.generate_id(&entity.pk_type));
        }
        let mut tables = self.lock()?;
        tables
            .entry(table_key(&entity.schema_name, &entity.table_name))
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &EntityDef, record: &Record) -> Result<Option<Record>, AppError> {
        let Some(id) = entity.id_of(record) else {
            return Err(AppError::Store(format!("{} has no '{}' to update by", entity.name, entity.primary_key)));
        };
        let mut tables = self.lock()?;
        let rows = tables
            .entry(table_key(&entity.schema_name, &entity.table_name))
            .or_default();
        match rows.iter_mut().find(|r| r.get(&entity.primary_key) == Some(&id)) {
            Some(row) => {
                for (k, v) in record {
                    row.insert(k.clone(), v.clone());
                }
                Ok(Some(row.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, entity: &EntityDef, id: &Value, deep: bool) -> Result<Option<Record>, AppError> {
        let mut tables = self.lock()?;
        if deep {
            for child in &entity.children {
                let schema = child.schema_name.as_deref().unwrap_or(&entity.schema_name);
                if let Some(rows) = tables.get_mut(&table_key(schema, &child.table_name)) {
                    rows.retain(|r| r.get(&child.foreign_key) != Some(id));
                }
            }
        }
        let Some(rows) = tables.get_mut(&table_key(&entity.schema_name, &entity.table_name)) else {
            return Ok(None);
        };
        let pos = rows.iter().position(|r| r.get(&entity.primary_key) == Some(id));
        Ok(pos.map(|i| rows.remove(i)))
    }

    async fn open_session(&self) -> Result<Arc<dyn EntityStore>, AppError> {
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        let mut session = self.clone();
        session.session = true;
        Ok(Arc::new(session))
    }

    async fn close(&self) {
        if self.session {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
