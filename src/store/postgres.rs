//! PostgreSQL-backed [`EntityStore`] over sqlx.

use crate::config::EntityDef;
use crate::error::AppError;
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::store::{EntityStore, LoadFilter, Record};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
    /// Sessions own their pool and close it on release.
    owned: bool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        PgEntityStore { pool, owned: false }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all<'e, E>(executor: E, q: &QueryBuf) -> Result<Vec<Record>, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let rows = query.fetch_all(executor).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn fetch_optional<'e, E>(executor: E, q: &QueryBuf) -> Result<Option<Record>, AppError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let row = query.fetch_optional(executor).await?;
        Ok(row.as_ref().map(row_to_record))
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn load(&self, entity: &EntityDef, filter: &LoadFilter) -> Result<Vec<Record>, AppError> {
        match filter {
            LoadFilter::Sql(condition) => Self::fetch_all(&self.pool, &sql::select_where(entity, condition)).await,
            LoadFilter::PrimaryKey(id) => Self::fetch_all(&self.pool, &sql::select_by_id(entity, id)).await,
            LoadFilter::Predicate(pred) => {
                let rows = Self::fetch_all(&self.pool, &sql::select_where(entity, crate::store::MATCH_ALL)).await?;
                Ok(rows.into_iter().filter(|r| pred(r)).collect())
            }
        }
    }

    async fn save(&self, entity: &EntityDef, record: &Record) -> Result<Record, AppError> {
        Self::fetch_optional(&self.pool, &sql::insert(entity, record))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, entity: &EntityDef, record: &Record) -> Result<Option<Record>, AppError> {
        let id = entity
            .id_of(record)
            .ok_or_else(|| AppError::Store(format!("{} has no '{}' to update by", entity.name, entity.primary_key)))?;
        Self::fetch_optional(&self.pool, &sql::update(entity, &id, record)).await
    }

    async fn remove(&self, entity: &EntityDef, id: &Value, deep: bool) -> Result<Option<Record>, AppError> {
        let mut tx = self.pool.begin().await?;
        if deep {
            for child in &entity.children {
                let q = sql::delete_children(entity, child, id);
                tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
                let mut query = sqlx::query(&q.sql);
                for p in &q.params {
                    query = query.bind(PgBindValue::from(p));
                }
                query.execute(&mut *tx).await?;
            }
        }
        let row = Self::fetch_optional(&mut *tx, &sql::delete(entity, id)).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Opens a fresh single-connection pool with the same connect options.
    async fn open_session(&self) -> Result<Arc<dyn EntityStore>, AppError> {
        let options = (*self.pool.connect_options()).clone();
        let pool = PgPoolOptions::new().max_connections(1).connect_lazy_with(options);
        Ok(Arc::new(PgEntityStore { pool, owned: true }))
    }

    async fn close(&self) {
        if self.owned {
            self.pool.close().await;
        }
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
