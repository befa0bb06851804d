//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from an entity definition.

use crate::config::{ChildRelation, EntityDef};
use crate::store::Record;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from entity definitions).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// `$n`, cast to the column's declared type when it has one.
fn placeholder(entity: &EntityDef, column: &str, n: u32) -> String {
    entity
        .columns
        .iter()
        .find(|c| c.name == column)
        .and_then(|c| c.pg_type.as_deref())
        .map(|t| format!("${}::{}", n, t))
        .unwrap_or_else(|| format!("${}", n))
}

/// SELECT list: `*` when no columns are declared; custom enum (schema.typename) and numeric as col::text.
fn select_column_list(entity: &EntityDef) -> String {
    if entity.columns.is_empty() {
        return "*".into();
    }
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn table_of(entity: &EntityDef) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

/// SELECT with a raw condition, ordered by primary key.
pub fn select_where(entity: &EntityDef, condition: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        select_column_list(entity),
        table_of(entity),
        condition,
        quoted(&entity.primary_key)
    );
    q
}

/// SELECT by primary key; the id is the sole param.
pub fn select_by_id(entity: &EntityDef, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        table_of(entity),
        quoted(&entity.primary_key),
        placeholder(entity, &entity.primary_key, n)
    );
    q
}

/// Columns to write for `record`: declared columns in declaration order, or the record's own keys.
fn writable_columns<'a>(entity: &'a EntityDef, record: &'a Record) -> Vec<&'a str> {
    if entity.columns.is_empty() {
        record.keys().map(String::as_str).collect()
    } else {
        entity
            .columns
            .iter()
            .filter(|c| record.contains_key(&c.name) || !c.has_default)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// INSERT ... RETURNING. The primary key is written only when the record carries one.
pub fn insert(entity: &EntityDef, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let include_pk = entity.id_of(record).is_some();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for name in writable_columns(entity, record) {
        if name == entity.primary_key && !include_pk {
            continue;
        }
        let val = record.get(name).cloned().unwrap_or(Value::Null);
        let n = q.push_param(val);
        cols.push(quoted(name));
        placeholders.push(placeholder(entity, name, n));
    }
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table_of(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table_of(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET every writable column present in the record except the key.
/// Falls back to a plain SELECT by id when there is nothing to set.
pub fn update(entity: &EntityDef, id: &Value, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (k, v) in record {
        if *k == entity.primary_key || !entity.has_column(k) {
            continue;
        }
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(k), placeholder(entity, k, n)));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_param = q.push_param(id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table_of(entity),
        sets.join(", "),
        quoted(&entity.primary_key),
        placeholder(entity, &entity.primary_key, id_param),
        select_column_list(entity)
    );
    q
}

/// DELETE by id, returning the removed row.
pub fn delete(entity: &EntityDef, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        table_of(entity),
        quoted(&entity.primary_key),
        placeholder(entity, &entity.primary_key, n),
        select_column_list(entity)
    );
    q
}

/// DELETE child rows pointing at the parent id.
pub fn delete_children(entity: &EntityDef, child: &ChildRelation, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let schema = child.schema_name.as_deref().unwrap_or(&entity.schema_name);
    q.push_param(id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        qualified_table(schema, &child.table_name),
        quoted(&child.foreign_key)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PkType;
    use serde_json::json;

    fn widget() -> EntityDef {
        EntityDef::new("Widget")
            .primary_key("id", PkType::Int)
            .column("id", None)
            .column("name", None)
            .column("price", Some("numeric"))
            .child("widget_part", "widget_id")
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_all_orders_by_key() {
        let q = select_where(&widget(), "TRUE = TRUE");
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "price"::text AS "price" FROM "public"."widget" WHERE TRUE = TRUE ORDER BY "id""#
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_skips_missing_key() {
        let q = insert(&widget(), &record(json!({ "name": "bolt", "price": "1.5" })));
        assert!(q.sql.starts_with(r#"INSERT INTO "public"."widget" ("name", "price") VALUES ($1, $2::numeric)"#));
        assert_eq!(q.params, vec![json!("bolt"), json!("1.5")]);
    }

    #[test]
    fn update_sets_non_key_columns_and_binds_id_last() {
        let q = update(&widget(), &json!(3), &record(json!({ "id": 3, "name": "nut", "colour": "red" })));
        assert!(q.sql.starts_with(r#"UPDATE "public"."widget" SET "name" = $1 WHERE "id" = $2"#));
        assert_eq!(q.params, vec![json!("nut"), json!(3)]);
    }

    #[test]
    fn update_leaves_untouched_columns_out_of_set() {
        let entity = EntityDef::new("Widget");
        let loaded = record(json!({ "id": 3, "name": "old", "amount": null, "owner": "ann" }));
        let mut assigned = loaded.clone();
        assigned.insert("name".into(), json!("new"));
        let patch = crate::handlers::pending_writes(&entity, &json!(3), &loaded, &assigned);
        let q = update(&entity, &json!(3), &patch);
        assert!(q.sql.starts_with(r#"UPDATE "public"."widget" SET "name" = $1 WHERE "id" = $2"#));
        assert!(!q.sql.contains("amount"));
        assert!(!q.sql.contains("owner"));
        assert_eq!(q.params, vec![json!("new"), json!(3)]);
    }

    #[test]
    fn update_without_changes_selects() {
        let q = update(&widget(), &json!(3), &record(json!({ "id": 3 })));
        assert!(q.sql.starts_with("SELECT"));
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn child_delete_uses_foreign_key() {
        let e = widget();
        let q = delete_children(&e, &e.children[0], &json!(9));
        assert_eq!(q.sql, r#"DELETE FROM "public"."widget_part" WHERE "widget_id" = $1"#);
    }

    #[test]
    fn undeclared_columns_select_star() {
        let q = select_by_id(&EntityDef::new("Note").primary_key("id", PkType::Text), &json!("a"));
        assert_eq!(q.sql, r#"SELECT * FROM "public"."note" WHERE "id" = $1"#);
    }
}
