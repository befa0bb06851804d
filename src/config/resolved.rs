//! Resolved entity definitions: what an auto-CRUD resource persists and which fields it accepts.

use crate::config::GetterConfig;
use crate::error::{AppError, ResponseCodeError};
use crate::service::SetterSchema;
use crate::store::Record;
use serde_json::Value;

/// Primary key type for parsing path, query and body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

impl PkType {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("uuid") {
            Some(PkType::Uuid)
        } else if lower.contains("bigserial") || lower.contains("bigint") {
            Some(PkType::BigInt)
        } else if lower.contains("serial") || lower.contains("int") {
            Some(PkType::Int)
        } else if lower == "text" || lower.contains("char") {
            Some(PkType::Text)
        } else {
            None
        }
    }

    /// Parse an id from a path or query segment.
    pub fn parse(&self, id_str: &str) -> Result<Value, AppError> {
        Ok(match self {
            PkType::Uuid => {
                let u = uuid::Uuid::parse_str(id_str)
                    .map_err(|_| ResponseCodeError::bad_request("invalid uuid"))?;
                Value::String(u.to_string())
            }
            PkType::BigInt | PkType::Int => {
                let n: i64 = id_str
                    .trim()
                    .parse()
                    .map_err(|_| ResponseCodeError::bad_request("invalid id"))?;
                Value::Number(n.into())
            }
            PkType::Text => Value::String(id_str.to_string()),
        })
    }

    /// Coerce an id given in a JSON body (number or string).
    pub fn coerce(&self, v: &Value) -> Result<Value, AppError> {
        match v {
            Value::String(s) => self.parse(s),
            Value::Number(n) if matches!(self, PkType::Text) => Ok(Value::String(n.to_string())),
            Value::Number(n) => n
                .as_i64()
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| ResponseCodeError::bad_request("invalid id").into()),
            _ => Err(ResponseCodeError::bad_request("invalid id").into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: Option<String>,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
}

#[derive(Clone, Debug)]
pub struct ChildRelation {
    pub schema_name: Option<String>,
    pub table_name: String,
    pub foreign_key: String,
}

/// An owning class for auto-CRUD routes: storage location, key, and assignable fields.
#[derive(Clone, Debug)]
pub struct EntityDef {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub primary_key: String,
    pub pk_type: PkType,
    /// Empty means "whatever the table has".
    pub columns: Vec<ColumnInfo>,
    pub children: Vec<ChildRelation>,
    pub setters: SetterSchema<Record>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        EntityDef {
            table_name: name.to_lowercase(),
            name,
            schema_name: "public".into(),
            primary_key: "id".into(),
            pk_type: PkType::Int,
            columns: Vec::new(),
            children: Vec::new(),
            setters: SetterSchema::new(),
        }
    }

    pub fn table(mut self, schema: impl Into<String>, table: impl Into<String>) -> Self {
        self.schema_name = schema.into();
        self.table_name = table.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>, pk_type: PkType) -> Self {
        self.primary_key = column.into();
        self.pk_type = pk_type;
        self
    }

    pub fn column(mut self, name: impl Into<String>, pg_type: Option<&str>) -> Self {
        self.columns.push(ColumnInfo {
            name: name.into(),
            pg_type: pg_type.map(str::to_string),
            has_default: false,
        });
        self
    }

    pub fn child(mut self, table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.children.push(ChildRelation {
            schema_name: None,
            table_name: table.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn setters(mut self, setters: SetterSchema<Record>) -> Self {
        self.setters = setters;
        self
    }

    /// Lower-cased name used in `auto/<segment>` routes.
    pub fn route_segment(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c.name == name)
    }

    pub fn id_of(&self, record: &Record) -> Option<Value> {
        record.get(&self.primary_key).filter(|v| !v.is_null()).cloned()
    }
}

/// A manifest entity together with the resources it asks for.
#[derive(Clone, Debug)]
pub struct EntityResource {
    pub entity: EntityDef,
    pub getters: Vec<GetterConfig>,
    pub autosave: bool,
}
