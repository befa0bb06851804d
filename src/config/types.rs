//! Raw manifest types matching the on-disk JSON format.

use serde::{Deserialize, Serialize};

/// Top-level key a manifest file must carry to be loaded. Its value is the format version.
pub const MANIFEST_MARKER: &str = "autorest";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub autorest: u32,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnConfig {
    Name(String),
    Typed {
        name: String,
        #[serde(rename = "type")]
        type_: String,
        #[serde(default)]
        has_default: bool,
    },
}

impl ColumnConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnConfig::Name(n) => n,
            ColumnConfig::Typed { name, .. } => name,
        }
    }
}

/// Rows in another table owned by this entity, removed first on deep delete.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChildConfig {
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub foreign_key: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetterEntry {
    pub key: String,
    #[serde(default)]
    pub only_when_falsy: bool,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetterConfig {
    pub name: String,
    /// `"id"`, a SQL condition, or absent for all rows.
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Defaults to the lower-cased entity name.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// `uuid`, `bigint`, `int` or `text`. Defaults to `int`.
    #[serde(default)]
    pub pk_type: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub children: Vec<ChildConfig>,
    #[serde(default)]
    pub setters: Vec<SetterEntry>,
    #[serde(default)]
    pub getters: Vec<GetterConfig>,
    #[serde(default = "default_true")]
    pub autosave: bool,
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_true() -> bool {
    true
}
