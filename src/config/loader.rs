//! Discover manifest files under a root directory and resolve them into entity definitions.

use crate::config::resolved::{ChildRelation, ColumnInfo, EntityDef, EntityResource, PkType};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::service::{RuleValidator, SetterDescriptor, SetterSchema};
use crate::store::Record;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Recursively walk `root` and load every `*.json` file whose top-level object has the
/// `"autorest"` key. Directories are visited in name order. Any unreadable entry or
/// malformed manifest aborts the scan.
pub async fn scan_manifests(root: &Path) -> Result<Vec<(PathBuf, Manifest)>, ConfigError> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        // Symlinked directories can form cycles; each real directory is read once.
        let real = tokio::fs::canonicalize(&dir).await.map_err(|e| io_error(&dir, e))?;
        if !visited.insert(real) {
            tracing::debug!(dir = %dir.display(), "directory already scanned");
            continue;
        }
        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(&dir).await.map_err(|e| io_error(&dir, e))?;
        while let Some(entry) = rd.next_entry().await.map_err(|e| io_error(&dir, e))? {
            entries.push(entry.path());
        }
        entries.sort();
        let mut subdirs = Vec::new();
        for path in entries {
            let meta = tokio::fs::metadata(&path).await.map_err(|e| io_error(&path, e))?;
            if meta.is_dir() {
                subdirs.push(path);
            } else if meta.is_file() {
                if let Some(manifest) = load_manifest(&path).await? {
                    found.push((path, manifest));
                }
            }
        }
        // Depth-first, name order: push reversed so the smallest name pops first.
        pending.extend(subdirs.into_iter().rev());
    }
    tracing::debug!(root = %root.display(), count = found.len(), "manifests scanned");
    Ok(found)
}

async fn load_manifest(path: &Path) -> Result<Option<Manifest>, ConfigError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Ok(None);
    }
    let text = tokio::fs::read_to_string(path).await.map_err(|e| io_error(path, e))?;
    let marker = format!("\"{}\"", MANIFEST_MARKER);
    if !text.contains(&marker) {
        return Ok(None);
    }
    let malformed = |message: String| ConfigError::Manifest {
        path: path.display().to_string(),
        message,
    };
    let value: Value = serde_json::from_str(&text).map_err(|e| malformed(e.to_string()))?;
    if value.get(MANIFEST_MARKER).is_none() {
        return Ok(None);
    }
    let manifest: Manifest = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    Ok(Some(manifest))
}

/// Build entity definitions from validated manifests.
pub fn resolve(manifests: &[Manifest]) -> Result<Vec<EntityResource>, ConfigError> {
    validate(manifests)?;
    let mut out = Vec::new();
    for config in manifests.iter().flat_map(|m| m.entities.iter()) {
        let pk_type = config
            .pk_type
            .as_deref()
            .and_then(PkType::from_name)
            .unwrap_or(PkType::Int);
        let columns = config
            .columns
            .iter()
            .map(|c| match c {
                ColumnConfig::Name(name) => ColumnInfo {
                    name: name.clone(),
                    pg_type: None,
                    has_default: false,
                },
                ColumnConfig::Typed { name, type_, has_default } => ColumnInfo {
                    name: name.clone(),
                    pg_type: Some(type_.clone()),
                    has_default: *has_default,
                },
            })
            .collect();
        let children = config
            .children
            .iter()
            .map(|c| ChildRelation {
                schema_name: c.schema.clone(),
                table_name: c.table.clone(),
                foreign_key: c.foreign_key.clone(),
            })
            .collect();

        let mut setters = SetterSchema::<Record>::new();
        for entry in &config.setters {
            let validation = match &entry.validation {
                Some(rule) => {
                    let v = RuleValidator::new(entry.key.clone(), rule.clone()).map_err(|e| {
                        ConfigError::Validation(format!("entity {}: field {}: {}", config.name, entry.key, e))
                    })?;
                    Some(Arc::new(v) as Arc<dyn crate::service::FieldValidator<Record>>)
                }
                None => None,
            };
            setters.push(SetterDescriptor {
                key: entry.key.clone(),
                validation,
                only_when_falsy: entry.only_when_falsy,
            });
        }

        let mut entity = EntityDef::new(config.name.clone())
            .primary_key(config.primary_key.clone(), pk_type)
            .setters(setters);
        if let Some(table) = &config.table {
            entity.table_name = table.clone();
        }
        if let Some(schema) = &config.schema {
            entity.schema_name = schema.clone();
        }
        entity.columns = columns;
        entity.children = children;
        out.push(EntityResource {
            entity,
            getters: config.getters.clone(),
            autosave: config.autosave,
        });
    }
    Ok(out)
}
