//! Manifest validation: unique entities, usable keys and identifiers.

use crate::config::{Manifest, PkType};
use crate::error::ConfigError;
use std::collections::HashSet;

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Validate all manifests together: entity names must be unique after lower-casing
/// because they become route segments.
pub fn validate(manifests: &[Manifest]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for entity in manifests.iter().flat_map(|m| m.entities.iter()) {
        if !is_identifier(&entity.name) {
            return Err(ConfigError::Validation(format!("invalid entity name '{}'", entity.name)));
        }
        if !names.insert(entity.name.to_lowercase()) {
            return Err(ConfigError::DuplicateEntity(entity.name.clone()));
        }
        if let Some(table) = &entity.table {
            if !is_identifier(table) {
                return Err(ConfigError::Validation(format!("invalid table name '{}'", table)));
            }
        }
        if let Some(ty) = &entity.pk_type {
            if PkType::from_name(ty).is_none() {
                return Err(ConfigError::Validation(format!(
                    "entity {}: unknown pk_type '{}'",
                    entity.name, ty
                )));
            }
        }
        if !entity.columns.is_empty() && !entity.columns.iter().any(|c| c.name() == entity.primary_key) {
            return Err(ConfigError::InvalidPrimaryKey {
                entity: entity.name.clone(),
                column: entity.primary_key.clone(),
            });
        }
        for getter in &entity.getters {
            if getter.name.is_empty() || getter.name.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "entity {}: invalid getter name '{}'",
                    entity.name, getter.name
                )));
            }
        }
        for child in &entity.children {
            if !is_identifier(&child.table) || !is_identifier(&child.foreign_key) {
                return Err(ConfigError::Validation(format!(
                    "entity {}: invalid child relation {}.{}",
                    entity.name, child.table, child.foreign_key
                )));
            }
        }
    }
    Ok(())
}
