//! Generated resources: auto-CRUD and getters for entity definitions.

pub mod crud;
pub use crud::*;

use crate::config::{EntityResource, GetterConfig};
use crate::registry::ResourceRegistry;
use crate::store::EntityStore;
use std::sync::Arc;

/// Register the resources every manifest entity asks for against one shared store.
pub fn register_entities(
    registry: &mut ResourceRegistry,
    resources: Vec<EntityResource>,
    store: Arc<dyn EntityStore>,
) {
    for resource in resources {
        let entity = Arc::new(resource.entity);
        if resource.autosave {
            autosaveable(registry, entity.clone(), store.clone());
        }
        for GetterConfig { name, condition } in resource.getters {
            let condition = GetterCondition::from(condition.as_deref());
            getter(registry, entity.clone(), store.clone(), GetterOptions::new(name, condition));
        }
    }
}
