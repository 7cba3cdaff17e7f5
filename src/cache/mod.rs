//! Normalized entity cache
//!
//! One `Arc<Entity>` per identity. Every write replaces the `Arc` with a new
//! merged snapshot, so consumers can detect change with `Arc::ptr_eq` and an
//! unchanged entity keeps handing out the very same object.

mod entity;

pub use entity::Entity;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{Level, event};

use crate::core::{Identity, Value};

#[derive(Clone, Default)]
pub struct EntityCache {
    entries: Arc<RwLock<HashMap<Identity, Arc<Entity>>>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &Identity) -> Option<Arc<Entity>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(identity).cloned()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(identity)
    }

    /// Field-wise merge into the entity, creating it if absent.
    ///
    /// Returns the new snapshot. An empty `fields` still creates the entry
    /// (an entity seen only as a link target) but leaves an existing one
    /// untouched.
    pub fn upsert<I>(&self, identity: &Identity, fields: I) -> Arc<Entity>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut fields = fields.into_iter().peekable();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(identity) {
            Some(existing) if fields.peek().is_none() => Arc::clone(existing),
            Some(existing) => {
                let next = Arc::new(existing.merged(fields));
                entries.insert(identity.clone(), Arc::clone(&next));
                next
            }
            None => {
                let next = Arc::new(Entity::new(identity.clone()).merged(fields));
                entries.insert(identity.clone(), Arc::clone(&next));
                next
            }
        }
    }

    pub fn remove(&self, identity: &Identity) -> Option<Arc<Entity>> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.remove(identity);
        if removed.is_some() {
            event!(Level::DEBUG, identity = %identity, "cache entry removed");
        }
        removed
    }

    /// Marks `fields` (or every cached field when `None`) stale.
    /// Returns the names that were marked.
    pub fn mark_stale(&self, identity: &Identity, fields: Option<&[String]>) -> Vec<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let Some(existing) = entries.get(identity) else {
            return Vec::new();
        };
        let names: Vec<String> = match fields {
            Some(fields) => fields
                .iter()
                .filter(|name| existing.fields().contains_key(*name))
                .cloned()
                .collect(),
            None => existing.field_names().cloned().collect(),
        };
        if !names.is_empty() {
            let next = Arc::new(existing.with_stale(names.iter()));
            entries.insert(identity.clone(), next);
        }
        names
    }

    /// Merges every entity of `staged` into this cache, field by field.
    /// Returns the number of entities written.
    pub fn commit(&self, staged: &EntityCache) -> usize {
        let entities: Vec<Arc<Entity>> = staged
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for entity in &entities {
            self.upsert(
                entity.identity(),
                entity
                    .fields()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
        }
        entities.len()
    }

    pub fn reset(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        entries.clear();
        event!(Level::INFO, entries = count, "entity cache reset");
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
