use im::{OrdMap, OrdSet};

use crate::core::{Identity, Value};

/// Snapshot of one cached entity.
///
/// Field maps are persistent (`im`), so a merge produces a new `Entity` that
/// shares structure with the previous one instead of copying it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    identity: Identity,
    fields: OrdMap<String, Value>,
    stale: OrdSet<String>,
}

impl Entity {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            fields: OrdMap::new(),
            stale: OrdSet::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Cached value of `field`. `id` is always answered from the identity.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" && !self.identity.is_root() {
            return Some(Value::Text(self.identity.id().to_string()));
        }
        self.fields.get(field).cloned()
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn is_stale(&self, field: &str) -> bool {
        self.stale.contains(field)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn fields(&self) -> &OrdMap<String, Value> {
        &self.fields
    }

    pub(super) fn merged<I>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut next = self.clone();
        for (name, value) in fields {
            next.stale.remove(&name);
            next.fields.insert(name, value);
        }
        next
    }

    pub(super) fn with_stale<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut next = self.clone();
        for name in names {
            if next.fields.contains_key(name) {
                next.stale.insert(name.clone());
            }
        }
        next
    }
}
