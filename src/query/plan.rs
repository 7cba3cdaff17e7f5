use std::collections::{BTreeMap, BTreeSet};

use crate::core::{FieldKey, Identity};

/// Fields requested but not yet sent, grouped by identity.
///
/// Ordered so that one batch always renders to the same document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    fields: BTreeMap<Identity, BTreeSet<String>>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the pair was already planned.
    pub fn insert(&mut self, key: FieldKey) -> bool {
        self.fields.entry(key.identity).or_default().insert(key.field)
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        self.fields
            .get(&key.identity)
            .is_some_and(|fields| fields.contains(&key.field))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of `(identity, field)` pairs.
    pub fn len(&self) -> usize {
        self.fields.values().map(BTreeSet::len).sum()
    }

    pub fn identities(&self) -> impl Iterator<Item = (&Identity, &BTreeSet<String>)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.iter().flat_map(|(identity, fields)| {
            fields
                .iter()
                .map(move |field| FieldKey::new(identity.clone(), field.clone()))
        })
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}
