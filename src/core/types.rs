use std::fmt;

use serde::{Deserialize, Serialize};

/// Object type name of the root query.
pub const ROOT_KIND: &str = "Query";
const ROOT_ID: &str = "root";

/// Unique name of one entity instance: its GraphQL type plus node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    kind: String,
    id: String,
}

impl Identity {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Holder of root query fields (`viewer`, `memberRoles`, ...).
    pub fn root() -> Self {
        Self::new(ROOT_KIND, ROOT_ID)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.kind == ROOT_KIND
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One `(identity, field)` pair, the unit the resolver schedules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub identity: Identity,
    pub field: String,
}

impl FieldKey {
    pub fn new(identity: Identity, field: impl Into<String>) -> Self {
        Self {
            identity,
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.identity, self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_identity() {
        let root = Identity::root();
        assert!(root.is_root());
        assert!(!Identity::new("User", "u1").is_root());
        assert_eq!(root, Identity::root());
    }

    #[test]
    fn test_display() {
        let key = FieldKey::new(Identity::new("User", "u1"), "fullName");
        assert_eq!(key.to_string(), "User:u1.fullName");
    }
}
