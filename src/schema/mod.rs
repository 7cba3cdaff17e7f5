//! Schema registry
//!
//! Describes which object types exist, which of them are keyed (normalized
//! into the entity cache by `id`), the type of every field, the root query
//! fields and the mutation operations. The resolver uses it to write query
//! text and to normalize responses without relying on `__typename`.

mod lattice;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ClientError, Result, ROOT_KIND};

/// Root field used to fetch keyed entities by id.
pub const NODE_FIELD: &str = "node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar,
    Object(String),
    List(String),
    /// Root lookup `node(id: ID!)` answering any keyed type by its id.
    Node,
}

impl FieldType {
    pub fn object(kind: &str) -> Self {
        FieldType::Object(kind.to_string())
    }

    pub fn list(kind: &str) -> Self {
        FieldType::List(kind.to_string())
    }

    /// Target object type, if the field is not a scalar.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldType::Scalar | FieldType::Node => None,
            FieldType::Object(kind) | FieldType::List(kind) => Some(kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    name: String,
    keyed: bool,
    fields: Vec<(String, FieldType)>,
}

impl ObjectType {
    /// A type whose instances carry an `id` and live in the entity cache.
    pub fn keyed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keyed: true,
            fields: vec![("id".to_string(), FieldType::Scalar)],
        }
    }

    /// A type embedded into its parent (payloads, `BuildInfo`).
    pub fn embedded(name: &str) -> Self {
        Self {
            name: name.to_string(),
            keyed: false,
            fields: Vec::new(),
        }
    }

    pub fn scalar(self, field: &str) -> Self {
        self.field(field, FieldType::Scalar)
    }

    pub fn scalars(self, fields: &[&str]) -> Self {
        fields.iter().fold(self, |object, field| object.scalar(field))
    }

    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.retain(|(existing, _)| existing != name);
        self.fields.push((name.to_string(), ty));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_keyed(&self) -> bool {
        self.keyed
    }

    pub fn field_type(&self, field: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ty)| ty)
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, ty)| *ty == FieldType::Scalar)
            .map(|(name, _)| name.as_str())
    }
}

/// A mutation root field: `operation(input: InputType!) -> PayloadType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationField {
    pub operation: String,
    pub input_type: String,
    pub payload_type: String,
}

/// Immutable after construction; cheap to clone.
#[derive(Debug, Clone)]
pub struct Schema {
    types: Arc<HashMap<String, ObjectType>>,
    mutations: Arc<HashMap<String, MutationField>>,
}

impl Schema {
    pub fn new() -> Self {
        let mut types = HashMap::new();
        types.insert(ROOT_KIND.to_string(), ObjectType::embedded(ROOT_KIND));
        Self {
            types: Arc::new(types),
            mutations: Arc::new(HashMap::new()),
        }
    }

    /// Schema of the membership application.
    pub fn lattice() -> Result<Self> {
        lattice::build()
    }

    /// Adds an object type - returns a NEW Schema.
    pub fn with_type(self, object: ObjectType) -> Result<Self> {
        if self.types.contains_key(object.name()) {
            return Err(ClientError::Schema(format!(
                "Type '{}' already registered",
                object.name()
            )));
        }
        let mut types = (*self.types).clone();
        types.insert(object.name().to_string(), object);
        Ok(Self {
            types: Arc::new(types),
            mutations: self.mutations,
        })
    }

    /// Adds a field to the root query type.
    pub fn with_root_field(self, name: &str, ty: FieldType) -> Result<Self> {
        let mut types = (*self.types).clone();
        let root = types
            .remove(ROOT_KIND)
            .ok_or_else(|| ClientError::Schema("Root type missing".into()))?;
        types.insert(ROOT_KIND.to_string(), root.field(name, ty));
        Ok(Self {
            types: Arc::new(types),
            mutations: self.mutations,
        })
    }

    /// Registers the `node(id:)` root lookup. Without it only root fields
    /// can be read lazily.
    pub fn with_node_lookup(self) -> Result<Self> {
        self.with_root_field(NODE_FIELD, FieldType::Node)
    }

    pub fn has_node_lookup(&self) -> bool {
        matches!(self.field_type(ROOT_KIND, NODE_FIELD), Ok(FieldType::Node))
    }

    pub fn with_mutation(self, operation: &str, input_type: &str, payload_type: &str) -> Result<Self> {
        if !self.types.contains_key(payload_type) {
            return Err(ClientError::Schema(format!(
                "Payload type '{}' of mutation '{}' is not registered",
                payload_type, operation
            )));
        }
        let mut mutations = (*self.mutations).clone();
        mutations.insert(
            operation.to_string(),
            MutationField {
                operation: operation.to_string(),
                input_type: input_type.to_string(),
                payload_type: payload_type.to_string(),
            },
        );
        Ok(Self {
            types: self.types,
            mutations: Arc::new(mutations),
        })
    }

    pub fn object(&self, kind: &str) -> Result<&ObjectType> {
        self.types
            .get(kind)
            .ok_or_else(|| ClientError::Schema(format!("Unknown type '{}'", kind)))
    }

    pub fn field_type(&self, kind: &str, field: &str) -> Result<&FieldType> {
        self.object(kind)?.field_type(field).ok_or_else(|| {
            ClientError::Schema(format!("Unknown field '{}' on type '{}'", field, kind))
        })
    }

    /// Like [`Schema::field_type`], but rejects fields that cannot be
    /// selected on their own, such as the `node` lookup.
    pub fn readable_field(&self, kind: &str, field: &str) -> Result<&FieldType> {
        match self.field_type(kind, field)? {
            FieldType::Node => Err(ClientError::Schema(format!(
                "Field '{}' on type '{}' is a lookup by id and cannot be read directly",
                field, kind
            ))),
            ty => Ok(ty),
        }
    }

    pub fn mutation(&self, operation: &str) -> Result<&MutationField> {
        self.mutations
            .get(operation)
            .ok_or_else(|| ClientError::Schema(format!("Unknown mutation '{}'", operation)))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_type_is_copy_on_write() {
        let base = Schema::new();
        let extended = base
            .clone()
            .with_type(ObjectType::keyed("User").scalar("email"))
            .unwrap();

        assert!(base.object("User").is_err());
        assert_eq!(
            extended.field_type("User", "email").unwrap(),
            &FieldType::Scalar
        );
        assert_eq!(extended.field_type("User", "id").unwrap(), &FieldType::Scalar);
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let schema = Schema::new().with_type(ObjectType::keyed("User")).unwrap();
        assert!(schema.with_type(ObjectType::keyed("User")).is_err());
    }

    #[test]
    fn test_root_fields_and_mutations() {
        let schema = Schema::new()
            .with_type(ObjectType::keyed("MemberRole").scalars(&["name"]))
            .unwrap()
            .with_type(ObjectType::embedded("DeletePayload").scalar("roleId"))
            .unwrap()
            .with_root_field("memberRoles", FieldType::list("MemberRole"))
            .unwrap()
            .with_mutation("deleteMemberRole", "DeleteMemberRoleInput", "DeletePayload")
            .unwrap();

        assert_eq!(
            schema.field_type(ROOT_KIND, "memberRoles").unwrap().target(),
            Some("MemberRole")
        );
        assert_eq!(
            schema.mutation("deleteMemberRole").unwrap().payload_type,
            "DeletePayload"
        );
        assert!(schema.mutation("dropEverything").is_err());
        assert!(schema.field_type("MemberRole", "color").is_err());
    }

    #[test]
    fn test_mutation_requires_payload_type() {
        assert!(
            Schema::new()
                .with_mutation("createThing", "CreateThingInput", "CreateThingPayload")
                .is_err()
        );
    }
}
