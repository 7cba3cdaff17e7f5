//! Query text generation and response normalization.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use super::plan::QueryPlan;
use crate::cache::EntityCache;
use crate::connection::GraphQLRequest;
use crate::core::{ClientError, Identity, Result, Value};
use crate::schema::{FieldType, NODE_FIELD, Schema};

/// Nested field selection, rendered in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionTree {
    children: BTreeMap<String, SelectionTree>,
}

impl SelectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_path<'a, I>(&mut self, segments: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut node = self;
        for segment in segments {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// `{ a b { id c } }` for the object type `kind`.
    pub fn render(&self, schema: &Schema, kind: &str) -> Result<String> {
        let object = schema.object(kind)?;
        let mut parts = Vec::new();
        if object.is_keyed() && !self.children.contains_key("id") {
            parts.push("id".to_string());
        }
        for (field, child) in &self.children {
            if child.is_empty() {
                parts.push(leaf_selection(schema, kind, field)?);
                continue;
            }
            let target = schema.readable_field(kind, field)?.target().ok_or_else(|| {
                ClientError::Schema(format!(
                    "Cannot select into scalar field '{}' of '{}'",
                    field, kind
                ))
            })?;
            parts.push(format!("{} {}", field, child.render(schema, target)?));
        }
        Ok(format!("{{ {} }}", parts.join(" ")))
    }
}

/// Selection for one field requested without sub-fields.
///
/// Links to keyed types select `{ id }` only; embedded types select all of
/// their scalar fields.
pub fn leaf_selection(schema: &Schema, kind: &str, field: &str) -> Result<String> {
    let Some(target) = schema.readable_field(kind, field)?.target() else {
        return Ok(field.to_string());
    };
    let object = schema.object(target)?;
    if object.is_keyed() {
        return Ok(format!("{} {{ id }}", field));
    }
    let scalars: Vec<&str> = object.scalar_fields().collect();
    if scalars.is_empty() {
        return Err(ClientError::Schema(format!(
            "Type '{}' has no scalar fields to select",
            target
        )));
    }
    Ok(format!("{} {{ {} }}", field, scalars.join(" ")))
}

/// One batched read request plus the alias assigned to every non-root
/// identity in it.
#[derive(Debug, Clone)]
pub struct ReadDocument {
    pub request: GraphQLRequest,
    pub aliases: Vec<(String, Identity)>,
}

/// Renders the plan as a single query document.
///
/// Root fields are selected directly. Every other identity is fetched via
/// `eN: node(id: $eN) { ... on Kind { ... } }`.
pub fn read_document(schema: &Schema, plan: &QueryPlan) -> Result<ReadDocument> {
    let mut selections = Vec::new();
    let mut declarations = Vec::new();
    let mut aliases = Vec::new();
    let mut variables = Map::new();

    for (identity, fields) in plan.identities() {
        let kind = identity.kind();
        let rendered = fields
            .iter()
            .map(|field| leaf_selection(schema, kind, field))
            .collect::<Result<Vec<_>>>()?;

        if identity.is_root() {
            selections.extend(rendered);
            continue;
        }

        if !schema.has_node_lookup() {
            return Err(ClientError::Schema(format!(
                "Cannot fetch {}: the schema has no '{}' lookup",
                identity, NODE_FIELD
            )));
        }
        let alias = format!("e{}", aliases.len());
        selections.push(format!(
            "{alias}: {NODE_FIELD}(id: ${alias}) {{ ... on {kind} {{ {} }} }}",
            rendered.join(" ")
        ));
        declarations.push(format!("${}: ID!", alias));
        variables.insert(alias.clone(), Json::String(identity.id().to_string()));
        aliases.push((alias, identity.clone()));
    }

    let header = if declarations.is_empty() {
        "query Resolve".to_string()
    } else {
        format!("query Resolve({})", declarations.join(", "))
    };
    let mut request = GraphQLRequest::new(format!("{} {{ {} }}", header, selections.join(" ")));
    request.variables = variables;
    Ok(ReadDocument { request, aliases })
}

/// Turns response JSON into cache writes, guided by the schema.
pub struct Normalizer<'a> {
    schema: &'a Schema,
    cache: &'a EntityCache,
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a Schema, cache: &'a EntityCache) -> Self {
        Self { schema, cache }
    }

    /// Value of `kind.field`; nested keyed objects are merged into the cache
    /// and replaced by references.
    pub fn field(&self, kind: &str, field: &str, json: &Json) -> Result<Value> {
        let ty = self.schema.field_type(kind, field)?;
        self.value(ty, json)
    }

    fn value(&self, ty: &FieldType, json: &Json) -> Result<Value> {
        match ty {
            FieldType::Scalar => Ok(Value::from_json(json)),
            FieldType::Node => Err(ClientError::Schema(format!(
                "'{}' results are merged by the resolver, not as fields",
                NODE_FIELD
            ))),
            _ if json.is_null() => Ok(Value::Null),
            FieldType::Object(kind) => self.object(kind, json),
            FieldType::List(kind) => match json {
                Json::Array(items) => items
                    .iter()
                    .map(|item| self.object(kind, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(ClientError::Decode(format!(
                    "Expected a list of '{}', got {}",
                    kind, other
                ))),
            },
        }
    }

    /// Normalizes one object of type `kind`.
    pub fn object(&self, kind: &str, json: &Json) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        let map = json.as_object().ok_or_else(|| {
            ClientError::Decode(format!("Expected a '{}' object, got {}", kind, json))
        })?;

        if self.schema.object(kind)?.is_keyed() {
            let identity = identity_of(kind, map)?;
            let fields = self.fields(kind, map)?;
            self.cache.upsert(&identity, fields);
            Ok(Value::Ref(identity))
        } else {
            Ok(Value::Object(self.fields(kind, map)?.into_iter().collect()))
        }
    }

    /// Known fields of `map`, normalized. `id` and unknown keys such as
    /// `__typename` are skipped.
    pub fn fields(&self, kind: &str, map: &Map<String, Json>) -> Result<Vec<(String, Value)>> {
        let object = self.schema.object(kind)?;
        let mut fields = Vec::with_capacity(map.len());
        for (name, json) in map {
            if name == "id" && object.is_keyed() {
                continue;
            }
            let Some(ty) = object.field_type(name) else {
                continue;
            };
            fields.push((name.clone(), self.value(ty, json)?));
        }
        Ok(fields)
    }
}

fn identity_of(kind: &str, map: &Map<String, Json>) -> Result<Identity> {
    match map.get("id") {
        Some(Json::String(id)) => Ok(Identity::new(kind, id.as_str())),
        Some(Json::Number(id)) => Ok(Identity::new(kind, id.to_string())),
        _ => Err(ClientError::Decode(format!("'{}' object without an id", kind))),
    }
}
