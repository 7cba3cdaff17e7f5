//! Field plan executor
//!
//! A `FieldPlan` lists the paths a consumer is about to read. Executing it
//! resolves them level by level: every round walks all paths as far as the
//! cache allows, lets the resolver send one batch for whatever is missing,
//! then walks again. Lists fan out, null links end a path.
//!
//! A plan can also run against a staged cache layered over the shared one,
//! which lets a mutation read its own payload before anything is committed.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value as Json};
use tracing::{Level, event};

use crate::cache::EntityCache;
use crate::core::{ClientError, Identity, Result, Value};
use crate::query::document::SelectionTree;
use crate::query::{FieldRead, QueryResolver};

/// Dotted path of field names, `"membership.role.id"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::new(path.split('.').filter(|segment| !segment.is_empty()))
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(segments: [&str; N]) -> Self {
        FieldPath::new(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Ordered list of paths to resolve together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPlan {
    paths: Vec<FieldPath>,
}

impl FieldPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, path: impl Into<FieldPath>) -> Self {
        let path = path.into();
        if !path.segments().is_empty() && !self.paths.contains(&path) {
            self.paths.push(path);
        }
        self
    }

    /// Every path of `plan`, prefixed with `prefix`.
    pub fn nested(self, prefix: &str, plan: &FieldPlan) -> Self {
        plan.paths.iter().fold(self, |acc, path| {
            let mut segments = vec![prefix.to_string()];
            segments.extend(path.segments().iter().cloned());
            acc.field(FieldPath(segments))
        })
    }

    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn selection(&self) -> SelectionTree {
        let mut tree = SelectionTree::new();
        for path in &self.paths {
            tree.insert_path(path.segments().iter().map(String::as_str));
        }
        tree
    }
}

/// Where a plan starts.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanRoot {
    /// A cached entity, including the root query holder.
    Entity(Identity),
    /// A normalized mutation payload. Fields missing from it count as
    /// failures.
    Payload {
        typename: String,
        fields: BTreeMap<String, Value>,
    },
}

impl PlanRoot {
    fn value(&self) -> Value {
        match self {
            PlanRoot::Entity(identity) => Value::Ref(identity.clone()),
            PlanRoot::Payload { fields, .. } => Value::Object(fields.clone()),
        }
    }
}

struct Walk<'a> {
    resolver: &'a QueryResolver,
    staged: Option<&'a EntityCache>,
    pending: usize,
    failure: Option<(String, ClientError)>,
}

impl<'a> Walk<'a> {
    fn fail(&mut self, path: &FieldPath, err: ClientError) {
        if self.failure.is_none() {
            self.failure = Some((path.to_string(), err));
        }
    }

    fn read(&self, identity: &Identity, field: &str) -> FieldRead {
        let staged = self
            .staged
            .and_then(|staged| staged.get(identity))
            .and_then(|entity| entity.get(field));
        match staged {
            Some(value) => FieldRead::Ready(value),
            None => self.resolver.read(identity, field),
        }
    }

    fn step(&mut self, path: &FieldPath, value: &Value, rest: &[String], out: &mut Json) {
        let Some((segment, tail)) = rest.split_first() else {
            *out = value.to_json();
            return;
        };

        match value {
            Value::Null => *out = Json::Null,
            Value::List(items) => {
                if !out.is_array() {
                    *out = Json::Array(Vec::new());
                }
                if let Json::Array(slots) = out {
                    slots.resize(items.len(), Json::Null);
                    for (item, slot) in items.iter().zip(slots.iter_mut()) {
                        self.step(path, item, rest, slot);
                    }
                }
            }
            Value::Ref(identity) => {
                let object = ensure_object(out);
                if !identity.is_root() {
                    object.insert("id".to_string(), Json::String(identity.id().to_string()));
                }
                match self.read(identity, segment) {
                    FieldRead::Ready(child) => {
                        let slot = object.entry(segment.clone()).or_insert(Json::Null);
                        self.step(path, &child, tail, slot);
                    }
                    FieldRead::Pending => self.pending += 1,
                    FieldRead::Failed(err) => self.fail(path, err),
                }
            }
            Value::Object(fields) => {
                let object = ensure_object(out);
                match fields.get(segment) {
                    Some(child) => {
                        let slot = object.entry(segment.clone()).or_insert(Json::Null);
                        self.step(path, child, tail, slot);
                    }
                    None => self.fail(
                        path,
                        ClientError::Transport(format!("Payload did not include '{}'", segment)),
                    ),
                }
            }
            scalar => self.fail(
                path,
                ClientError::Schema(format!(
                    "Cannot select '{}' of a {} value",
                    segment,
                    scalar.type_name()
                )),
            ),
        }
    }
}

fn ensure_object(out: &mut Json) -> &mut Map<String, Json> {
    if !out.is_object() {
        *out = Json::Object(Map::new());
    }
    match out {
        Json::Object(object) => object,
        _ => unreachable!("replaced with an object above"),
    }
}

/// Resolves every path of `plan` from `root`.
///
/// The result holds exactly the planned paths, plus `id` on every entity
/// object. Fails with [`ClientError::PartialResolution`] naming the first
/// failing path, but only after everything else has settled.
pub async fn resolve_plan(resolver: &QueryResolver, root: &PlanRoot, plan: &FieldPlan) -> Result<Json> {
    execute(resolver, None, root, plan).await
}

/// [`resolve_plan`], answering from `staged` first. Fields missing there are
/// read through the resolver as usual; `staged` itself is never written.
pub async fn resolve_staged(
    resolver: &QueryResolver,
    staged: &EntityCache,
    root: &PlanRoot,
    plan: &FieldPlan,
) -> Result<Json> {
    execute(resolver, Some(staged), root, plan).await
}

async fn execute(
    resolver: &QueryResolver,
    staged: Option<&EntityCache>,
    root: &PlanRoot,
    plan: &FieldPlan,
) -> Result<Json> {
    let start = root.value();
    let mut round = 0usize;
    loop {
        round += 1;
        let mut walk = Walk {
            resolver,
            staged,
            pending: 0,
            failure: None,
        };
        let mut out = Json::Object(Map::new());
        if let Value::Ref(identity) = &start {
            if !identity.is_root() {
                ensure_object(&mut out)
                    .insert("id".to_string(), Json::String(identity.id().to_string()));
            }
        }
        for path in plan.paths() {
            walk.step(path, &start, path.segments(), &mut out);
        }

        if walk.pending > 0 {
            event!(Level::TRACE, round, pending = walk.pending, "plan round waiting on fetch");
            resolver.settle().await;
            continue;
        }
        if let Some((path, err)) = walk.failure {
            return Err(ClientError::PartialResolution {
                path,
                source: Box::new(err),
            });
        }
        event!(Level::DEBUG, rounds = round, paths = plan.paths().len(), "plan resolved");
        return Ok(out);
    }
}
