//! Mutation orchestrator
//!
//! One `MutationHandle` per operation kind. A run sends the mutation, stages
//! the payload in a scratch cache, forces the payload plan against it and
//! commits to the shared cache only once the typed payload decoded. Then it
//! fires the caller's hooks and a notification. A kind that is already pending rejects
//! further runs until it settles.

mod edit;

pub use edit::EditMutations;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

use crate::connection::GraphQLRequest;
use crate::core::{ClientError, Identity, Result, Value};
use crate::notify::{Notification, NotificationSink};
use crate::plan::{FieldPlan, PlanRoot, resolve_staged};
use crate::query::{QueryResolver, RefetchTarget};
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub fn verb(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }

    pub fn past_tense(&self) -> String {
        format!("{}d", self.verb())
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.verb())
    }
}

/// What to send for one run: the root mutation field, its input and the
/// paths to read back from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationDescriptor {
    pub operation: String,
    pub input: Json,
    pub plan: FieldPlan,
}

impl MutationDescriptor {
    pub fn new(operation: &str, input: Json, plan: FieldPlan) -> Self {
        Self {
            operation: operation.to_string(),
            input,
            plan,
        }
    }

    /// `mutation Op($input: OpInput!) { op(input: $input) { ... } }`
    pub fn document(&self, schema: &Schema) -> Result<GraphQLRequest> {
        let field = schema.mutation(&self.operation)?;
        if self.plan.is_empty() {
            return Err(ClientError::Schema(format!(
                "Mutation '{}' selects no payload fields",
                self.operation
            )));
        }
        let selection = self.plan.selection().render(schema, &field.payload_type)?;
        let query = format!(
            "mutation {}($input: {}!) {{ {}(input: $input) {} }}",
            operation_name(&self.operation),
            field.input_type,
            self.operation,
            selection
        );
        Ok(GraphQLRequest::new(query).variable("input", self.input.clone()))
    }
}

fn operation_name(operation: &str) -> String {
    let mut chars = operation.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One mutation kind.
pub trait MutationSpec: Send + Sync + 'static {
    type Args: Send + Sync;
    type Payload: DeserializeOwned + Send + Sync;

    fn action(&self) -> MutationAction;

    /// Human name used in notifications, e.g. `"member role"`.
    fn subject(&self) -> &str;

    fn describe(&self, args: &Self::Args) -> Result<MutationDescriptor>;

    /// Identity to drop from the cache once a delete succeeded.
    fn removes(&self, _args: &Self::Args, _payload: &Self::Payload) -> Option<Identity> {
        None
    }
}

/// Result of one run, handed to the caller once.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum MutationOutcome<T> {
    Success(T),
    Failure(ClientError),
}

impl<T> MutationOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            MutationOutcome::Success(payload) => Ok(payload),
            MutationOutcome::Failure(err) => Err(err),
        }
    }
}

impl<T> From<Result<T>> for MutationOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(payload) => MutationOutcome::Success(payload),
            Err(err) => MutationOutcome::Failure(err),
        }
    }
}

/// Pending flag held for the duration of one run.
struct PendingGuard {
    flag: Arc<AtomicBool>,
}

impl PendingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

type SuccessHook<P> = Arc<dyn Fn(&P) + Send + Sync>;
type CloseHook = Arc<dyn Fn() + Send + Sync>;

pub struct MutationHandle<S: MutationSpec> {
    spec: Arc<S>,
    resolver: QueryResolver,
    sink: Arc<dyn NotificationSink>,
    pending: Arc<AtomicBool>,
    refetch: Vec<RefetchTarget>,
    on_success: Option<SuccessHook<S::Payload>>,
    on_close: Option<CloseHook>,
}

impl<S: MutationSpec> Clone for MutationHandle<S> {
    fn clone(&self) -> Self {
        Self {
            spec: Arc::clone(&self.spec),
            resolver: self.resolver.clone(),
            sink: Arc::clone(&self.sink),
            pending: Arc::clone(&self.pending),
            refetch: self.refetch.clone(),
            on_success: self.on_success.clone(),
            on_close: self.on_close.clone(),
        }
    }
}

impl<S: MutationSpec> MutationHandle<S> {
    pub fn new(spec: S, resolver: QueryResolver, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            spec: Arc::new(spec),
            resolver,
            sink,
            pending: Arc::new(AtomicBool::new(false)),
            refetch: Vec::new(),
            on_success: None,
            on_close: None,
        }
    }

    /// Reload `target` after every successful run.
    pub fn refetch(mut self, target: RefetchTarget) -> Self {
        self.refetch.push(target);
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&S::Payload) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_close<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(hook));
        self
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Runs the mutation once.
    ///
    /// A run while the same kind is pending fails with
    /// [`ClientError::Busy`] without touching the transport.
    pub async fn run(&self, args: S::Args) -> MutationOutcome<S::Payload> {
        let action = self.spec.action();
        let subject = self.spec.subject();
        let Some(_pending) = PendingGuard::acquire(&self.pending) else {
            event!(Level::DEBUG, %action, subject, "mutation rejected, already pending");
            return MutationOutcome::Failure(ClientError::Busy {
                action: action.verb().to_string(),
                subject: subject.to_string(),
            });
        };

        let span = info_span!("mutation", %action, subject, request_id = %Uuid::new_v4());
        async {
            match self.execute(&args).await {
                Ok(payload) => {
                    self.succeed(&args, &payload).await;
                    MutationOutcome::Success(payload)
                }
                Err(err) => {
                    event!(Level::WARN, error = %err, "mutation failed");
                    self.sink.notify(Notification::failure(subject, action, &err));
                    MutationOutcome::Failure(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, args: &S::Args) -> Result<S::Payload> {
        let descriptor = self.spec.describe(args)?;
        let schema = self.resolver.schema();
        let payload_type = schema.mutation(&descriptor.operation)?.payload_type.clone();
        let request = descriptor.document(schema)?;
        event!(Level::DEBUG, operation = %descriptor.operation, "sending mutation");

        let data = self.resolver.transport().execute(request).await?.into_data()?;
        let json = data
            .get(&descriptor.operation)
            .filter(|payload| !payload.is_null())
            .ok_or_else(|| {
                ClientError::Transport(format!("Mutation '{}' returned no payload", descriptor.operation))
            })?;

        let (normalized, staged) = self.resolver.stage_object(&payload_type, json)?;
        let fields = match normalized {
            Value::Object(fields) => fields,
            other => {
                return Err(ClientError::Decode(format!(
                    "Payload of '{}' normalized to a {} value",
                    descriptor.operation,
                    other.type_name()
                )));
            }
        };

        let root = PlanRoot::Payload {
            typename: payload_type,
            fields,
        };
        let resolved = resolve_staged(&self.resolver, &staged, &root, &descriptor.plan).await?;
        let payload = serde_json::from_value(resolved)?;

        let committed = self.resolver.cache().commit(&staged);
        event!(Level::DEBUG, entities = committed, "payload committed");
        Ok(payload)
    }

    async fn succeed(&self, args: &S::Args, payload: &S::Payload) {
        if let Some(identity) = self.spec.removes(args, payload) {
            self.resolver.cache().remove(&identity);
        }
        if let Some(hook) = &self.on_success {
            hook(payload);
        }

        let refetches = self.refetch.iter().map(|target| self.resolver.refetch(target));
        for (target, result) in self.refetch.iter().zip(join_all(refetches).await) {
            if let Err(err) = result {
                event!(Level::WARN, identity = %target.identity(), error = %err, "refetch failed");
            }
        }

        self.sink
            .notify(Notification::success(self.spec.subject(), self.spec.action()));
        if let Some(hook) = &self.on_close {
            hook();
        }
    }
}
