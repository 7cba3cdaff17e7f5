// ============================================================================
// Lattice client data layer
// ============================================================================

pub mod cache;
pub mod connection;
pub mod core;
pub mod entities;
pub mod form;
pub mod mutation;
pub mod notify;
pub mod plan;
pub mod query;
pub mod schema;

use std::sync::Arc;

use serde_json::Value as Json;
use tokio::task::JoinHandle;
use tracing::{Level, event};

// Re-export main types for convenience
pub use crate::core::{ClientError, FieldErrors, FieldKey, Identity, Result, Value};
pub use cache::{Entity, EntityCache};
pub use connection::{
    GraphQLRequest, GraphQLResponse, Transport,
    auth::{AuthSession, SignedInUser, TokenSource},
    config::ClientConfig,
    http::HttpTransport,
};
pub use form::{FieldOptions, FormKey, FormOptions, FormSession, FormValues};
pub use mutation::{EditMutations, MutationAction, MutationDescriptor, MutationHandle, MutationOutcome, MutationSpec};
pub use notify::{Notification, NotificationSink, NotificationStatus, TracingSink};
pub use plan::{FieldPath, FieldPlan, PlanRoot};
pub use query::{FieldRead, QueryResolver, RefetchTarget};
pub use schema::Schema;

use entities::{
    CreateMemberRole, DeleteMemberRole, MemberRole, RegisterUser, RegisterUserInput,
    RegisterUserPayload, UpdateMemberRole, User,
};

// ============================================================================
// Client
// ============================================================================

/// One cache, one resolver and one signed-in session per process.
///
/// # Examples
///
/// ```no_run
/// use lattice::{Client, ClientConfig};
///
/// # tokio_test::block_on(async {
/// let client = Client::connect(&ClientConfig::from_env())?;
/// if let Some(viewer) = client.viewer().await? {
///     println!("signed in as {:?}", viewer.full_name);
/// }
/// # Ok::<(), lattice::ClientError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Client {
    resolver: QueryResolver,
    session: Arc<AuthSession>,
    sink: Arc<dyn NotificationSink>,
}

impl Client {
    /// HTTP client against the configured endpoint, notifying via tracing.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let session = Arc::new(AuthSession::new());
        let tokens: Arc<dyn TokenSource> = session.clone();
        let transport = HttpTransport::new(config, Some(tokens))?;
        event!(Level::INFO, endpoint = transport.endpoint(), "client connected");
        Self::with_transport(Arc::new(transport), session, Arc::new(TracingSink))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        session: Arc<AuthSession>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let resolver = QueryResolver::new(Schema::lattice()?, EntityCache::new(), transport);
        Ok(Self {
            resolver,
            session,
            sink,
        })
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &EntityCache {
        self.resolver.cache()
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn read(&self, identity: &Identity, field: &str) -> FieldRead {
        self.resolver.read(identity, field)
    }

    pub async fn resolve(&self, identity: &Identity, field: &str) -> Result<Value> {
        self.resolver.resolve(identity, field).await
    }

    pub async fn resolve_plan(&self, root: &PlanRoot, plan: &FieldPlan) -> Result<Json> {
        plan::resolve_plan(&self.resolver, root, plan).await
    }

    /// Profile of the signed-in user, `None` when anonymous.
    pub async fn viewer(&self) -> Result<Option<User>> {
        let plan = FieldPlan::new().nested("viewer", &User::profile_plan());
        let resolved = self
            .resolve_plan(&PlanRoot::Entity(Identity::root()), &plan)
            .await?;
        match resolved.get("viewer") {
            Some(viewer) if !viewer.is_null() => Ok(Some(serde_json::from_value(viewer.clone())?)),
            _ => Ok(None),
        }
    }

    pub async fn member_roles(&self) -> Result<Vec<MemberRole>> {
        let plan = FieldPlan::new().nested("memberRoles", &MemberRole::plan());
        let resolved = self
            .resolve_plan(&PlanRoot::Entity(Identity::root()), &plan)
            .await?;
        match resolved.get("memberRoles") {
            Some(roles) if !roles.is_null() => Ok(serde_json::from_value(roles.clone())?),
            _ => Ok(Vec::new()),
        }
    }

    /// Member directory.
    pub async fn users(&self) -> Result<Vec<User>> {
        let plan = FieldPlan::new().nested("users", &User::profile_plan());
        let resolved = self
            .resolve_plan(&PlanRoot::Entity(Identity::root()), &plan)
            .await?;
        match resolved.get("users") {
            Some(users) if !users.is_null() => Ok(serde_json::from_value(users.clone())?),
            _ => Ok(Vec::new()),
        }
    }

    pub fn mutation<S: MutationSpec>(&self, spec: S) -> MutationHandle<S> {
        MutationHandle::new(spec, self.resolver.clone(), Arc::clone(&self.sink))
    }

    /// Member-role editor; creates and deletes reload the role list.
    pub fn member_role_mutations(&self) -> EditMutations<CreateMemberRole, UpdateMemberRole, DeleteMemberRole> {
        let roles = RefetchTarget::root_field("memberRoles");
        EditMutations::new(
            self.mutation(CreateMemberRole).refetch(roles.clone()),
            self.mutation(UpdateMemberRole),
            self.mutation(DeleteMemberRole).refetch(roles),
        )
    }

    /// Stores the identity and registers it with the API.
    pub async fn sign_in(&self, user: SignedInUser) -> Result<RegisterUserPayload> {
        let (first_name, last_name) = user.split_name();
        let input = RegisterUserInput {
            first_name,
            last_name,
            phone: user.phone().map(str::to_string),
            photo_url: user.photo_url().map(str::to_string),
        };
        self.session.sign_in(user).await;

        let sink: Arc<dyn NotificationSink> = Arc::new(SignInNotices(Arc::clone(&self.sink)));
        let outcome = MutationHandle::new(RegisterUser, self.resolver.clone(), sink)
            .run(input)
            .await;
        if let MutationOutcome::Success(payload) = &outcome {
            event!(Level::INFO, user = %payload.user.id, new = payload.is_new_user, "registered");
        }
        outcome.into_result()
    }

    /// Clears the session and everything the resolver knows, including
    /// failures and reads still in flight.
    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.resolver.reset();
    }

    /// Token changed: drop everything when it went away, then reload the
    /// viewer.
    pub async fn handle_token_change(&self, token: Option<&str>) -> Result<()> {
        if token.is_none() {
            self.resolver.reset();
        }
        let viewer = self
            .cache()
            .get(&Identity::root())
            .and_then(|root| root.get("viewer"))
            .and_then(|viewer| viewer.as_ref_identity().cloned());
        let target = match viewer {
            Some(identity) => RefetchTarget::Entity(identity),
            None => RefetchTarget::root_field("viewer"),
        };
        self.resolver.refetch(&target).await
    }

    /// Follows the session's token feed until the session is dropped.
    pub fn watch_tokens(&self) -> JoinHandle<()> {
        let client = self.clone();
        let mut tokens = self.session.subscribe();
        tokio::spawn(async move {
            while tokens.changed().await.is_ok() {
                let token = tokens.borrow_and_update().clone();
                if let Err(err) = client.handle_token_change(token.as_deref()).await {
                    event!(Level::WARN, error = %err, "viewer refetch failed");
                }
            }
        })
    }
}

/// Registration failures surface as "Sign-in failed!"; success is silent.
struct SignInNotices(Arc<dyn NotificationSink>);

impl NotificationSink for SignInNotices {
    fn notify(&self, notification: Notification) {
        if notification.status == NotificationStatus::Error {
            self.0.notify(Notification {
                title: Some("Sign-in failed!".to_string()),
                ..notification
            });
        }
    }
}
