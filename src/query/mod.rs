//! Query resolver
//!
//! Reads are synchronous: a cached field answers immediately, anything else
//! is planned and reported as pending. All fields planned during one
//! scheduling tick go out as a single batched request, fired by a task
//! spawned on the current tokio runtime that yields once before flushing.
//!
//! A field whose fetch failed stays failed until it is retried, invalidated,
//! or merged by a later response, so a failing field is never re-requested
//! in a loop.
//!
//! `reset` starts a new session: cache, plan and failure marks are dropped
//! and batches still in flight are discarded when they return.
//!
//! The resolver targets the current-thread runtime. On a multi-thread
//! runtime the spawned flush may start on another worker before the reads
//! of the same tick are done, splitting them over two requests.

pub mod document;
pub mod plan;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value as Json;
use tokio::sync::watch;
use tracing::{Instrument, Level, event, info_span};
use uuid::Uuid;

use self::document::{Normalizer, read_document};
use self::plan::QueryPlan;
use crate::cache::EntityCache;
use crate::connection::Transport;
use crate::core::{ClientError, FieldKey, Identity, Result, Value};
use crate::schema::Schema;

/// Outcome of a synchronous read.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRead {
    Ready(Value),
    Pending,
    Failed(ClientError),
}

impl FieldRead {
    pub fn is_pending(&self) -> bool {
        matches!(self, FieldRead::Pending)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldRead::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// What to reload after a mutation or on request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefetchTarget {
    /// Every cached field of the entity.
    Entity(Identity),
    /// One field, cached or not.
    Field(Identity, String),
}

impl RefetchTarget {
    pub fn root_field(field: &str) -> Self {
        RefetchTarget::Field(Identity::root(), field.to_string())
    }

    pub fn identity(&self) -> &Identity {
        match self {
            RefetchTarget::Entity(identity) | RefetchTarget::Field(identity, _) => identity,
        }
    }
}

#[derive(Default)]
struct ResolverState {
    plan: QueryPlan,
    in_flight: HashSet<FieldKey>,
    failed: HashMap<FieldKey, ClientError>,
    flush_scheduled: bool,
    /// Bumped by `reset`; batches sent under an older epoch are dropped.
    epoch: u64,
}

struct Inner {
    schema: Schema,
    cache: EntityCache,
    transport: Arc<dyn Transport>,
    state: Mutex<ResolverState>,
    /// Bumped after every flush completes.
    settled: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct QueryResolver {
    inner: Arc<Inner>,
}

impl QueryResolver {
    pub fn new(schema: Schema, cache: EntityCache, transport: Arc<dyn Transport>) -> Self {
        let (settled, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                schema,
                cache,
                transport,
                state: Mutex::new(ResolverState::default()),
                settled,
            }),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub fn cache(&self) -> &EntityCache {
        &self.inner.cache
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads one field, planning a fetch when it is not cached.
    pub fn read(&self, identity: &Identity, field: &str) -> FieldRead {
        if let Err(err) = self.inner.schema.readable_field(identity.kind(), field) {
            return FieldRead::Failed(err);
        }

        match self.inner.cache.get(identity) {
            Some(entity) if !entity.is_stale(field) => {
                if let Some(value) = entity.get(field) {
                    return FieldRead::Ready(value);
                }
            }
            Some(_) => {}
            None if field == "id" && !identity.is_root() => {
                return FieldRead::Ready(Value::Text(identity.id().to_string()));
            }
            None => {}
        }

        let key = FieldKey::new(identity.clone(), field);
        let schedule = {
            let mut state = self.state();
            if let Some(err) = state.failed.get(&key) {
                return FieldRead::Failed(err.clone());
            }
            if state.in_flight.contains(&key) || !state.plan.insert(key) {
                return FieldRead::Pending;
            }
            !std::mem::replace(&mut state.flush_scheduled, true)
        };

        if schedule {
            self.schedule_flush();
        }
        FieldRead::Pending
    }

    fn schedule_flush(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let resolver = self.clone();
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    resolver.flush().await;
                });
            }
            Err(_) => {
                // Nothing to drive the flush; callers flush explicitly.
                self.state().flush_scheduled = false;
                event!(Level::TRACE, "no runtime, flush left to the caller");
            }
        }
    }

    /// Sends everything planned so far as one request.
    ///
    /// Returns the number of `(identity, field)` pairs sent.
    pub async fn flush(&self) -> usize {
        let (batch, epoch) = {
            let mut state = self.state();
            state.flush_scheduled = false;
            let batch = state.plan.take();
            for key in batch.keys() {
                state.in_flight.insert(key);
            }
            (batch, state.epoch)
        };
        if batch.is_empty() {
            return 0;
        }

        let count = batch.len();
        let span = info_span!("resolver.flush", request_id = %Uuid::new_v4(), fields = count);
        let outcome = self.execute_batch(&batch, epoch).instrument(span).await;

        {
            let mut state = self.state();
            if state.epoch != epoch {
                event!(Level::DEBUG, fields = count, "discarded batch from a previous session");
                drop(state);
                self.inner.settled.send_modify(|cycle| *cycle += 1);
                return count;
            }
            for key in batch.keys() {
                state.in_flight.remove(&key);
            }
            match outcome {
                Ok(missing) => {
                    for key in batch.keys() {
                        state.failed.remove(&key);
                    }
                    for (key, err) in missing {
                        state.failed.insert(key, err);
                    }
                }
                Err(err) => {
                    event!(Level::WARN, error = %err, fields = count, "batched fetch failed");
                    for key in batch.keys() {
                        state.failed.insert(key, err.clone());
                    }
                }
            }
        }

        self.inner.settled.send_modify(|cycle| *cycle += 1);
        count
    }

    /// Executes one batch and merges the response.
    ///
    /// Returns the fields the response did not deliver. Nothing is merged
    /// when the resolver was reset while the request was out.
    async fn execute_batch(&self, batch: &QueryPlan, epoch: u64) -> Result<Vec<(FieldKey, ClientError)>> {
        let document = read_document(&self.inner.schema, batch)?;
        event!(Level::DEBUG, query = %document.request.query, "sending batched read");

        let data = self
            .inner
            .transport
            .execute(document.request)
            .await?
            .into_data()?;

        // Held while merging so a concurrent reset cannot interleave.
        let state = self.state();
        if state.epoch != epoch {
            return Ok(Vec::new());
        }

        let normalizer = Normalizer::new(&self.inner.schema, &self.inner.cache);
        let mut missing = Vec::new();

        for (identity, fields) in batch.identities() {
            let source = if identity.is_root() {
                Some(&data)
            } else {
                document
                    .aliases
                    .iter()
                    .find(|(_, aliased)| aliased == identity)
                    .and_then(|(alias, _)| data.get(alias))
                    .filter(|node| !node.is_null())
            };

            let Some(source) = source else {
                for field in fields {
                    missing.push((
                        FieldKey::new(identity.clone(), field.as_str()),
                        ClientError::Transport(format!("{} not found", identity)),
                    ));
                }
                continue;
            };

            let mut merged = Vec::with_capacity(fields.len());
            for field in fields {
                let key = FieldKey::new(identity.clone(), field.as_str());
                match source.get(field) {
                    Some(json) => match normalizer.field(identity.kind(), field, json) {
                        Ok(value) => merged.push((field.clone(), value)),
                        Err(err) => missing.push((key, err)),
                    },
                    None => missing.push((
                        key,
                        ClientError::Transport(format!("Response did not include '{}'", field)),
                    )),
                }
            }
            self.inner.cache.upsert(identity, merged);
        }
        drop(state);

        Ok(missing)
    }

    /// Reads a field, waiting for fetches until it is ready or failed.
    pub async fn resolve(&self, identity: &Identity, field: &str) -> Result<Value> {
        let mut settled = self.inner.settled.subscribe();
        loop {
            match self.read(identity, field) {
                FieldRead::Ready(value) => return Ok(value),
                FieldRead::Failed(err) => return Err(err),
                FieldRead::Pending => {}
            }
            if self.needs_manual_flush() {
                self.flush().await;
                continue;
            }
            settled
                .changed()
                .await
                .map_err(|_| ClientError::Transport("Resolver shut down".into()))?;
        }
    }

    /// Waits until nothing is planned or in flight.
    pub async fn settle(&self) {
        let mut settled = self.inner.settled.subscribe();
        loop {
            let (planned, in_flight) = {
                let state = self.state();
                (!state.plan.is_empty(), !state.in_flight.is_empty())
            };
            if planned {
                self.flush().await;
                continue;
            }
            if !in_flight || settled.changed().await.is_err() {
                return;
            }
        }
    }

    fn needs_manual_flush(&self) -> bool {
        let state = self.state();
        !state.plan.is_empty() && !state.flush_scheduled
    }

    /// Clears a failure mark and reads the field again.
    pub fn retry(&self, identity: &Identity, field: &str) -> FieldRead {
        self.state()
            .failed
            .remove(&FieldKey::new(identity.clone(), field));
        self.read(identity, field)
    }

    /// Marks the target stale and clears its failure marks. The next read
    /// of each affected field fetches again.
    pub fn invalidate(&self, target: &RefetchTarget) -> Vec<FieldKey> {
        let keys: Vec<FieldKey> = match target {
            RefetchTarget::Entity(identity) => self
                .inner
                .cache
                .mark_stale(identity, None)
                .into_iter()
                .map(|field| FieldKey::new(identity.clone(), field))
                .collect(),
            RefetchTarget::Field(identity, field) => {
                self.inner
                    .cache
                    .mark_stale(identity, Some(std::slice::from_ref(field)));
                vec![FieldKey::new(identity.clone(), field.as_str())]
            }
        };

        let mut state = self.state();
        match target {
            RefetchTarget::Entity(identity) => {
                state.failed.retain(|key, _| &key.identity != identity);
            }
            RefetchTarget::Field(..) => {
                for key in &keys {
                    state.failed.remove(key);
                }
            }
        }
        event!(Level::DEBUG, identity = %target.identity(), fields = keys.len(), "invalidated");
        keys
    }

    /// Invalidates the target and waits for it to be fetched again.
    pub async fn refetch(&self, target: &RefetchTarget) -> Result<()> {
        let keys = self.invalidate(target);
        for key in &keys {
            self.read(&key.identity, &key.field);
        }
        self.settle().await;

        for key in &keys {
            if let FieldRead::Failed(err) = self.read(&key.identity, &key.field) {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Normalizes a response object of type `kind` into a fresh staging
    /// cache, leaving the shared cache untouched.
    pub fn stage_object(&self, kind: &str, json: &Json) -> Result<(Value, EntityCache)> {
        let staged = EntityCache::new();
        let value = Normalizer::new(&self.inner.schema, &staged).object(kind, json)?;
        Ok((value, staged))
    }

    /// Drops the cache, the plan and every failure mark. Requests already
    /// in flight are ignored when they return.
    pub fn reset(&self) {
        {
            let mut state = self.state();
            state.epoch += 1;
            state.plan.take();
            state.in_flight.clear();
            state.failed.clear();
            self.inner.cache.reset();
            event!(Level::INFO, epoch = state.epoch, "resolver reset");
        }
        self.inner.settled.send_modify(|cycle| *cycle += 1);
    }

    pub fn is_idle(&self) -> bool {
        let state = self.state();
        state.plan.is_empty() && state.in_flight.is_empty()
    }
}
