#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lattice::{
    AuthSession, Client, ClientError, GraphQLRequest, GraphQLResponse, Notification,
    NotificationSink, Result, Transport,
};
use serde_json::Value as Json;
use tokio::sync::Semaphore;

type Responder = dyn Fn(&GraphQLRequest) -> Result<GraphQLResponse> + Send + Sync;

/// Records every request and answers with a closure.
pub struct RecordingTransport {
    requests: Mutex<Vec<GraphQLRequest>>,
    responder: Box<Responder>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&GraphQLRequest) -> Result<GraphQLResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            gate: None,
        })
    }

    /// Every request waits for one permit on `gate` before answering.
    pub fn gated<F>(gate: Arc<Semaphore>, responder: F) -> Arc<Self>
    where
        F: Fn(&GraphQLRequest) -> Result<GraphQLResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            gate: Some(gate),
        })
    }

    /// Always answers with `data`.
    pub fn answering(data: Json) -> Arc<Self> {
        Self::new(move |_| Ok(GraphQLResponse::data(data.clone())))
    }

    pub fn requests(&self) -> Vec<GraphQLRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: GraphQLRequest) -> Result<GraphQLResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| ClientError::Transport("gate closed".into()))?
                .forget();
        }
        (self.responder)(&request)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub fn client(transport: Arc<RecordingTransport>, sink: Arc<RecordingSink>) -> Client {
    Client::with_transport(transport, Arc::new(AuthSession::new()), sink).unwrap()
}
