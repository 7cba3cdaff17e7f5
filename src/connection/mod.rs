pub mod auth;
pub mod config;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::core::{ClientError, Result};

/// Body of one `POST` to the GraphQL endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    pub variables: Map<String, Json>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
        }
    }

    pub fn variable(mut self, name: &str, value: Json) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<Json>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Json>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    pub fn data(data: Json) -> Self {
        Self {
            data: Some(data),
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: Some(vec![GraphQLError {
                message: message.into(),
                path: None,
            }]),
        }
    }

    /// The `data` object, or a transport error when the endpoint reported
    /// any `errors`.
    pub fn into_data(self) -> Result<Json> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .iter()
                .map(|error| error.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ClientError::Transport(message));
        }
        self.data
            .ok_or_else(|| ClientError::Transport("Response carried no data".into()))
    }
}

/// Sends GraphQL documents somewhere.
///
/// `HttpTransport` is the production implementation; tests plug in a
/// recording fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: GraphQLRequest) -> Result<GraphQLResponse>;
}
