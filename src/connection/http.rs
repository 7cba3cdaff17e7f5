use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::auth::TokenSource;
use super::config::ClientConfig;
use super::{GraphQLRequest, GraphQLResponse, Transport};
use crate::core::{ClientError, Result};

/// `POST {query, variables}` over HTTP with an optional bearer token.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl HttpTransport {
    /// Fails with a configuration error when no endpoint can be resolved.
    pub fn new(config: &ClientConfig, tokens: Option<Arc<dyn TokenSource>>) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint()?,
            tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: GraphQLRequest) -> Result<GraphQLResponse> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&request);

        if let Some(tokens) = &self.tokens {
            if let Some(token) = tokens.bearer_token().await? {
                builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
            }
        }

        debug!("POST {} ({} bytes of query)", self.endpoint, request.query.len());
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "GraphQL endpoint returned HTTP {}",
                status
            )));
        }
        let body = response.json::<GraphQLResponse>().await?;
        Ok(body)
    }
}
