use std::time::Duration;

use crate::core::{ClientError, Result};

/// Environment variable holding the browser origin, when running behind the
/// web frontend's own `/api` proxy.
pub const ORIGIN_ENV: &str = "LATTICE_ORIGIN";
/// Environment variable holding the API base URL for non-browser contexts.
pub const API_URL_ENV: &str = "LATTICE_API_URL";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the page (`https://host`), browser context only
    pub origin: Option<String>,

    /// API base URL, used when no origin is known
    pub api_url: Option<String>,

    /// Timeout of one GraphQL round trip
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            origin: None,
            api_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load from `LATTICE_ORIGIN` / `LATTICE_API_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(origin) = std::env::var(ORIGIN_ENV) {
            config = config.origin(&origin);
        }
        if let Ok(api_url) = std::env::var(API_URL_ENV) {
            config = config.api_url(&api_url);
        }
        config
    }

    pub fn origin(mut self, origin: &str) -> Self {
        self.origin = non_empty(origin);
        self
    }

    pub fn api_url(mut self, api_url: &str) -> Self {
        self.api_url = non_empty(api_url);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve the GraphQL endpoint.
    ///
    /// A browser origin wins (`{origin}/api/graphql`), then the configured
    /// base URL (`{api_url}/graphql`). Having neither is fatal.
    pub fn endpoint(&self) -> Result<String> {
        if let Some(origin) = &self.origin {
            return Ok(format!("{}/api/graphql", origin.trim_end_matches('/')));
        }
        if let Some(api_url) = &self.api_url {
            return Ok(format!("{}/graphql", api_url.trim_end_matches('/')));
        }
        Err(ClientError::Configuration(
            "Unable to determine GraphQL endpoint.".into(),
        ))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint()?;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ClientError::Configuration(format!(
                "Endpoint '{}' must use http:// or https://",
                endpoint
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "request_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_wins_over_api_url() {
        let config = ClientConfig::new()
            .api_url("http://api.internal:8080")
            .origin("https://lattice.example.com");
        assert_eq!(
            config.endpoint().unwrap(),
            "https://lattice.example.com/api/graphql"
        );
    }

    #[test]
    fn test_api_url_endpoint() {
        let config = ClientConfig::new().api_url("http://localhost:8080/");
        assert_eq!(config.endpoint().unwrap(), "http://localhost:8080/graphql");
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let err = ClientConfig::new().endpoint().unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
        assert!(ClientConfig::new().api_url("   ").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_scheme_and_zero_timeout() {
        assert!(ClientConfig::new().api_url("ftp://x").validate().is_err());
        assert!(
            ClientConfig::new()
                .api_url("http://x")
                .request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(ClientConfig::new().api_url("http://x").validate().is_ok());
    }
}
