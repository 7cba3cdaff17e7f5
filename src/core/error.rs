use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages, keyed by field name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {}", summarize(.errors))]
    Validation { errors: FieldErrors },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to resolve '{path}': {source}")]
    PartialResolution {
        path: String,
        source: Box<ClientError>,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Cannot {action} {subject}: another {action} is still in progress")]
    Busy { action: String, subject: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Human-readable message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Transport(message)
            | Self::Configuration(message)
            | Self::Schema(message)
            | Self::Decode(message) => message.clone(),
            Self::Validation { errors } => summarize(errors),
            Self::PartialResolution { source, .. } => source.detail(),
            Self::Busy { .. } => self.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::PartialResolution { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

fn summarize(errors: &FieldErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
