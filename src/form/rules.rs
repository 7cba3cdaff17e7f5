//! Field validation rules (chain of responsibility per field).

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as Json;

use crate::core::{ClientError, Result};

lazy_static! {
    static ref URL_PATTERN: Regex =
        Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
    static ref HANDLE_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_.]{1,30}$").unwrap();
}

/// One check on one field value. Returns the message shown under the field.
pub trait ValidationRule: Send + Sync {
    fn validate(&self, value: &Json) -> std::result::Result<(), String>;
}

fn text(value: &Json) -> Option<&str> {
    value.as_str()
}

fn is_blank(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Value must be present and non-blank.
#[derive(Debug, Clone, Default)]
pub struct Required;

impl ValidationRule for Required {
    fn validate(&self, value: &Json) -> std::result::Result<(), String> {
        if is_blank(value) {
            Err("This field is required".to_string())
        } else {
            Ok(())
        }
    }
}

/// Text of at most N characters. Non-text values pass.
#[derive(Debug, Clone)]
pub struct MaxLength(pub usize);

impl ValidationRule for MaxLength {
    fn validate(&self, value: &Json) -> std::result::Result<(), String> {
        match text(value) {
            Some(s) if s.chars().count() > self.0 => {
                Err(format!("Must be at most {} characters", self.0))
            }
            _ => Ok(()),
        }
    }
}

/// Non-empty text must match the pattern. Empty values are left to
/// [`Required`].
#[derive(Debug, Clone)]
pub struct Matches {
    pattern: Regex,
    message: String,
}

impl Matches {
    pub fn new(pattern: &str, message: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ClientError::Configuration(format!("Invalid pattern: {}", e)))?;
        Ok(Self {
            pattern,
            message: message.to_string(),
        })
    }

    /// `http(s)://` URL
    pub fn url() -> Self {
        Self {
            pattern: URL_PATTERN.clone(),
            message: "Must be a valid URL".to_string(),
        }
    }

    /// Social handle without the leading `@`
    pub fn handle() -> Self {
        Self {
            pattern: HANDLE_PATTERN.clone(),
            message: "Must be a handle without '@'".to_string(),
        }
    }
}

impl ValidationRule for Matches {
    fn validate(&self, value: &Json) -> std::result::Result<(), String> {
        match text(value) {
            Some(s) if !s.is_empty() && !self.pattern.is_match(s) => Err(self.message.clone()),
            _ => Ok(()),
        }
    }
}

/// Rules and input handling of one field.
#[derive(Default)]
pub struct FieldOptions {
    rules: Vec<Box<dyn ValidationRule>>,
    empty_as_null: bool,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self) -> Self {
        self.rule(Required)
    }

    pub fn max_length(self, max: usize) -> Self {
        self.rule(MaxLength(max))
    }

    pub fn matches(self, rule: Matches) -> Self {
        self.rule(rule)
    }

    pub fn rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Store `""` as `null`.
    pub fn empty_as_null(mut self) -> Self {
        self.empty_as_null = true;
        self
    }

    pub(super) fn normalize(&self, value: Json) -> Json {
        match value {
            Json::String(s) if self.empty_as_null && s.is_empty() => Json::Null,
            other => other,
        }
    }

    /// First failing rule's message.
    pub(super) fn check(&self, value: &Json) -> Option<String> {
        self.rules.iter().find_map(|rule| rule.validate(value).err())
    }
}
