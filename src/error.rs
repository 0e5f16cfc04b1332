//! Error types for the email assistant.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {}", keys.join(", "))]
    MissingRequired { keys: Vec<String> },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Language-model provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Server configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Language model request timed out after {}s", timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("Language model returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Language model request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid response from language model: {reason}")]
    InvalidResponse { reason: String },

    #[error("Language model returned an empty response")]
    EmptyResponse,
}

/// Draft generation failures.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// A single violated request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Email dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid request: {}", format_violations(.0))]
    Validation(Vec<FieldViolation>),

    #[error("Email service is not configured: {0}")]
    Config(#[from] ConfigError),

    #[error("No valid email addresses found in recipients")]
    NoValidRecipients,

    #[error("Could not connect to the mail server: {0}")]
    TransportConnect(String),

    #[error("Failed to send email: {0}")]
    Send(String),
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<validator::ValidationErrors> for DispatchError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    FieldViolation::new(field.to_string(), message)
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(violations)
    }
}

/// Result type alias for the server.
pub type Result<T> = std::result::Result<T, Error>;
