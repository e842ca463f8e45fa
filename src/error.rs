//! Error types for HoliGo.

use crate::journey::Milestone;

/// Top-level error type for the journey core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Journey error: {0}")]
    Journey(#[from] JourneyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Remote document store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Write rejected for {path}: {reason}")]
    WriteRejected { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid custom token: {0}")]
    InvalidToken(String),
}

/// Content-generation provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejected journey operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JourneyError {
    #[error("No signed-in session")]
    NotSignedIn,

    #[error("Milestone {0} is locked")]
    Locked(Milestone),

    #[error("Update would break journey invariant: {0}")]
    InvariantViolated(String),

    #[error("Unknown {kind}: {id}")]
    Unknown { kind: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
