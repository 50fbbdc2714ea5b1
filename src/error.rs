//! Error types for the checkpoint mentor.

use std::time::Duration;

/// Errors raised while assembling the application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Errors surfaced by a mentor turn or a student operation.
///
/// Every variant except `Persistence` is raised before anything is written,
/// so the caller can retry without duplicating messages.
#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Student {id} not found")]
    StudentNotFound { id: String },

    #[error("Student {id} already exists")]
    StudentExists { id: String },

    #[error("Mentor is unavailable: {0}")]
    Generation(#[from] LlmError),

    #[error("Failed to persist turn: {0}")]
    Persistence(#[from] DatabaseError),
}

impl MentorError {
    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_))
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
