//! Error types for the Daily Briefer.

use std::time::Duration;

/// Top-level error type for the application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("Label error: {0}")]
    Label(#[from] LabelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors. These abort the run before any network
/// activity with an actionable message.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Credentials file not found at {path}. Run the OAuth setup first.")]
    CredentialsNotFound { path: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Google OAuth errors. Scope and expiry are typed variants so callers
/// never have to string-match error messages.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Access token expired and no refresh token is available")]
    Expired,

    #[error("Stored token is missing required scope: {scope}")]
    ScopeInsufficient { scope: String },

    #[error("Token refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Token store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Data-source collaborator errors (Gmail, Calendar, Todoist, Drive).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} returned an unexpected response: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("{service} rate limited")]
    RateLimited { service: String },

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
}

/// Label reconciliation errors.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Failed to list labels: {0}")]
    List(String),

    #[error("Failed to create label {name}: {reason}")]
    Create { name: String, reason: String },

    #[error("Label {name} has no known store id")]
    UnknownLabel { name: String },

    #[error("Label mutation failed for message {message_id}: {reason}")]
    Mutation { message_id: String, reason: String },
}

/// Narrative-generation (LLM) errors.
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

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Pipeline orchestration errors.
///
/// Construction errors (`Cycle`, `UnknownDependency`, `DuplicateStage`)
/// are caught when the graph is declared. `StageFailed` and `StageTimeout`
/// are runtime conditions that degrade the output rather than abort the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage graph contains a cycle involving stage {stage}")]
    Cycle { stage: String },

    #[error("Stage {stage} depends on unknown stage {dependency}")]
    UnknownDependency { stage: String, dependency: String },

    #[error("Duplicate stage id: {stage}")]
    DuplicateStage { stage: String },

    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("Stage {stage} timed out after {timeout:?}")]
    StageTimeout { stage: String, timeout: Duration },
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, Error>;
