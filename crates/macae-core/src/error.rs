use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`MacaeError`].
pub type MacaeResult<T> = Result<T, MacaeError>;

/// Top-level error type shared by every MACAE crate.
///
/// Collaborator failures (store, LLM client) are carried as `Store`, `Timeout`
/// and `Client`; the orchestration boundary translates all of them into an
/// [`ErrorCode`] before anything reaches a caller.
#[derive(Error, Debug)]
pub enum MacaeError {
    /// Input rejected before any agent work started.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A plan, step, session or agent does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up (`plan`, `step`, ...).
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// No agent variant is mapped for this type string.
    #[error("Unknown agent type: {0}")]
    UnknownAgentType(String),

    /// A step or plan was asked to move to a state it cannot reach.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// An agent failed while constructing or handling a request.
    #[error("Agent error: {0}")]
    Agent(String),

    /// The backing document store failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A collaborator call exceeded its deadline.
    #[error("Timeout after {millis}ms: {operation}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        millis: u64,
    },

    /// The LLM / AI-project client failed.
    #[error("Client error: {0}")]
    Client(String),

    /// Configuration could not be parsed or is incomplete.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised while coordinating agents.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MacaeError {
    /// Shorthand for a [`MacaeError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        MacaeError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error means the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MacaeError::NotFound { .. })
    }

    /// The stable code reported to callers for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            MacaeError::Validation(_)
            | MacaeError::InvalidTransition(_)
            | MacaeError::UnknownAgentType(_) => ErrorCode::ValidationError,
            MacaeError::NotFound { .. } => ErrorCode::NotFound,
            MacaeError::Agent(_) => ErrorCode::AgentError,
            MacaeError::Orchestrator(_) => ErrorCode::TaskError,
            MacaeError::Store(_) | MacaeError::Io(_) | MacaeError::Json(_) => {
                ErrorCode::DatabaseError
            }
            MacaeError::Timeout { .. } | MacaeError::Client(_) => ErrorCode::ExternalServiceError,
            MacaeError::Config(_) => ErrorCode::ConfigurationError,
        }
    }
}

/// Error codes surfaced in structured responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed or missing input.
    ValidationError,
    /// Referenced entity does not exist.
    NotFound,
    /// An agent failed.
    AgentError,
    /// Task handling failed unexpectedly.
    TaskError,
    /// The store failed.
    DatabaseError,
    /// The project client or another external service failed.
    ExternalServiceError,
    /// Invalid configuration.
    ConfigurationError,
    /// Content screening rejected the request.
    ContentRejected,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AgentError => "AGENT_ERROR",
            ErrorCode::TaskError => "TASK_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::ContentRejected => "CONTENT_REJECTED",
        };
        f.write_str(code)
    }
}
