//! # Stash Errors
//!
//! Error taxonomy for the capture-processing pipeline.
//!
//! The pipeline distinguishes five failure classes:
//! - transient collaborator failures, retried only at the queue layer
//! - degraded results, substituted with a safe default by the caller
//! - per-action failures, recorded in a single execution result
//! - stage-fatal failures, which mark a capture `Failed`
//! - mining failures, which are logged and nothing else
//!
//! Follows the same conventions as the rest of the workspace:
//! - `thiserror` for structured error definitions
//! - named fields in every message, never positional `{0}`

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when decoding structured model output.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("Response was empty")]
    Empty,

    #[error("No JSON object found in response: {excerpt}")]
    NoJsonObject { excerpt: String },

    #[error("Invalid JSON: {reason} (excerpt: {excerpt})")]
    InvalidJson { reason: String, excerpt: String },

    #[error("Schema violation on field {field}: {reason}")]
    SchemaViolation { field: String, reason: String },
}

/// Errors raised by external collaborators (LLM, extraction, vision,
/// semantic memory, calendar, notification, scheduling).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{service} transport failure: {reason}")]
    Transport { service: String, reason: String },

    #[error("{service} timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    #[error("{service} rate limited: retry after {retry_after}s")]
    RateLimited { service: String, retry_after: u64 },

    #[error("{service} returned status {status}")]
    Status { service: String, status: u16 },

    #[error("Extracted content too short: {length} characters, min {min}")]
    ContentTooShort { length: usize, min: usize },

    #[error("{service} is not configured")]
    NotConfigured { service: String },

    #[error("{service} rejected the request: {reason}")]
    Rejected { service: String, reason: String },

    #[error("Decode failure from {service}: {source}")]
    Decode {
        service: String,
        #[source]
        source: DecodeError,
    },
}

impl CollaboratorError {
    /// Whether a queue-level retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            CollaboratorError::Transport { .. }
            | CollaboratorError::Timeout { .. }
            | CollaboratorError::RateLimited { .. } => true,
            CollaboratorError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, CollaboratorError::Decode { .. })
    }

    pub fn service(&self) -> &str {
        match self {
            CollaboratorError::Transport { service, .. }
            | CollaboratorError::Timeout { service, .. }
            | CollaboratorError::RateLimited { service, .. }
            | CollaboratorError::Status { service, .. }
            | CollaboratorError::NotConfigured { service }
            | CollaboratorError::Rejected { service, .. }
            | CollaboratorError::Decode { service, .. } => service,
            CollaboratorError::ContentTooShort { .. } => "content_extraction",
        }
    }
}

/// Storage layer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Connection to {backend} failed: {reason}")]
    ConnectionError { backend: String, reason: String },

    #[error("Query on {backend} failed: {reason}")]
    QueryError { backend: String, reason: String },

    #[error("Serialization error: {error_type} - {reason}")]
    SerializationError { error_type: String, reason: String },

    #[error("Not found on {backend}:{id}")]
    NotFound { backend: String, id: String },

    #[error("Transaction on {backend} failed: {reason}")]
    TransactionError { backend: String, reason: String },

    #[error("Conflict on {backend}: {reason}")]
    Conflict { backend: String, reason: String },
}

impl StorageError {
    /// Connection and transaction failures are worth a queue retry;
    /// missing rows and bad payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::ConnectionError { .. } | StorageError::TransactionError { .. }
        )
    }
}

/// The pipeline stage in which a fatal error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Analyze,
    Plan,
    Execute,
    Learn,
    Finalize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Load => write!(f, "load"),
            Stage::Analyze => write!(f, "analyze"),
            Stage::Plan => write!(f, "plan"),
            Stage::Execute => write!(f, "execute"),
            Stage::Learn => write!(f, "learn"),
            Stage::Finalize => write!(f, "finalize"),
        }
    }
}

/// Stage-fatal pipeline errors. The only errors that move a capture to
/// `Failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Capture not found: {capture_id}")]
    CaptureNotFound { capture_id: String },

    #[error("Invalid status transition for {capture_id}: {from} to {to}")]
    InvalidTransition {
        capture_id: String,
        from: String,
        to: String,
    },

    #[error("Capture {capture_id} is already being processed")]
    AlreadyRunning { capture_id: String },

    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: Stage, reason: String },

    #[error("Run for capture {capture_id} panicked: {message}")]
    Panicked { capture_id: String, message: String },

    #[error("Storage failure during {stage}: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    #[error("Collaborator failure during {stage}: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: CollaboratorError,
    },
}

impl PipelineError {
    pub fn storage(stage: Stage, source: StorageError) -> Self {
        PipelineError::Storage { stage, source }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::StageFailed { stage, .. }
            | PipelineError::Storage { stage, .. }
            | PipelineError::Collaborator { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the queue layer should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Storage { source, .. } => source.is_transient(),
            PipelineError::Collaborator { source, .. } => source.is_transient(),
            PipelineError::AlreadyRunning { .. } => true,
            PipelineError::StageFailed { .. } => true,
            PipelineError::CaptureNotFound { .. }
            | PipelineError::InvalidTransition { .. }
            | PipelineError::Panicked { .. } => false,
        }
    }
}

/// Errors reported synchronously by `Dispatcher::submit`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Failed to enqueue capture {capture_id}: {reason}")]
    EnqueueFailed { capture_id: String, reason: String },

    #[error("Failed to spawn processing task for {capture_id}: {reason}")]
    SpawnFailed { capture_id: String, reason: String },

    #[error("Dispatcher is shutting down")]
    ShuttingDown,
}

/// Errors raised by a single action handler. Always converted into a
/// failed execution result, never propagated past the executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Invalid payload for {action}: {reason}")]
    InvalidPayload { action: String, reason: String },

    #[error("Action {action} timed out after {timeout_ms}ms")]
    Timeout { action: String, timeout_ms: u64 },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_transient_classification() {
        let timeout = CollaboratorError::Timeout {
            service: "llm".to_string(),
            timeout_ms: 30_000,
        };
        assert!(timeout.is_transient());

        let server = CollaboratorError::Status {
            service: "content_extraction".to_string(),
            status: 503,
        };
        assert!(server.is_transient());

        let not_found = CollaboratorError::Status {
            service: "content_extraction".to_string(),
            status: 404,
        };
        assert!(!not_found.is_transient());

        let decode = CollaboratorError::Decode {
            service: "llm".to_string(),
            source: DecodeError::Empty,
        };
        assert!(!decode.is_transient());
        assert!(decode.is_decode());
    }

    #[test]
    fn test_pipeline_error_stage_and_retry() {
        let err = PipelineError::storage(
            Stage::Finalize,
            StorageError::ConnectionError {
                backend: "PostgreSQL".to_string(),
                reason: "refused".to_string(),
            },
        );
        assert_eq!(err.stage(), Some(Stage::Finalize));
        assert!(err.is_retryable());

        let missing = PipelineError::CaptureNotFound {
            capture_id: "c-1".to_string(),
        };
        assert_eq!(missing.stage(), None);
        assert!(!missing.is_retryable());

        let panicked = PipelineError::Panicked {
            capture_id: "c-1".to_string(),
            message: "boom".to_string(),
        };
        assert!(!panicked.is_retryable());
        assert_eq!(panicked.to_string(), "Run for capture c-1 panicked: boom");
    }

    #[test]
    fn test_messages_use_named_fields() {
        let err = CollaboratorError::ContentTooShort { length: 12, min: 100 };
        assert_eq!(
            err.to_string(),
            "Extracted content too short: 12 characters, min 100"
        );
        assert_eq!(err.service(), "content_extraction");
    }
}
