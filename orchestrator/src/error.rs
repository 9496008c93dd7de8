//! Orchestrator-specific error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No credentials available to start the run")]
    NoCredentials,

    #[error("Backlog is empty, nothing to process")]
    EmptyBacklog,

    #[error("Credential pool exhausted: all {evicted} credential(s) were evicted")]
    PoolExhausted { evicted: usize },

    #[error("Run interrupted, unfinished prompts were kept in the backlog")]
    Interrupted,

    #[error("Credential source error at {path}: {message}")]
    CredentialSource { path: String, message: String },

    #[error("Backlog error at {path}: {message}")]
    Backlog { path: String, message: String },

    #[error("File system operation failed: {operation} on {path}")]
    FileSystemError { operation: String, path: String },

    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: String, message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        OrchestratorError::ConfigurationError { field: field.into() }
    }

    /// True for failures that end the run rather than a single item
    pub fn is_fatal_run_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::NoCredentials
                | OrchestratorError::EmptyBacklog
                | OrchestratorError::PoolExhausted { .. }
                | OrchestratorError::Interrupted
        )
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
