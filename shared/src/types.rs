//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identifier of a credential for the duration of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialId(u32);

impl CredentialId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization token granting one unit of concurrent access to the
/// generation service
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id: CredentialId,
    secret: String,
}

impl Credential {
    pub fn new(id: CredentialId, secret: impl Into<String>) -> Self {
        Self {
            id,
            secret: secret.into(),
        }
    }

    pub fn id(&self) -> CredentialId {
        self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// Secrets never reach the logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One text prompt waiting to be turned into images. Identity is the text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem(String);

impl WorkItem {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self(prompt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkItem {
    fn from(prompt: String) -> Self {
        Self(prompt)
    }
}

impl From<&str> for WorkItem {
    fn from(prompt: &str) -> Self {
        Self(prompt.to_string())
    }
}

/// A generated image downloaded from the service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: String,
    pub bytes: Vec<u8>,
}

/// Failure reasons for a single generation attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    /// Daily limit reached for this credential
    #[error("quota exceeded")]
    QuotaExceeded,

    /// Service rejected the credential outright
    #[error("unauthorized")]
    Unauthorized,

    /// Prompt was refused by the content filter
    #[error("prompt blocked: {0}")]
    Blocked(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("generation timed out")]
    Timeout,

    /// Images were generated but could not be persisted
    #[error("storage error: {0}")]
    Storage(String),
}

impl GenerationFailure {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, GenerationFailure::QuotaExceeded)
    }
}

/// Identifies the actor emitting a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerId {
    /// The run coordinator
    Orchestrator,
    /// A task runner, numbered from 0 in launch order
    Runner(u32),
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerId::Orchestrator => write!(f, "orchestrator"),
            WorkerId::Runner(n) => write!(f, "runner_{n}"),
        }
    }
}
