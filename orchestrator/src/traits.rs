//! Trait definitions with mockall annotations for testing
//!
//! These are the seams between the coordination core and the outside world:
//! where credentials and prompts come from, how an image is generated, and
//! where it ends up. Real implementations live in `services`.

use std::path::PathBuf;

use shared::{Credential, GeneratedImage, GenerationFailure, WorkItem};

use crate::error::OrchestratorResult;

/// Credential source abstraction for dependency injection
#[mockall::automock]
#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Load every usable credential, with ids stable for the run
    ///
    /// An empty list is not an error here; the orchestrator decides what an
    /// empty pool means.
    async fn load_credentials(&self) -> OrchestratorResult<Vec<Credential>>;
}

/// Backlog persistence abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait BacklogStore: Send + Sync {
    /// Load the pending prompts in their stored order
    async fn load(&self) -> OrchestratorResult<Vec<WorkItem>>;

    /// Replace the stored backlog with the prompts still to do
    async fn write_back(&self, remaining: &[WorkItem]) -> OrchestratorResult<()>;
}

/// Destination for generated images
#[mockall::automock]
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    /// Names of artifacts already present, used to seed output numbering
    async fn existing_names(&self) -> OrchestratorResult<Vec<String>>;

    /// Persist one generation's images under the given stem
    ///
    /// # Returns
    /// Paths written, or a `Storage` failure counted against the attempt
    async fn persist(&self, stem: &str, images: &[GeneratedImage]) -> Result<Vec<PathBuf>, GenerationFailure>;
}

/// Image generation service abstraction
///
/// One call is one attempt: it submits the prompt with the given secret,
/// waits for the result and downloads the images.
#[mockall::automock]
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, secret: &str, prompt: &str) -> Result<Vec<GeneratedImage>, GenerationFailure>;
}
