//! Orchestrator library for draining a prompt backlog through a pool of
//! rate-limited credentials
//!
//! Each credential drives one worker. Workers share a queue of prompts,
//! retry failed prompts with whichever credential is free next, and evict
//! credentials that keep failing. Whatever is not finished is written back
//! to the backlog at the end of the run.

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{reconcile, PoolOrchestrator, RunSummary};
pub use traits::{BacklogStore, CredentialSource, GenerationService, OutputSink};
pub use traits::{MockBacklogStore, MockCredentialSource, MockGenerationService, MockOutputSink};
