//! Shared types for the prompt orchestration system
//!
//! Contains the credential and work item model used by every component,
//! the per-attempt generation failure taxonomy, and the logging facade.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
