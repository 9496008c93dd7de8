//! Service implementations
//!
//! Real implementations of the service traits. These are the ones that do
//! actual file and network I/O.

pub mod backlog;
pub mod bing;
pub mod cookies;
pub mod file_system;

#[cfg(test)]
mod tests;

pub use backlog::{compose_prompts, JsonBacklog};
pub use bing::{BingConfig, BingImageClient, DEFAULT_BING_URL};
pub use cookies::CookieDirSource;
pub use file_system::ImageDirectory;
