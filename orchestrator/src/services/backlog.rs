//! JSON prompt backlog
//!
//! The backlog is a single JSON array of prompt strings. It is read once at
//! startup and overwritten with whatever is left when the run ends.

use std::path::{Path, PathBuf};

use shared::{worker_debug, WorkItem, WorkerId};
use tokio::fs;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::BacklogStore;

const ANGLES: &[&str] = &["", "from top-down view", "from isometric view", "from side view"];
const ILLUMINATION: &[&str] = &["bright", "dim"];
const LIGHT_SOURCES: &[&str] = &["sunlight", "florescent lights"];

/// Build the prompt grid for one subject
///
/// Every camera angle is combined with every light source and intensity;
/// each combination appears `repeats` times (each prompt yields one batch
/// of images).
pub fn compose_prompts(item: &str, repeats: usize) -> Vec<WorkItem> {
    let mut prompts = Vec::with_capacity(ANGLES.len() * LIGHT_SOURCES.len() * ILLUMINATION.len() * repeats);
    for angle in ANGLES {
        let subject = if angle.is_empty() {
            format!("realistic image of {item}")
        } else {
            format!("realistic image of {item} {angle}")
        };
        for source in LIGHT_SOURCES {
            for intensity in ILLUMINATION {
                for _ in 0..repeats {
                    prompts.push(WorkItem::new(format!(
                        "{subject} with {intensity} illumination from {source}"
                    )));
                }
            }
        }
    }
    prompts
}

/// Backlog stored as a JSON array in a single file
pub struct JsonBacklog {
    path: PathBuf,
}

impl JsonBacklog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backlog_error(&self, message: impl ToString) -> OrchestratorError {
        OrchestratorError::Backlog {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Overwrite the backlog with a freshly composed prompt grid
    pub async fn seed(&self, prompts: &[WorkItem]) -> OrchestratorResult<()> {
        self.write_back(prompts).await
    }
}

#[async_trait::async_trait]
impl BacklogStore for JsonBacklog {
    async fn load(&self) -> OrchestratorResult<Vec<WorkItem>> {
        let contents = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.backlog_error(e))?;
        let prompts: Vec<WorkItem> = serde_json::from_str(&contents).map_err(|e| self.backlog_error(e))?;

        worker_debug!(WorkerId::Orchestrator, "📖 Read {} prompt(s) from {}", prompts.len(), self.path.display());
        Ok(prompts)
    }

    async fn write_back(&self, remaining: &[WorkItem]) -> OrchestratorResult<()> {
        let contents = serde_json::to_string(remaining)?;
        fs::write(&self.path, contents)
            .await
            .map_err(|e| self.backlog_error(e))?;

        worker_debug!(WorkerId::Orchestrator, "📝 Wrote {} prompt(s) to {}", remaining.len(), self.path.display());
        Ok(())
    }
}
