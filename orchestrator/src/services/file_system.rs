//! Image output directory
//!
//! Generated images are written as `<stem>_<n>.jpeg`, where the stem starts
//! with the zero-padded output index. Existing `.jpeg` names seed the index
//! allocator so numbering continues across runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shared::{GeneratedImage, GenerationFailure};
use tokio::fs;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::OutputSink;

const IMAGE_EXTENSION: &str = "jpeg";

/// Output directory for generated images
pub struct ImageDirectory {
    base_dir: PathBuf,
}

impl ImageDirectory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create the directory (and parents) if it does not exist yet
    pub async fn ensure_exists(&self) -> OrchestratorResult<()> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|_| OrchestratorError::FileSystemError {
                operation: "create_dir_all".to_string(),
                path: self.base_dir.display().to_string(),
            })?;
        Ok(())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn image_path(&self, stem: &str, n: usize) -> PathBuf {
        self.base_dir.join(format!("{stem}_{n}.{IMAGE_EXTENSION}"))
    }
}

#[async_trait]
impl OutputSink for ImageDirectory {
    async fn existing_names(&self) -> OrchestratorResult<Vec<String>> {
        if !fs::try_exists(&self.base_dir).await? {
            return Ok(Vec::new());
        }

        let scan_error = |_| OrchestratorError::FileSystemError {
            operation: "read_dir".to_string(),
            path: self.base_dir.display().to_string(),
        };

        let mut entries = fs::read_dir(&self.base_dir).await.map_err(scan_error)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(scan_error)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn persist(&self, stem: &str, images: &[GeneratedImage]) -> Result<Vec<PathBuf>, GenerationFailure> {
        let mut written = Vec::with_capacity(images.len());
        for (n, image) in images.iter().enumerate() {
            let path = self.image_path(stem, n);
            fs::write(&path, &image.bytes)
                .await
                .map_err(|e| GenerationFailure::Storage(format!("{}: {e}", path.display())))?;
            written.push(path);
        }

        tracing::debug!(stem, count = written.len(), "💾 Wrote images");
        Ok(written)
    }
}
