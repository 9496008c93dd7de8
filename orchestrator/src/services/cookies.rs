//! Cookie-file credential source
//!
//! Credentials are the `_U` authentication cookie exported from a browser
//! session. Each session lives in its own file named `bing_cookies_<n>.json`
//! inside the cookies directory, holding the JSON array produced by common
//! cookie-export extensions:
//!
//! ```json
//! [{ "name": "_U", "value": "...", "domain": ".bing.com" }, ...]
//! ```
//!
//! Files are read in sorted name order and ids are assigned in the order
//! secrets are found, so ids are stable as long as the directory is.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared::{worker_debug, worker_warn, Credential, CredentialId, WorkerId};
use tokio::fs;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::CredentialSource;

const COOKIE_FILE_PREFIX: &str = "bing_cookies_";
const COOKIE_FILE_SUFFIX: &str = ".json";
const AUTH_COOKIE_NAME: &str = "_U";

#[derive(Debug, Deserialize)]
struct ExportedCookie {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

/// Extract the auth cookie value from an exported cookie jar
pub fn auth_cookie(contents: &str) -> Result<Option<String>, serde_json::Error> {
    let cookies: Vec<ExportedCookie> = serde_json::from_str(contents)?;
    Ok(cookies
        .into_iter()
        .find(|cookie| cookie.name == AUTH_COOKIE_NAME)
        .map(|cookie| cookie.value))
}

fn is_cookie_file(name: &str) -> bool {
    name.starts_with(COOKIE_FILE_PREFIX) && name.ends_with(COOKIE_FILE_SUFFIX)
}

/// Loads credentials from a directory of exported cookie files
pub struct CookieDirSource {
    dir: PathBuf,
}

impl CookieDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cookie files in the directory, sorted by file name
    async fn cookie_files(&self) -> OrchestratorResult<Vec<PathBuf>> {
        let source_error = |e: std::io::Error| OrchestratorError::CredentialSource {
            path: self.dir.display().to_string(),
            message: e.to_string(),
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(source_error)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(source_error)? {
            if entry.file_name().to_str().is_some_and(is_cookie_file) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait::async_trait]
impl CredentialSource for CookieDirSource {
    async fn load_credentials(&self) -> OrchestratorResult<Vec<Credential>> {
        let me = WorkerId::Orchestrator;
        let files = self.cookie_files().await?;
        if files.is_empty() {
            worker_warn!(
                me,
                "No cookie files of the {}<n>{} format found in {}",
                COOKIE_FILE_PREFIX,
                COOKIE_FILE_SUFFIX,
                self.dir.display()
            );
            return Ok(Vec::new());
        }

        let mut credentials = Vec::new();
        for path in files {
            let contents = fs::read_to_string(&path)
                .await
                .map_err(|e| OrchestratorError::CredentialSource {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            let cookie = auth_cookie(&contents).map_err(|e| OrchestratorError::CredentialSource {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            match cookie {
                Some(secret) if !secret.is_empty() => {
                    let id = CredentialId::new(credentials.len() as u32);
                    worker_debug!(me, "🍪 Credential {} loaded from {}", id, path.display());
                    credentials.push(Credential::new(id, secret));
                }
                _ => worker_warn!(me, "Auth cookie not found in: {}", path.display()),
            }
        }

        Ok(credentials)
    }
}
