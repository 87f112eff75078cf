use crate::domain::ports::Storage;
use crate::utils::error::{PortalError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Reads and writes documents on the local filesystem. Relative paths resolve against `base_path`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.base_path.join(path)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Storage for LocalStorage {
    async fn read_text(&self, path: &Path) -> Result<String> {
        let full_path = self.full_path(path);
        let bytes = fs::read(&full_path)
            .await
            .map_err(|source| PortalError::ReadError {
                path: full_path.clone(),
                source,
            })?;
        String::from_utf8(bytes).map_err(|_| PortalError::EncodingError { path: full_path })
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| PortalError::WriteError {
                    path: full_path.clone(),
                    source,
                })?;
        }

        fs::write(&full_path, text)
            .await
            .map_err(|source| PortalError::WriteError {
                path: full_path,
                source,
            })
    }
}
