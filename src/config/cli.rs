use crate::core::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Local file system rooted at the pipeline's working directory.
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
}

impl Storage for LocalStorage {
    async fn exists(&self, path: &Path) -> Result<bool> {
        let full_path = self.base_path.join(path);
        let found = tokio::fs::try_exists(&full_path).await?;
        tracing::debug!("Checked {}: exists={}", full_path.display(), found);
        Ok(found)
    }
}
