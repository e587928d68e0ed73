//! Artifact persistence, the disk half of a fetch.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{FetchError, Result};
use crate::types::{Artifact, ArtifactId};

/// Abstraction over durable artifact storage, enabling testability.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under a fresh, unique artifact identifier
    async fn persist(&self, bytes: &[u8]) -> Result<Artifact>;
}

/// Production [`ArtifactStore`] writing one file per artifact into a directory.
///
/// File names are `{prefix}-{id}[.{extension}]` where `id` is random, so
/// concurrent writes never collide regardless of what the sources are called.
pub struct DirectoryStore {
    dir: PathBuf,
    prefix: String,
    extension: Option<String>,
}

impl DirectoryStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension,
        }
    }

    /// Create a store from the storage section of the configuration
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            config.artifact_dir.clone(),
            config.file_prefix.clone(),
            config.extension.clone(),
        )
    }

    /// Directory receiving the artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ArtifactId) -> PathBuf {
        let name = match &self.extension {
            Some(ext) => format!("{}-{}.{}", self.prefix, id, ext),
            None => format!("{}-{}", self.prefix, id),
        };
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn persist(&self, bytes: &[u8]) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| FetchError::Persist {
                path: self.dir.clone(),
                source,
            })?;

        let id = ArtifactId::random();
        let path = self.path_for(id);

        write_new_file(&path, bytes)
            .await
            .map_err(|source| FetchError::Persist {
                path: path.clone(),
                source,
            })?;

        Ok(Artifact {
            id,
            path,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Write `bytes` to a file that must not exist yet, syncing before returning.
///
/// A failed write removes the partial file again.
async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    discard_on_error(path, async move {
        file.write_all(bytes).await?;
        file.sync_all().await
    })
    .await
}

/// Await `write`; if it fails, remove whatever it left at `path`
async fn discard_on_error<T>(
    path: &Path,
    write: impl Future<Output = std::io::Result<T>>,
) -> std::io::Result<T> {
    let result = write.await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %e, "Failed to remove partial artifact");
        }
    }
    result
}
