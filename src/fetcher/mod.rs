//! Fetcher: retrieve one source and persist it as a local artifact.
//!
//! Split into two replaceable seams:
//! - `source` - Raw content retrieval ([`ContentSource`], HTTP by default)
//! - `store` - Durable artifact storage ([`ArtifactStore`], a directory by default)
//!
//! [`Fetcher::fetch`] never returns an error: any failure is logged and folded
//! into [`ResultItem::Absent`].

mod source;
mod store;

pub use source::{ContentSource, HttpSource};
pub use store::{ArtifactStore, DirectoryStore};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::types::{Artifact, ResultItem, SourceItem};

/// Retrieve-and-persist for a single source
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn ContentSource>,
    store: Arc<dyn ArtifactStore>,
}

impl Fetcher {
    /// Combine a content source with an artifact store
    pub fn new(source: Arc<dyn ContentSource>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { source, store }
    }

    /// HTTP source and directory store configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpSource::new(&config.fetch)?;
        let store = DirectoryStore::from_config(&config.storage);
        Ok(Self::new(Arc::new(source), Arc::new(store)))
    }

    /// Fetch `item`, reporting failure as [`ResultItem::Absent`]
    pub async fn fetch(&self, item: &SourceItem) -> ResultItem {
        match self.try_fetch(item).await {
            Ok(artifact) => {
                tracing::debug!(
                    source = %item,
                    artifact_id = %artifact.id,
                    size_bytes = artifact.size_bytes,
                    "Fetched source"
                );
                ResultItem::Success(artifact)
            }
            Err(e) => {
                tracing::warn!(
                    source = %item,
                    content_source = self.source.name(),
                    error = %e,
                    "Fetch failed, reporting absent"
                );
                ResultItem::Absent
            }
        }
    }

    /// Fetch `item`, keeping the failure reason
    pub async fn try_fetch(&self, item: &SourceItem) -> Result<Artifact> {
        let bytes = self.source.retrieve(item).await?;
        self.store.persist(&bytes).await
    }
}
