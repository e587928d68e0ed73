//! Content retrieval, the network half of a fetch.

use async_trait::async_trait;

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::SourceItem;

/// Abstraction over raw content retrieval, enabling testability.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Retrieve the full body behind `source`
    async fn retrieve(&self, source: &SourceItem) -> Result<Vec<u8>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Production [`ContentSource`] issuing HTTP(S) GET requests.
pub struct HttpSource {
    client: reqwest::Client,
    max_body_bytes: Option<u64>,
}

impl HttpSource {
    /// Build a client honoring the timeout and user agent of `config`
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "Failed to create HTTP client: {}",
                e
            )))
        })?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn check_size(&self, url: &str, len: u64) -> Result<()> {
        match self.max_body_bytes {
            Some(limit) if len > limit => Err(FetchError::BodyTooLarge {
                url: url.to_string(),
                limit,
            }
            .into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn retrieve(&self, source: &SourceItem) -> Result<Vec<u8>> {
        let url = source.url();
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
                url: source.to_string(),
            }
            .into());
        }

        let mut response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status().as_u16(),
                url: source.to_string(),
            }
            .into());
        }

        // Reject early when the server announces an oversized body
        if let Some(len) = response.content_length() {
            self.check_size(source.as_str(), len)?;
        }

        // Chunked bodies announce no length; stop reading once over the limit
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            self.check_size(source.as_str(), (body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
