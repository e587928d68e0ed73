//! Configuration types for fetch-pipeline

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Content retrieval settings (HTTP client behaviour)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request (None = reqwest default)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Largest accepted response body in bytes (None = unlimited)
    #[serde(default)]
    pub max_body_bytes: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: None,
            max_body_bytes: None,
        }
    }
}

/// Local artifact storage settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory receiving downloaded artifacts (default: "./artifacts")
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Prefix of every artifact file name (default: "artifact")
    ///
    /// Files are named `{prefix}-{artifact id}[.{extension}]`, never after the
    /// source, so duplicate or colliding source names cannot clash.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// File extension appended to artifact names, without the dot (default: none)
    #[serde(default)]
    pub extension: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            file_prefix: default_file_prefix(),
            extension: None,
        }
    }
}

/// How a subscription treats the demand its subscriber requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandPolicy {
    /// Never deliver more values than requested (default)
    #[default]
    Honor,
    /// Record requests but treat any positive demand as unlimited
    Unlimited,
}

/// What the sequential publisher does with failed fetches
///
/// The fan-out stage always forwards [`ResultItem::Absent`](crate::ResultItem::Absent).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentPolicy {
    /// Drop absent results without delivering them (default)
    #[default]
    Drop,
    /// Deliver absent results like any other value
    Forward,
}

/// Flow control settings shared by publishers and stages
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Maximum concurrent fetches of the sequential publisher (default: 4)
    ///
    /// Set to 1 to fetch strictly one source at a time.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Demand handling (default: honor)
    #[serde(default)]
    pub demand_policy: DemandPolicy,

    /// Failed-fetch handling of the sequential publisher (default: drop)
    #[serde(default)]
    pub absent_policy: AbsentPolicy,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            demand_policy: DemandPolicy::default(),
            absent_policy: AbsentPolicy::default(),
        }
    }
}

/// Main configuration
///
/// Fields are organized into logical sub-configs:
/// - [`fetch`](FetchConfig) - HTTP client behaviour
/// - [`storage`](StorageConfig) - where and how artifacts are written
/// - [`flow`](FlowConfig) - concurrency, demand and failure policies
///
/// All sub-config fields are flattened, so the JSON form has no nesting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Content retrieval settings
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Artifact storage settings
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Flow control settings
    #[serde(flatten)]
    pub flow: FlowConfig,
}

impl Config {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub async fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.flow.max_in_flight == 0 {
            return Err(Error::config("max_in_flight", "must be at least 1"));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config("request_timeout", "must be greater than zero"));
        }
        if self.storage.file_prefix.is_empty() {
            return Err(Error::config("file_prefix", "must not be empty"));
        }
        if has_path_separator(&self.storage.file_prefix) {
            return Err(Error::config(
                "file_prefix",
                format!(
                    "'{}' must not contain path separators",
                    self.storage.file_prefix
                ),
            ));
        }
        if let Some(extension) = &self.storage.extension
            && (extension.is_empty() || has_path_separator(extension))
        {
            return Err(Error::config(
                "extension",
                format!("'{extension}' is not a valid file extension"),
            ));
        }
        Ok(())
    }
}

fn has_path_separator(s: &str) -> bool {
    s.contains('/') || s.contains('\\')
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

fn default_file_prefix() -> String {
    "artifact".to_string()
}

fn default_max_in_flight() -> usize {
    4
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
