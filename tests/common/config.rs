//! Test configuration helpers writing artifacts into a temporary directory

use fetch_pipeline::{Config, FlowConfig, StorageConfig};
use std::time::Duration;
use tempfile::TempDir;

/// Configuration storing artifacts under a fresh temp dir
///
/// Returns the TempDir so it lives as long as the test.
pub fn create_test_config() -> (Config, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap_or_else(|e| panic!("Failed to create temp dir: {e}"));

    let mut config = Config::default();
    config.fetch.request_timeout = Duration::from_secs(5);
    config.fetch.user_agent = Some("fetch-pipeline-tests".to_string());
    config.storage = StorageConfig {
        artifact_dir: temp_dir.path().join("artifacts"),
        file_prefix: "picsum".to_string(),
        extension: Some("jpg".to_string()),
    };

    (config, temp_dir)
}

/// Same as [`create_test_config`] with a custom flow section
pub fn create_test_config_with_flow(flow: FlowConfig) -> (Config, TempDir) {
    let (mut config, temp_dir) = create_test_config();
    config.flow = flow;
    (config, temp_dir)
}
