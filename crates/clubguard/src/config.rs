//! Configuration loading

use std::path::Path;

use anyhow::Result;
use clubguard_common::config::Config;
use tracing::debug;

/// Load configuration from file, falling back to defaults when it does not exist
pub async fn load(path: &str) -> Result<Config> {
    let path = Path::new(path);

    if path.exists() {
        Config::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        debug!(path = %path.display(), "Config file not found, using defaults");
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let config = load("/nonexistent/clubguard.toml").await.unwrap();
        assert_eq!(config.security.lockout.max_failed_attempts, 5);
    }

    #[tokio::test]
    async fn test_existing_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clubguard.toml");
        std::fs::write(&path, "[security.csrf]\npool_capacity = 3\n").unwrap();

        let config = load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(config.security.csrf.pool_capacity, 3);
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clubguard.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load(path.to_str().unwrap()).await.is_err());
    }
}
