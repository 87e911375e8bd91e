//! Resolves where configuration and records live, and loads them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use healthflow_spark::{SparkClient, SparkSettings};
use tracing::debug;

const MASK: &str = "********";

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => SparkSettings::default_path().context("Cannot determine the config directory"),
    }
}

/// Default records file under the user data directory.
pub fn records_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| dirs::data_dir().map(|p| p.join("healthflow").join("records.json")))
}

/// File settings with `SPARK_*` environment overrides applied.
pub fn load_settings(explicit: Option<&Path>) -> Result<SparkSettings> {
    let path = config_path(explicit)?;
    debug!("Loading config from {}", path.display());
    let mut settings = SparkSettings::load_from_path(&path)?;
    settings.apply_env();
    Ok(settings)
}

pub fn build_client(explicit: Option<&Path>) -> Result<SparkClient> {
    let config = load_settings(explicit)?.into_config()?;
    Ok(SparkClient::new(config)?)
}

/// Copy of the settings that is safe to print.
pub fn masked(mut settings: SparkSettings) -> SparkSettings {
    if settings.credentials.api_secret.is_some() {
        settings.credentials.api_secret = Some(MASK.to_string());
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_path_wins() {
        let path = config_path(Some(Path::new("/tmp/hf.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/hf.toml"));
    }

    #[test]
    fn test_masked_hides_secret_only() {
        let mut settings = SparkSettings::default();
        settings.credentials.api_key = Some("key-1".into());
        settings.credentials.api_secret = Some("secret-1".into());

        let masked = masked(settings);
        assert_eq!(masked.credentials.api_key.as_deref(), Some("key-1"));
        assert_eq!(masked.credentials.api_secret.as_deref(), Some(MASK));
    }

    #[test]
    fn test_masked_leaves_absent_secret() {
        assert!(masked(SparkSettings::default()).credentials.api_secret.is_none());
    }
}
