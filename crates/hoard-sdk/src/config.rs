//! Repository configuration, stored as `config.toml` in the repository.

use std::fs;
use std::path::Path;

use hoard_store::SplitConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub save: SaveSection,
    pub split: SplitConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSection {
    /// Default size ceiling for `save`; the command line overrides it.
    pub smaller: Option<u64>,
    /// Author recorded in commits instead of `user@host`.
    pub author: Option<String>,
}

impl RepoConfig {
    pub fn load(path: &Path) -> SdkResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| SdkError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.split.validate().map_err(|e| SdkError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    pub fn write(&self, path: &Path) -> SdkResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SdkError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        RepoConfig::default().write(&path).unwrap();
        assert_eq!(RepoConfig::load(&path).unwrap(), RepoConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[save]\nsmaller = 1048576\n\n[split]\nblob_bits = 12\n").unwrap();
        let config = RepoConfig::load(&path).unwrap();
        assert_eq!(config.save.smaller, Some(1 << 20));
        assert_eq!(config.split.blob_bits, 12);
        assert_eq!(
            config.split.max_tree_entries,
            SplitConfig::default().max_tree_entries
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[save\n").unwrap();
        assert!(matches!(
            RepoConfig::load(&path),
            Err(SdkError::Config { .. })
        ));
    }

    #[test]
    fn unusable_split_settings_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[split]\nblob_bits = 40\n").unwrap();
        match RepoConfig::load(&path) {
            Err(SdkError::Config { reason, .. }) => assert!(reason.contains("blob_bits")),
            other => panic!("expected a config error, got {other:?}"),
        }
    }
}
