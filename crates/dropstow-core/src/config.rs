//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{MoveError, Result};

/// Default ceiling above which files are compared by size and date only.
pub const DEFAULT_HASH_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// Default read chunk for streamed hashing.
pub const DEFAULT_HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration passed explicitly to the detector, journal and undo window.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct EngineConfig {
    /// Compare destinations for duplicate content before moving.
    #[builder(default = "true")]
    pub duplicate_detection_enabled: bool,

    /// Files larger than this are compared by size and date instead of hashed.
    #[builder(default = "DEFAULT_HASH_SIZE_LIMIT")]
    pub hash_size_limit: u64,

    /// Chunk size for streamed hashing.
    #[builder(default = "DEFAULT_HASH_CHUNK_SIZE")]
    pub hash_chunk_size: usize,

    /// Allowed difference between modification times, in seconds.
    #[builder(default = "2")]
    pub timestamp_tolerance_secs: u64,

    /// Maximum number of journal entries kept.
    #[builder(default = "100")]
    pub history_max_items: usize,

    /// Length of the one-click undo window, in seconds.
    #[builder(default = "10")]
    pub undo_expiration_secs: u64,

    /// Send sources deleted by the delete-source policy to the trash.
    #[builder(default = "false")]
    pub use_trash: bool,

    /// Override for the journal location.
    #[builder(default)]
    pub history_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_detection_enabled: true,
            hash_size_limit: DEFAULT_HASH_SIZE_LIMIT,
            hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
            timestamp_tolerance_secs: 2,
            history_max_items: 100,
            undo_expiration_secs: 10,
            use_trash: false,
            history_path: None,
        }
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(0) = self.hash_chunk_size {
            return Err("Hash chunk size must be greater than zero".to_string());
        }
        if let Some(0) = self.history_max_items {
            return Err("History must keep at least one item".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Timestamp tolerance as a duration.
    pub fn timestamp_tolerance(&self) -> Duration {
        Duration::from_secs(self.timestamp_tolerance_secs)
    }

    /// Undo window length as a duration.
    pub fn undo_expiration(&self) -> Duration {
        Duration::from_secs(self.undo_expiration_secs)
    }

    /// Per-user application directory for dropstow data.
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("dropstow"))
    }

    /// Location of the journal document.
    pub fn resolved_history_path(&self) -> Option<PathBuf> {
        self.history_path
            .clone()
            .or_else(|| Self::data_dir().map(|d| d.join("history.json")))
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dropstow").join("config.toml"))
    }

    /// Load the config from disk, or return defaults when there is none.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the config from a specific file.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MoveError::io(path, e))?;
        toml::from_str(&content).map_err(|e| {
            MoveError::validation(format!("Invalid config {}: {e}", path.display()))
        })
    }

    /// Save the config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| MoveError::validation("No config directory on this platform"))?;
        self.save_to(&path)
    }

    /// Save the config to a specific file.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MoveError::io(parent, e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| MoveError::validation(format!("Cannot serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| MoveError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .hash_size_limit(1024u64)
            .history_max_items(5usize)
            .history_path(PathBuf::from("/tmp/h.json"))
            .build()
            .unwrap();

        assert_eq!(config.hash_size_limit, 1024);
        assert_eq!(config.history_max_items, 5);
        assert_eq!(config.hash_chunk_size, DEFAULT_HASH_CHUNK_SIZE);
        assert!(config.duplicate_detection_enabled);
        assert_eq!(config.resolved_history_path(), Some(PathBuf::from("/tmp/h.json")));
    }

    #[test]
    fn test_config_builder_rejects_zero_chunk() {
        let result = EngineConfig::builder().hash_chunk_size(0usize).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.hash_size_limit, 100 * 1024 * 1024);
        assert_eq!(config.undo_expiration(), Duration::from_secs(10));
        assert_eq!(config.timestamp_tolerance(), Duration::from_secs(2));
        assert!(!config.use_trash);
    }
}
