//! Engine configuration.
//!
//! Deserialized from a TOML file by the CLI, or constructed in code by
//! embedders. All fields default to the safest behavior: no turn timeout,
//! save-before-deliver, in-memory storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Policy for ordering context persistence against response delivery.
///
/// `SaveBeforeDeliver` is the default: a user never observes a response the
/// system could not durably record. `DeliverThenSave` trades that guarantee
/// for lower perceived latency; a save failure after delivery is still
/// reported as the turn's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    #[default]
    SaveBeforeDeliver,
    DeliverThenSave,
}

/// Which context store backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "backend")]
pub enum StorageConfig {
    /// Process-lifetime in-memory store
    #[default]
    Memory,
    /// One JSON file per user under `dir` (or the platform data dir)
    File {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-turn deadline in seconds; `None` disables the timeout
    #[serde(default)]
    pub turn_timeout_secs: Option<u64>,
    /// Ordering of save against delivery
    #[serde(default)]
    pub delivery_policy: DeliveryPolicy,
    /// Context store backend selection
    #[serde(default)]
    pub storage: StorageConfig,
}

impl PipelineConfig {
    /// The per-turn deadline as a `Duration`, if configured.
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_secs.map(Duration::from_secs)
    }

    /// Parses a configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> crate::error::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.turn_timeout(), None);
        assert_eq!(config.delivery_policy, DeliveryPolicy::SaveBeforeDeliver);
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn test_parse_full_config() {
        let doc = r#"
            turn_timeout_secs = 30
            delivery_policy = "deliver_then_save"

            [storage]
            backend = "file"
            dir = "/tmp/chatflow"
        "#;
        let config = PipelineConfig::from_toml_str(doc).unwrap();
        assert_eq!(config.turn_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.delivery_policy, DeliveryPolicy::DeliverThenSave);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                dir: Some(PathBuf::from("/tmp/chatflow"))
            }
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }
}
