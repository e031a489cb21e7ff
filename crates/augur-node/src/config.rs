//! Node configuration file.

use std::path::{Path, PathBuf};

use augur_aggregate::ScorePolicy;
use augur_types::params::{LockedPoolParams, TaskParams, DEFAULT_EXPIRATION_DURATION};
use augur_types::ValidatorId;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "AUGUR_CONFIG";

/// Config file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_FILE: &str = "augur.toml";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Parameters seeded into an empty store.
    #[serde(default)]
    pub genesis: GenesisConfig,
    /// Score deltas and slashing curve.
    #[serde(default)]
    pub scoring: ScorePolicy,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Genesis parameters. Ignored once the store holds values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub task: TaskParams,
    #[serde(default)]
    pub pool: LockedPoolParams,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Empty = in-memory.
    #[serde(default)]
    pub db_path: String,
    /// Blocks a terminal task stays live past its deadline before it is
    /// moved to the archive.
    #[serde(default = "default_archive_after_blocks")]
    pub archive_after_blocks: u64,
}

/// Governance configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Hex validator id allowed to update parameters. Empty = nobody.
    #[serde(default)]
    pub authority: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error", or a full
    /// filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_archive_after_blocks() -> u64 {
    DEFAULT_EXPIRATION_DURATION.unsigned_abs()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            archive_after_blocks: default_archive_after_blocks(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from [`CONFIG_ENV`] or `./augur.toml`.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: NodeConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Parsed governance authority, if one is configured.
    pub fn authority(&self) -> anyhow::Result<Option<ValidatorId>> {
        let raw = self.governance.authority.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let id = raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid governance.authority: {e}"))?;
        Ok(Some(id))
    }

    /// Database path, or `None` for an in-memory database.
    pub fn db_path(&self) -> Option<PathBuf> {
        if self.storage.db_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.storage.db_path))
        }
    }

    fn config_path() -> PathBuf {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.genesis.task, TaskParams::default());
        assert_eq!(config.scoring, ScorePolicy::default());
        assert_eq!(config.storage.archive_after_blocks, 17_280);
        assert_eq!(config.logging.log_level, "info");
        assert!(config.db_path().is_none());
        assert!(config.authority().expect("authority").is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string(&config).expect("serialize");
        let parsed: NodeConfig = toml::from_str(&toml_str).expect("parse");
        assert_eq!(parsed.genesis.pool, config.genesis.pool);
    }

    #[test]
    fn test_partial_file() {
        let config: NodeConfig = toml::from_str(
            r#"
            [scoring]
            outlier = 128

            [storage]
            db_path = "/var/lib/augur/augur.db"

            [governance]
            authority = "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"
            "#,
        )
        .expect("parse");
        assert_eq!(config.scoring.outlier, 128);
        assert_eq!(config.scoring.loose, ScorePolicy::default().loose);
        assert_eq!(config.storage.archive_after_blocks, 17_280);
        assert_eq!(
            config.db_path(),
            Some(PathBuf::from("/var/lib/augur/augur.db"))
        );
        assert_eq!(
            config.authority().expect("authority"),
            Some(ValidatorId([0xee; 32]))
        );
    }

    #[test]
    fn test_genesis_section_uses_wire_names() {
        let config: NodeConfig = toml::from_str(
            r#"
            [genesis.task]
            task_expiration_duration = 100
            task_aggregation_window = 3
            task_aggregation_result = 1
            task_threshold_score = 128
            task_epsilon1 = 1
            task_epsilon2 = 100
            "#,
        )
        .expect("parse");
        assert_eq!(config.genesis.task.aggregation_window, 3);
        assert_eq!(config.genesis.pool, LockedPoolParams::default());
    }

    #[test]
    fn test_bad_authority() {
        let mut config = NodeConfig::default();
        config.governance.authority = "not-hex".to_string();
        assert!(config.authority().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = NodeConfig::load_from(Path::new("/nonexistent/augur.toml")).expect("load");
        assert_eq!(config.logging.log_level, "info");
    }
}
