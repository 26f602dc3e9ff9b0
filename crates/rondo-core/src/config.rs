//! Configuration loading and typed config structures for the Rondo engine.
//!
//! The canonical configuration lives in `rondo-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but fails a validity rule.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `rondo-config.yaml`. All fields have defaults,
/// so an empty file (or no file at all) yields a runnable configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameConfig {
    /// Round timing (window lengths, heartbeat cadence, default prize).
    #[serde(default)]
    pub round: RoundTimingConfig,

    /// Engine runtime settings (tick interval, seed, channel depths).
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a validity rule fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a validity rule fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field validity rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round.voting_window_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "round.voting_window_secs must be at least 1".to_owned(),
            });
        }
        if self.round.reveal_window_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "round.reveal_window_secs must be at least 1".to_owned(),
            });
        }
        if self.round.heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "round.heartbeat_secs must be at least 1".to_owned(),
            });
        }
        if self.round.default_prize.is_sign_negative() {
            return Err(ConfigError::Invalid {
                reason: "round.default_prize must not be negative".to_owned(),
            });
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.engine.command_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine.command_queue_depth must be at least 1".to_owned(),
            });
        }
        if self.engine.snapshot_channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine.snapshot_channel_capacity must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Round timing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoundTimingConfig {
    /// Length of the voting window in simulated seconds.
    #[serde(default = "default_voting_window_secs")]
    pub voting_window_secs: u64,

    /// Length of the reveal window in simulated seconds.
    #[serde(default = "default_reveal_window_secs")]
    pub reveal_window_secs: u64,

    /// Heartbeat snapshot cadence in countdown seconds.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Prize amount assigned to each newly created round. The admin
    /// collaborator can overwrite it per round.
    #[serde(default)]
    pub default_prize: Decimal,
}

impl Default for RoundTimingConfig {
    fn default() -> Self {
        Self {
            voting_window_secs: default_voting_window_secs(),
            reveal_window_secs: default_reveal_window_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            default_prize: Decimal::ZERO,
        }
    }
}

/// Engine runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Real-time milliseconds per countdown tick. One tick is one simulated
    /// second; tests shrink this to run rounds in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Random seed for outcome selection. Absent means OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Depth of the serialized command queue.
    #[serde(default = "default_command_queue_depth")]
    pub command_queue_depth: usize,

    /// Capacity of the broadcast snapshot channel.
    #[serde(default = "default_snapshot_channel_capacity")]
    pub snapshot_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
            command_queue_depth: default_command_queue_depth(),
            snapshot_channel_capacity: default_snapshot_channel_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default log level filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_voting_window_secs() -> u64 {
    30
}

fn default_reveal_window_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    5
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_command_queue_depth() -> usize {
    64
}

fn default_snapshot_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = GameConfig::parse("{}").unwrap();
        assert_eq!(config.round.voting_window_secs, 30);
        assert_eq!(config.round.reveal_window_secs, 10);
        assert_eq!(config.round.heartbeat_secs, 5);
        assert_eq!(config.round.default_prize, Decimal::ZERO);
        assert_eq!(config.engine.tick_interval_ms, 1000);
        assert_eq!(config.engine.seed, None);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let yaml = r"
round:
  voting_window_secs: 60
  default_prize: 12.50
engine:
  seed: 42
  tick_interval_ms: 10
";
        let config = GameConfig::parse(yaml).unwrap();
        assert_eq!(config.round.voting_window_secs, 60);
        assert_eq!(config.round.reveal_window_secs, 10);
        assert_eq!(config.round.default_prize, Decimal::new(1250, 2));
        assert_eq!(config.engine.seed, Some(42));
        assert_eq!(config.engine.tick_interval_ms, 10);
    }

    #[test]
    fn zero_voting_window_rejected() {
        let yaml = "round:\n  voting_window_secs: 0\n";
        let err = GameConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn negative_prize_rejected() {
        let yaml = "round:\n  default_prize: -1\n";
        let err = GameConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let yaml = "engine:\n  tick_interval_ms: 0\n";
        let err = GameConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = GameConfig::parse(": not yaml : [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }
}
