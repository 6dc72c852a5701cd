/// Engine configuration — RON file with environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::typewriter::DEFAULT_CHAR_DELAY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Tunables for a narrative session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between revealed characters, in milliseconds.
    pub char_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            char_delay_ms: DEFAULT_CHAR_DELAY.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    /// Environment variable overriding `char_delay_ms`.
    pub const CHAR_DELAY_ENV: &'static str = "STORY_ENGINE_CHAR_DELAY_MS";

    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a configuration from a RON string. Missing fields keep
    /// their defaults.
    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validated()
    }

    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Result<EngineConfig, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<EngineConfig, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`, which maps a variable name
    /// to its value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<EngineConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(Self::CHAR_DELAY_ENV) {
            self.char_delay_ms =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: Self::CHAR_DELAY_ENV.to_string(),
                        reason: e.to_string(),
                    })?;
        }
        self.validated()
    }

    pub fn char_delay(&self) -> Duration {
        Duration::from_millis(self.char_delay_ms)
    }

    fn validated(self) -> Result<EngineConfig, ConfigError> {
        if self.char_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "char_delay_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}
