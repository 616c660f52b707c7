//! Cost limit configuration.
//!
//! Limits are configured per level (global, query, block). A config is read
//! from TOML and layered with environment variables such as
//! `QUERYCOST__QUERY__THRESHOLD=50000`.

use std::path::Path;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::CostError;
use super::types::{Cost, Limit};

/// Prefix of environment variables overriding file configuration.
pub const ENV_PREFIX: &str = "QUERYCOST";

/// Separator between the prefix and nested keys of environment variables.
pub const ENV_SEPARATOR: &str = "__";

/// Errors that can occur while loading or applying cost configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or deserializing configuration sources failed.
    #[error("config error: {0}")]
    Source(#[from] ::config::ConfigError),

    /// Rendering configuration as TOML failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// A threshold was negative or not a number.
    #[error("invalid {level} threshold {value}: must be a non-negative number")]
    InvalidThreshold { level: &'static str, value: f64 },

    /// Building the enforcer tree failed.
    #[error(transparent)]
    Cost(#[from] CostError),
}

/// Limit settings for one level of the enforcer tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Threshold at or above which the level is over its limit (unset = unbounded)
    pub threshold: Option<f64>,

    /// Whether exceeding the threshold is rejected, or only reported
    pub enabled: bool,

    /// Message appended to limit violation errors
    pub message: Option<String>,
}

impl LevelConfig {
    /// Create an unbounded, disabled level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Set whether the limit is enforced.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the violation message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The limit described by this level.
    pub fn limit(&self) -> Limit {
        Limit {
            threshold: self.threshold.map(Cost::new).unwrap_or(Cost::MAX),
            enabled: self.enabled,
        }
    }

    fn validate(&self, level: &'static str) -> Result<(), ConfigError> {
        match self.threshold {
            Some(value) if value.is_nan() || value < 0.0 => {
                Err(ConfigError::InvalidThreshold { level, value })
            }
            _ => Ok(()),
        }
    }
}

/// Limits for every level of the enforcer tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Limit across all concurrent queries
    pub global: LevelConfig,

    /// Limit per query
    pub query: LevelConfig,

    /// Limit per block of query results
    pub block: LevelConfig,
}

impl CostConfig {
    /// Create a config with every level unbounded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global level.
    pub fn with_global(mut self, level: LevelConfig) -> Self {
        self.global = level;
        self
    }

    /// Set the query level.
    pub fn with_query(mut self, level: LevelConfig) -> Self {
        self.query = level;
        self
    }

    /// Set the block level.
    pub fn with_block(mut self, level: LevelConfig) -> Self {
        self.block = level;
        self
    }

    /// Load from a TOML file, overridden by `QUERYCOST__*` environment variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Self::environment())
    }

    /// Load from `QUERYCOST__*` environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(Self::environment()))
    }

    /// Parse a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every level for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.global.validate("global")?;
        self.query.validate("query")?;
        self.block.validate("block")?;
        Ok(())
    }

    fn load_with_env(path: impl AsRef<Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = File::from(path.as_ref()).format(FileFormat::Toml).required(true);
        Self::from_builder(Config::builder().add_source(file).add_source(env))
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    fn from_builder(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config: CostConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
