//! Configuration management for the provenance relay.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod control;
mod relay;
pub use control::*;
pub use relay::*;

#[cfg(test)]
mod config_test;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `PROVENANCE__RELAY__READ_BUFFER_SIZE`.
pub const ENV_PREFIX: &str = "PROVENANCE";

/// Main configuration container for the relay
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProvenanceConfig {
    /// Kernel control endpoints
    #[serde(default)]
    pub control: ControlConfig,
    /// Record channels and relay loop behaviour
    #[serde(default)]
    pub relay: RelayConfig,
}

impl ProvenanceConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `PROVENANCE__` prefix (highest priority)
    ///
    /// # Note
    /// Callers should call `validate()` once all overrides are applied.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.control.validate()?;
        self.relay.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
