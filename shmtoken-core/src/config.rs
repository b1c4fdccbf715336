// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Raw structs are parsed first, then validated into typed configuration.
//! Any invalid field results in a ConfigError.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

/// Upper bound for the creation-lock warning timeout (10 minutes).
const MAX_LOCK_WARN_TIMEOUT_MS: u64 = 600_000;

/// Raw region-manager settings as parsed from YAML.
#[derive(Debug, Deserialize)]
struct RawShmConfig {
    #[serde(default = "default_lock_warn_timeout_ms")]
    lock_warn_timeout_ms: u64,
    #[serde(default)]
    quiet: bool,
}

fn default_lock_warn_timeout_ms() -> u64 {
    5000
}

impl Default for RawShmConfig {
    fn default() -> Self {
        Self {
            lock_warn_timeout_ms: default_lock_warn_timeout_ms(),
            quiet: false,
        }
    }
}

/// Raw defaults for newly created regions.
#[derive(Debug, Deserialize)]
struct RawDefaultsConfig {
    #[serde(default = "default_region_size")]
    region_size: usize,
    #[serde(default = "default_make_unique")]
    make_unique: bool,
}

fn default_region_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_make_unique() -> bool {
    true
}

impl Default for RawDefaultsConfig {
    fn default() -> Self {
        Self {
            region_size: default_region_size(),
            make_unique: default_make_unique(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    shm: RawShmConfig,
    #[serde(default)]
    defaults: RawDefaultsConfig,
}

/// Validated region-manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmConfig {
    /// How long to wait on the named creation mutex before logging a warning.
    /// The wait continues after the warning.
    pub lock_warn_timeout: Duration,
    /// Suppress error-level logging of failures.
    pub quiet: bool,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            lock_warn_timeout: Duration::from_millis(default_lock_warn_timeout_ms()),
            quiet: false,
        }
    }
}

/// Validated defaults for region creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultsConfig {
    pub region_size: usize,
    pub make_unique: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            region_size: default_region_size(),
            make_unique: default_make_unique(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub shm: ShmConfig,
    pub defaults: DefaultsConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn load_string(content: &str) -> ConfigResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> ConfigResult<Config> {
        let timeout_ms = raw.shm.lock_warn_timeout_ms;
        if timeout_ms == 0 || timeout_ms > MAX_LOCK_WARN_TIMEOUT_MS {
            return Err(ConfigError::InvalidFieldValue {
                field: "shm.lock_warn_timeout_ms",
                value: timeout_ms.to_string(),
                reason: format!("must be between 1 and {}", MAX_LOCK_WARN_TIMEOUT_MS),
            });
        }

        if raw.defaults.region_size == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "defaults.region_size",
                value: "0".to_string(),
                reason: "a region cannot be zero-sized".to_string(),
            });
        }

        Ok(Config {
            shm: ShmConfig {
                lock_warn_timeout: Duration::from_millis(timeout_ms),
                quiet: raw.shm.quiet,
            },
            defaults: DefaultsConfig {
                region_size: raw.defaults.region_size,
                make_unique: raw.defaults.make_unique,
            },
        })
    }
}
