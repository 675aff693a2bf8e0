//! Configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (`fsguard.yaml` in the config directory, or an explicit path)
//! 3. Environment variables (FSGUARD_* prefix)
//! 4. CLI flags (handled by caller)

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;

/// Name of the config file looked up in the config directory
pub const CONFIG_FILE_NAME: &str = "fsguard.yaml";

/// Engine configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory searched for `fsguard.yaml`; `None` skips the file layer
    config_dir: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the standard config directory
    ///
    /// `FSGUARD_CONFIG_DIR` wins if set; otherwise `.fsguard` under the home
    /// directory. When no home directory can be determined the file layer is
    /// skipped.
    pub fn new() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
        }
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config_dir: Some(config_dir.into()),
        }
    }

    fn default_config_dir() -> Option<Utf8PathBuf> {
        if let Ok(dir) = env::var("FSGUARD_CONFIG_DIR") {
            return Some(Utf8PathBuf::from(dir));
        }

        home_dir().map(|home| home.join(".fsguard"))
    }

    /// Load configuration: defaults, then `fsguard.yaml` if present, then env
    pub fn load(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(path) = self.config_path() {
            if path.exists() {
                tracing::debug!(path = %path, "loading engine config");
                config = Self::load_yaml_file(&path)?;
            }
        }

        self.finish(config)
    }

    /// Load configuration from an explicit file, then apply env overrides
    ///
    /// Unlike [`ConfigLoader::load`], a missing file is an error.
    pub fn load_file(&self, path: &Utf8Path) -> Result<EngineConfig> {
        if !path.exists() {
            return Err(Error::config_not_found(path.as_str()));
        }
        let config = Self::load_yaml_file(path)?;
        self.finish(config)
    }

    fn finish(&self, config: EngineConfig) -> Result<EngineConfig> {
        let config = Self::apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(path: &Utf8Path) -> Result<EngineConfig> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut config: EngineConfig) -> Result<EngineConfig> {
        if let Ok(val) = env::var("FSGUARD_CAPACITY") {
            config.capacity = val
                .parse()
                .map_err(|_| Error::invalid_config("FSGUARD_CAPACITY must be a valid number"))?;
        }

        if let Ok(val) = env::var("FSGUARD_MAX_ATTEMPTS") {
            config.max_attempts = val.parse().map_err(|_| {
                Error::invalid_config("FSGUARD_MAX_ATTEMPTS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("FSGUARD_BASE_DELAY_MS") {
            config.base_delay_ms = val.parse().map_err(|_| {
                Error::invalid_config("FSGUARD_BASE_DELAY_MS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("FSGUARD_RETRYABLE_KINDS") {
            config.retryable_kinds = val.parse()?;
        }

        Ok(config)
    }

    /// Path of `fsguard.yaml` in the config directory, if there is one
    pub fn config_path(&self) -> Option<Utf8PathBuf> {
        self.config_dir
            .as_ref()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> Option<&Utf8Path> {
        self.config_dir.as_deref()
    }
}

/// The user's home directory
///
/// `HOME` wins when set so container setups that redirect it are honored;
/// otherwise the platform lookup from `dirs` is used.
fn home_dir() -> Option<Utf8PathBuf> {
    if let Ok(home) = env::var("HOME") {
        return Some(Utf8PathBuf::from(home));
    }

    let home = dirs::home_dir()?;
    match Utf8PathBuf::from_path_buf(home) {
        Ok(home) => Some(home),
        Err(home) => {
            tracing::warn!(path = %home.display(), "home directory is not valid UTF-8");
            None
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
