// src/config/loader.rs
//! Layered configuration loader
//!
//! Precedence, lowest first: built-in defaults, each existing config file in
//! order, then `EMG_<SECTION>__<KEY>` environment variables. The merged
//! table is deserialised and validated before it is handed out.

use crate::config::{constants::paths, PipelineConfig, ValidationError};
use parking_lot::RwLock;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration loader
pub struct ConfigLoader {
    config_paths: Vec<PathBuf>,
    apply_env: bool,
    current_config: Arc<RwLock<PipelineConfig>>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read or written
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML
    #[error("Configuration parse error in {path}: {source}")]
    Parse {
        /// File that failed
        path: String,
        /// TOML syntax error
        #[source]
        source: toml::de::Error,
    },

    /// The merged layers do not match [`PipelineConfig`]
    #[error("Failed to deserialize merged configuration: {0}")]
    Deserialize(#[source] toml::de::Error),

    /// Export failed
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Every field rejected by [`PipelineConfig::validate`]
    #[error("Configuration validation errors:{}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| format!("\n  {e}")).collect()
}

impl ConfigLoader {
    /// Loader over the default file locations
    pub fn new() -> Self {
        Self::with_paths(vec![
            PathBuf::from(paths::DEFAULT_CONFIG_FILE),
            PathBuf::from(paths::LOCAL_CONFIG_FILE),
        ])
    }

    /// Loader over explicit files, later files taking precedence
    pub fn with_paths(config_paths: Vec<PathBuf>) -> Self {
        Self {
            config_paths,
            apply_env: true,
            current_config: Arc::new(RwLock::new(PipelineConfig::default())),
        }
    }

    /// Ignore environment overrides
    pub fn without_env(mut self) -> Self {
        self.apply_env = false;
        self
    }

    /// Files consulted by `load`, lowest precedence first
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    /// Load, merge and validate; the result also becomes the current config
    pub fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let config = self.load_and_merge_configs()?;
        *self.current_config.write() = config.clone();
        info!(
            mode = ?config.driver.mode,
            strategy = ?config.mapping.strategy,
            capacity = config.buffer.capacity,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Last successfully loaded configuration (defaults before the first load)
    pub fn current(&self) -> PipelineConfig {
        self.current_config.read().clone()
    }

    /// Parse and validate a single file on top of the defaults
    pub fn validate_config_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let mut merged = Self::defaults_table()?;
        merge_toml_values(&mut merged, load_config_file(path.as_ref())?);
        let config: PipelineConfig = merged.try_into().map_err(ConfigError::Deserialize)?;
        config.validate().map_err(ConfigError::Validation)
    }

    /// Write the current configuration as TOML
    pub fn export_config<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let toml_content = toml::to_string_pretty(&self.current())?;
        std::fs::write(path, toml_content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn defaults_table() -> Result<toml::Value, ConfigError> {
        Ok(toml::Value::try_from(PipelineConfig::default())?)
    }

    fn load_and_merge_configs(&self) -> Result<PipelineConfig, ConfigError> {
        let mut merged = Self::defaults_table()?;

        for config_path in &self.config_paths {
            if !config_path.exists() {
                debug!(path = %config_path.display(), "Optional configuration file absent");
                continue;
            }
            merge_toml_values(&mut merged, load_config_file(config_path)?);
            debug!(path = %config_path.display(), "Merged configuration file");
        }

        if self.apply_env {
            apply_environment_overrides(&mut merged, env::vars());
        }

        let config: PipelineConfig = merged.try_into().map_err(ConfigError::Deserialize)?;
        if let Err(errors) = config.validate() {
            for error in &errors {
                warn!(field = %error.field, value = %error.value, "{}", error.message);
            }
            return Err(ConfigError::Validation(errors));
        }
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn load_config_file(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn merge_toml_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml_values(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base_value, overlay_value) => {
            *base_value = overlay_value;
        }
    }
}

/// `EMG_MAPPING__DIFFERENTIAL__SMOOTHING_WINDOW=25` sets
/// `mapping.differential.smoothing_window`. Variables without a section
/// separator are not configuration and are skipped.
fn apply_environment_overrides(config: &mut toml::Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(paths::ENV_PREFIX) else {
            continue;
        };
        if !rest.contains(paths::ENV_PATH_SEPARATOR) {
            continue;
        }

        let path: Vec<String> = rest
            .split(paths::ENV_PATH_SEPARATOR)
            .map(str::to_lowercase)
            .collect();
        if path.iter().any(String::is_empty) {
            warn!(variable = %key, "Ignoring malformed configuration override");
            continue;
        }

        debug!(variable = %key, "Applying environment override");
        set_nested_value(config, &path, parse_env_value(&value));
    }
}

fn parse_env_value(value: &str) -> toml::Value {
    if let Ok(int_val) = value.parse::<i64>() {
        toml::Value::Integer(int_val)
    } else if let Ok(float_val) = value.parse::<f64>() {
        toml::Value::Float(float_val)
    } else if let Ok(bool_val) = value.parse::<bool>() {
        toml::Value::Boolean(bool_val)
    } else {
        toml::Value::String(value.to_string())
    }
}

fn set_nested_value(config: &mut toml::Value, path: &[String], value: toml::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = config;
    for part in parents {
        let toml::Value::Table(table) = current else {
            return;
        };
        current = table
            .entry(part.clone())
            .or_insert_with(|| toml::Value::Table(toml::value::Table::new()));
    }

    if let toml::Value::Table(table) = current {
        table.insert(last.clone(), value);
    }
}
