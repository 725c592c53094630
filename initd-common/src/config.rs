//! Bootstrap configuration loading
//!
//! Bootstrap values (listen address, database path, config directory) are
//! resolved per value in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment sources are merged by clap before they reach
//! [`BootstrapConfig::resolve`], so this module only sees them as overrides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Bootstrap configuration file contents
///
/// Every key is optional. A missing key falls through to the compiled default.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    /// HTTP listen address, e.g. "127.0.0.1:3000"
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// SQLite database holding system configuration records
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Directory containing `config.json`
    #[serde(default)]
    pub config_dir: Option<PathBuf>,

    /// JSON manifest with a top-level `version` field
    #[serde(default)]
    pub version_manifest: Option<PathBuf>,

    /// Pro service URL; presence enables `feConfigs.isPlus`
    #[serde(default)]
    pub pro_url: Option<String>,

    /// Development mode (prefers `config.local.json`, reports crate version)
    #[serde(default)]
    pub dev_mode: Option<bool>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled defaults used when no other source provides a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub config_dir: PathBuf,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            database_path: PathBuf::from("data").join("initd.db"),
            config_dir: PathBuf::from("data"),
        }
    }
}

/// Values supplied on the command line or through environment variables
#[derive(Debug, Clone, Default)]
pub struct BootstrapOverrides {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
    pub version_manifest: Option<PathBuf>,
    pub pro_url: Option<String>,
    pub dev_mode: Option<bool>,
}

/// Fully resolved bootstrap configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub config_dir: PathBuf,
    pub version_manifest: Option<PathBuf>,
    pub pro_url: Option<String>,
    pub dev_mode: bool,
    pub log_level: String,
}

impl BootstrapConfig {
    /// Resolve each value: overrides > TOML > compiled defaults
    pub fn resolve(overrides: BootstrapOverrides, toml: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::default();

        Self {
            bind_addr: overrides
                .bind_addr
                .or_else(|| toml.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            database_path: overrides
                .database_path
                .or_else(|| toml.database_path.clone())
                .unwrap_or(defaults.database_path),
            config_dir: overrides
                .config_dir
                .or_else(|| toml.config_dir.clone())
                .unwrap_or(defaults.config_dir),
            version_manifest: overrides
                .version_manifest
                .or_else(|| toml.version_manifest.clone()),
            pro_url: overrides
                .pro_url
                .or_else(|| toml.pro_url.clone())
                .filter(|url| !url.trim().is_empty()),
            dev_mode: overrides.dev_mode.or(toml.dev_mode).unwrap_or(false),
            log_level: toml.logging.level.clone(),
        }
    }

    /// Whether a pro service is configured
    pub fn is_plus(&self) -> bool {
        self.pro_url.is_some()
    }
}

/// Default bootstrap file location: `<config dir>/initd/initd.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("initd").join("initd.toml"))
}

/// Load the bootstrap TOML file
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but cannot be parsed is a configuration error.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, using compiled defaults");
            return Ok(TomlConfig::default());
        }
    };

    if !path.exists() {
        warn!(
            "Bootstrap config not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded bootstrap config from {}", path.display());
    Ok(config)
}
