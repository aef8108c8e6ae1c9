//! Configuration loading and resolution
//!
//! The pipeline reads an optional `repograde.toml`:
//!
//! ```toml
//! [grading]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-5-mini"
//! timeout_secs = 120
//!
//! [snapshot]
//! tool = ["uvx", "gitingest"]
//!
//! [logging]
//! level = "info"
//! ```
//!
//! A missing file is never fatal: defaults are used and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REPOGRADE_CONFIG";

/// Environment variable holding the grading endpoint credential
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "repograde.toml";

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PARALLEL: usize = 5;
pub const MAX_PARALLEL: usize = 32;

/// Root of `repograde.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub grading: GradingConfig,
    pub snapshot: SnapshotConfig,
    pub logging: LoggingConfig,
}

/// `[grading]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Chat-completions URL
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Fallback credential when the environment variable is unset
    pub api_key: Option<String>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

/// `[snapshot]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Program and leading arguments; `<url> -o <dest>` is appended
    pub tool: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            tool: vec!["uvx".to_string(), "gitingest".to_string()],
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Parse a config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;

    if config.snapshot.tool.is_empty() {
        return Err(Error::Config(format!(
            "{}: [snapshot] tool must name a program",
            path.display()
        )));
    }
    if config.grading.timeout_secs == 0 {
        return Err(Error::Config(format!(
            "{}: [grading] timeout_secs must be positive",
            path.display()
        )));
    }

    Ok(config)
}

/// Config file resolution
///
/// Priority order:
/// 1. `--config` command-line argument (must exist)
/// 2. `REPOGRADE_CONFIG` environment variable
/// 3. `./repograde.toml`
/// 4. `<user config dir>/repograde/config.toml`
/// 5. Compiled defaults
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file to load, if any
    pub fn config_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.cli_path {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(Some(path));
            }
            warn!(
                "{} points to missing file {}, ignoring",
                CONFIG_ENV_VAR,
                path.display()
            );
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Ok(Some(local));
        }

        if let Some(user) = dirs::config_dir().map(|d| d.join("repograde").join("config.toml")) {
            if user.is_file() {
                return Ok(Some(user));
            }
        }

        Ok(None)
    }

    /// Load the resolved config file, falling back to defaults
    pub fn load(&self) -> Result<TomlConfig> {
        match self.config_path()? {
            Some(path) => {
                let config = load_toml_config(&path)?;
                info!("Configuration loaded from {}", path.display());
                Ok(config)
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Resolve the grading API key
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = config
        .grading
        .api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "API key found in both {} and config file. Using environment (highest priority).",
            API_KEY_ENV_VAR
        );
    }

    if let Some(key) = env_key {
        info!("API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("API key loaded from config file");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Grading API key not configured. Set one of:\n\
         1. Environment: {}=your-key-here\n\
         2. Config file: [grading] api_key = \"your-key\"",
        API_KEY_ENV_VAR
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
