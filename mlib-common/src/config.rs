//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every field is optional;
//! a missing or unreadable file degrades to compiled defaults with a warning.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `MLIB_ROOT_FOLDER` environment variable
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MLIB_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "mlib.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Root folder for the catalog database and internal metadata
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path (defaults to `<root_folder>/mlib.db`)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Library-wide metadata options
    #[serde(default)]
    pub library: LibraryOptions,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Library-wide metadata options
///
/// Items may override language and country code individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryOptions {
    /// Preferred metadata language (ISO 639-1)
    #[serde(default = "default_language")]
    pub preferred_metadata_language: String,

    /// Metadata country code (ISO 3166-1 alpha-2)
    #[serde(default = "default_country_code")]
    pub metadata_country_code: String,

    /// Write metadata files next to media files
    #[serde(default)]
    pub save_local_metadata: bool,

    /// Allow remote metadata providers
    #[serde(default = "default_true")]
    pub enable_internet_providers: bool,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            preferred_metadata_language: default_language(),
            metadata_country_code: default_country_code(),
            save_local_metadata: false,
            enable_internet_providers: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_country_code() -> String {
    "US".to_string()
}

fn default_true() -> bool {
    true
}

/// Load TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write TOML config to a path, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the platform config file, falling back to defaults
///
/// Missing or invalid files never abort startup.
pub fn load_or_default(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_file() {
            Ok(path) => path,
            Err(e) => {
                debug!("No config file: {}", e);
                return TomlConfig::default();
            }
        },
    };

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default configuration ({}): {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Root folder resolver
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    config: TomlConfig,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: TomlConfig) -> Self {
        Self { cli_arg, config }
    }

    /// Resolve the root folder per priority order
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.config.root_folder {
            return path.clone();
        }

        default_root_folder()
    }

    /// Database path: explicit config entry, else `<root>/mlib.db`
    pub fn database_path(&self) -> PathBuf {
        self.config
            .database_path
            .clone()
            .unwrap_or_else(|| self.resolve().join(DATABASE_FILE_NAME))
    }
}

/// Get default configuration file path for the platform
fn default_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/mlib/config.toml first, then /etc/mlib/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("mlib").join("config.toml"));
        let system_config = PathBuf::from("/etc/mlib/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("mlib").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("mlib"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/mlib"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("mlib"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/mlib"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("mlib"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\mlib"))
    } else {
        PathBuf::from("./mlib_data")
    }
}
