//! Application configuration loading and validation.
//!
//! Every setting has a compiled-in default matching the station's wiring, so
//! the program runs without any file. An optional TOML file can override
//! individual values:
//!
//! ```toml
//! [logger]
//! level = "debug"
//!
//! [station.gpio]
//! line = 21
//!
//! [transport]
//! host = "broker.lan"
//! ```
//!
//! The configuration is loaded once at startup and stays immutable.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{logger::LoggerConfig, station::StationConfig};

pub mod logger;
pub mod station;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "DHTPULSE_CONFIG";

/// Configuration file used when the environment variable is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/dhtpulse/config.toml";

/// Timestamped console output for use before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

/// Like `print_info!`, but to stderr.
#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file named by `DHTPULSE_CONFIG` does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Top-level configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Sensor, GPIO, observation log and telemetry endpoint settings.
    #[validate(nested)]
    pub station: StationConfig,

    /// Broker connection settings.
    #[validate(nested)]
    pub transport: TransportConfig,
}

pub type TransportConfig = dhtpulse_mqtt::Config;

impl Config {
    /// Locates and loads the configuration, falling back to built-in defaults.
    ///
    /// # Errors
    ///
    /// Fails when an explicitly requested file is missing, or when a file
    /// cannot be read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::get_config_path()? {
            Some(path) => Self::load(&path),
            None => {
                print_info!("No configuration file found, using built-in defaults");
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `DHTPULSE_CONFIG` environment variable (must exist)
    /// 2. `/etc/dhtpulse/config.toml` (used only if present)
    fn get_config_path() -> Result<Option<PathBuf>, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
