//! Configuration management for simlogger.
//!
//! Configuration is loaded with figment from defaults, a TOML file and
//! environment variables, then validated before use.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::phase::{DEFAULT_MIN_FLIGHT_SECONDS, DEFAULT_MIN_SAMPLES};
use crate::recorder::{DEFAULT_MAX_RECORDS, DEFAULT_MIN_RECORDS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default application directory name.
const APP_DIR_NAME: &str = "simlogger";

/// Subdirectory of the data directory that receives finished logs.
const LOG_DIR_NAME: &str = "logs";

/// Prefix for environment overrides; `__` separates nested keys.
const ENV_PREFIX: &str = "SIMLOGGER_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (`SIMLOGGER_RECORDER__MAX_RECORDS=...`)
/// 2. TOML config file at `~/.config/simlogger/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Position buffering and output.
    pub recorder: RecorderConfig,
    /// Takeoff and landing detection.
    pub phase: PhaseConfig,
    /// Names written into the log header.
    pub identity: IdentityConfig,
}

/// Recorder-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Maximum number of position samples kept per session.
    pub max_records: usize,
    /// Minimum number of samples needed to write a log.
    pub min_records: usize,
    /// Only every n-th telemetry tick becomes a position sample.
    pub tick_interval: u32,
    /// Directory for finished logs.
    /// Defaults to `~/.local/share/simlogger/logs`
    pub log_dir: Option<PathBuf>,
}

/// Phase detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Samples observed before transitions are reported.
    pub min_samples: usize,
    /// Airborne seconds required before a touchdown counts as a landing.
    pub min_flight_seconds: u32,
}

/// Identity strings for the log header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Logger name for the `A` record and the recorder type header.
    pub logger_name: String,
    /// Simulator name for the GPS and pressure sensor headers.
    pub simulator: String,
    /// Hardware version header value.
    pub hardware_version: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            min_records: DEFAULT_MIN_RECORDS,
            tick_interval: 4,
            log_dir: None, // Resolved at runtime
        }
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            min_flight_seconds: DEFAULT_MIN_FLIGHT_SECONDS,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            logger_name: "sim_logger".to_string(),
            simulator: "Microsoft Flight Simulator".to_string(),
            hardware_version: "2009".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        let config = Self::figment(&config_file).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from one TOML file only, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(APP_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let recorder = &self.recorder;
        if recorder.max_records == 0 {
            return Err(Error::ConfigValidation {
                message: "max_records must be greater than 0".to_string(),
            });
        }

        if recorder.min_records > recorder.max_records {
            return Err(Error::ConfigValidation {
                message: format!(
                    "min_records ({}) cannot be greater than max_records ({})",
                    recorder.min_records, recorder.max_records
                ),
            });
        }

        if recorder.tick_interval == 0 {
            return Err(Error::ConfigValidation {
                message: "tick_interval must be greater than 0".to_string(),
            });
        }

        if self.identity.logger_name.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "logger_name must not be empty".to_string(),
            });
        }

        let identity = &self.identity;
        for (key, value) in [
            ("logger_name", &identity.logger_name),
            ("simulator", &identity.simulator),
            ("hardware_version", &identity.hardware_version),
        ] {
            if value.chars().any(char::is_control) {
                return Err(Error::ConfigValidation {
                    message: format!("{key} must not contain control characters"),
                });
            }
        }

        Ok(())
    }

    /// Get the log directory, resolving defaults if not set.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.recorder
            .log_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOG_DIR_NAME))
    }
}
