//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

/// Verify command arguments.
#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Log file to check
    pub file: PathBuf,
}

/// Fingerprint command arguments.
#[derive(Debug, Args)]
pub struct FingerprintCommand {
    /// File to fingerprint
    pub file: PathBuf,

    /// Treat the file as aircraft.cfg and hash only its performance sections
    #[arg(long)]
    pub aircraft_cfg: bool,
}

/// Plan command arguments.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Flight plan (.PLN) file
    pub file: PathBuf,
}

/// Replay command arguments.
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Newline-delimited JSON position samples
    pub telemetry: PathBuf,

    /// Flight file loaded for the session
    #[arg(long, value_name = "FLT")]
    pub flight: Option<PathBuf>,

    /// Aircraft flight model file; aircraft.cfg is read from its folder
    #[arg(long, value_name = "AIR")]
    pub aircraft: Option<PathBuf>,

    /// Flight plan declaring the task
    #[arg(long, value_name = "PLN")]
    pub plan: Option<PathBuf>,

    /// ATC identifier
    #[arg(long, default_value = "")]
    pub atc_id: String,

    /// ATC type
    #[arg(long, default_value = "")]
    pub atc_type: String,

    /// Aircraft title
    #[arg(long, default_value = "")]
    pub title: String,

    /// Simulator date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// CumulusX lock code (nonzero means locked)
    #[arg(long, default_value_t = 0)]
    pub cx_code: u32,

    /// The thermal descriptions file is still in place
    #[arg(long)]
    pub thermal_file_present: bool,

    /// Directory to write the log into (defaults to the configured log directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
