//! Command-line interface for simlogger.
//!
//! This module provides the CLI structure for the `simlog` binary, plus the
//! pieces of command handling that are worth testing without a process.

mod commands;
mod replay;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, FingerprintCommand, PlanCommand, ReplayCommand, VerifyCommand};
pub use replay::{read_telemetry, replay_session, run_replay};

use crate::error::Result;
use crate::fingerprint::Verification;

/// Exit status for a verified log.
pub const EXIT_OK: u8 = 0;

/// Exit status for a log whose checksum does not hold.
pub const EXIT_BAD_CHECKSUM: u8 = 1;

/// Exit status for a log that could not be read.
pub const EXIT_FILE_ERROR: u8 = 2;

/// simlog - Tamper-evident IGC flight logs
///
/// Verifies the checksum trailer of simulator-recorded IGC files, fingerprints
/// companion files and replays recorded telemetry into new logs.
#[derive(Debug, Parser)]
#[command(name = "simlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the checksum trailer of an IGC file
    Verify(VerifyCommand),

    /// Print the fingerprint of a file
    Fingerprint(FingerprintCommand),

    /// Print the task declaration lines a flight plan produces
    Plan(PlanCommand),

    /// Build a log from recorded telemetry
    Replay(ReplayCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}

/// User-facing message and exit status for a verification attempt.
#[must_use]
pub fn verify_report(path: &Path, result: &Result<Verification>) -> (String, u8) {
    match result {
        Ok(verification) => {
            let status = if verification.outcome.is_ok() {
                EXIT_OK
            } else {
                EXIT_BAD_CHECKSUM
            };
            (verification.outcome.message().to_string(), status)
        }
        Err(_) => (
            format!("FILE ERROR. Couldn't read the igc file \"{}\".", path.display()),
            EXIT_FILE_ERROR,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::verify_file;
    use clap::CommandFactory;

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "simlog");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        let cli = Cli::try_parse_from(["simlog", "-q", "verify", "a.igc"]).unwrap();
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Quiet);

        let cli = Cli::try_parse_from(["simlog", "-vv", "verify", "a.igc"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.verbosity(), crate::logging::Verbosity::Debug);
    }

    #[test]
    fn test_parse_verify() {
        let cli = Cli::try_parse_from(["simlog", "verify", "flight.igc"]).unwrap();
        match cli.command {
            Command::Verify(cmd) => assert_eq!(cmd.file, PathBuf::from("flight.igc")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fingerprint() {
        let cli = Cli::try_parse_from(["simlog", "fingerprint", "aircraft.cfg", "--aircraft-cfg"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Fingerprint(FingerprintCommand {
                aircraft_cfg: true,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::try_parse_from([
            "simlog",
            "replay",
            "t.jsonl",
            "--atc-id",
            "D-1234",
            "--date",
            "2024-06-15",
            "--cx-code",
            "3",
            "-o",
            "/tmp/out",
        ])
        .unwrap();
        let Command::Replay(cmd) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(cmd.atc_id, "D-1234");
        assert_eq!(cmd.date, chrono::NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(cmd.cx_code, 3);
        assert_eq!(cmd.output_dir, Some(PathBuf::from("/tmp/out")));
        assert!(cmd.flight.is_none());
    }

    #[test]
    fn test_parse_replay_bad_date() {
        assert!(Cli::try_parse_from(["simlog", "replay", "t.jsonl", "--date", "15/06/2024"]).is_err());
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["simlog", "-c", "/custom/config.toml", "config", "validate"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: None })
        ));
    }

    #[test]
    fn test_verify_report_ok_and_bad() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.igc");
        let mut doc = crate::document::LogDocument::new();
        doc.push("AXXX sim_logger");
        std::fs::write(&good, doc.finish()).unwrap();
        let bad = dir.path().join("bad.igc");
        std::fs::write(&bad, "AXXX\n").unwrap();

        let (message, status) = verify_report(&good, &verify_file(&good));
        assert_eq!(status, EXIT_OK);
        assert_eq!(message, "IGC file checks OK.");

        let (message, status) = verify_report(&bad, &verify_file(&bad));
        assert_eq!(status, EXIT_BAD_CHECKSUM);
        assert_eq!(message, "BAD CHECKSUM. This file does not contain a 'G' record.");
    }

    #[test]
    fn test_verify_report_file_error() {
        let path = Path::new("/nonexistent/flight.igc");
        let (message, status) = verify_report(path, &verify_file(path));
        assert_eq!(status, EXIT_FILE_ERROR);
        assert_eq!(
            message,
            "FILE ERROR. Couldn't read the igc file \"/nonexistent/flight.igc\"."
        );
    }
}
