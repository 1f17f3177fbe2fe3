//! Drive a [`FlightSession`] from recorded telemetry.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{info, warn};

use super::ReplayCommand;
use crate::config::Config;
use crate::document::write_log;
use crate::error::{Error, Result};
use crate::phase::PhaseEvent;
use crate::recorder::{ComposedLog, FinalizeReason, PositionSample};
use crate::session::{AircraftInfo, FlightSession};

/// Parse newline-delimited JSON samples. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`Error::Io`] on read failure, [`Error::Json`] for a malformed line
/// and [`Error::InvalidTelemetry`] for a sample with an out-of-range field.
pub fn read_telemetry(reader: impl BufRead) -> Result<Vec<PositionSample>> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: PositionSample = serde_json::from_str(&line).map_err(|e| {
            warn!(line = index + 1, error = %e, "Malformed telemetry sample");
            Error::Json(e)
        })?;
        if let Some(field) = sample.out_of_range_field() {
            warn!(line = index + 1, field, "Out-of-range telemetry sample");
            return Err(Error::InvalidTelemetry {
                line: index + 1,
                field,
            });
        }
        samples.push(sample);
    }
    Ok(samples)
}

/// Build a session from the command's inputs and feed it `samples`.
#[must_use]
pub fn replay_session(
    cmd: &ReplayCommand,
    config: &Config,
    samples: &[PositionSample],
) -> FlightSession {
    let mut session = FlightSession::new(config);

    if let Some(flight) = &cmd.flight {
        session.on_flight_loaded(flight);
    }
    if let Some(aircraft) = &cmd.aircraft {
        session.on_aircraft_loaded(aircraft);
    }
    if let Some(plan) = &cmd.plan {
        session.on_flight_plan_loaded(plan);
    }
    session.on_aircraft_info(AircraftInfo {
        atc_id: cmd.atc_id.clone(),
        atc_type: cmd.atc_type.clone(),
        title: cmd.title.clone(),
    });
    if let Some(date) = cmd.date {
        session.on_startup_date(date);
    }
    session.on_cumulus_x_code(cmd.cx_code);
    session.set_thermal_file_present(cmd.thermal_file_present);

    for sample in samples {
        if let Some(PhaseEvent::Landing { at, airborne_seconds }) = session.on_telemetry(*sample) {
            info!(at, airborne_seconds, "Landing in replayed telemetry");
        }
    }
    session
}

/// Replay the telemetry file, compose the log as on quit, and write it.
///
/// Returns the written path and the composed log.
///
/// # Errors
///
/// Returns an error if the telemetry cannot be read, the session is too
/// short, or the log cannot be written.
pub fn run_replay(cmd: &ReplayCommand, config: &Config) -> Result<(PathBuf, ComposedLog)> {
    let file = File::open(&cmd.telemetry).map_err(|e| Error::file_read(&cmd.telemetry, e))?;
    let samples = read_telemetry(BufReader::new(file))?;
    info!(samples = samples.len(), "Read telemetry");

    let session = replay_session(cmd, config, &samples);
    let log = session.finalize(FinalizeReason::Quit)?;

    let dir = cmd.output_dir.clone().unwrap_or_else(|| config.log_dir());
    let path = write_log(dir, &log)?;
    Ok((path, log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{verify_file, VerifyOutcome};
    use std::fmt::Write as _;

    fn command(telemetry: PathBuf, output_dir: PathBuf) -> ReplayCommand {
        ReplayCommand {
            telemetry,
            flight: None,
            aircraft: None,
            plan: None,
            atc_id: "D-1234".to_string(),
            atc_type: "Glider".to_string(),
            title: "ASK 21".to_string(),
            date: None,
            cx_code: 0,
            thermal_file_present: false,
            output_dir: Some(output_dir),
        }
    }

    fn telemetry(count: u32) -> String {
        let mut text = String::new();
        for t in 0..count {
            writeln!(
                text,
                r#"{{"time_of_day_seconds": {}, "latitude_deg": 47.5, "longitude_deg": 8.5, "altitude_meters": 700.0, "on_ground": false, "engine_rpm": 0}}"#,
                36_000 + t
            )
            .unwrap();
        }
        text
    }

    #[test]
    fn test_read_telemetry_skips_blank_lines() {
        let text = format!("{}\n\n", telemetry(2));
        let samples = read_telemetry(text.as_bytes()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].time_of_day_seconds, 36_001);
    }

    #[test]
    fn test_read_telemetry_rejects_bad_line() {
        let err = read_telemetry("{\"nope\": 1}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_read_telemetry_rejects_out_of_range() {
        let latitude = telemetry(3).replacen("\"latitude_deg\": 47.5", "\"latitude_deg\": 123.5", 1);
        let err = read_telemetry(latitude.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTelemetry {
                line: 1,
                field: "latitude_deg"
            }
        ));

        let time = format!(
            "{}\n{}",
            telemetry(1),
            telemetry(1).replace("36000", "100000")
        );
        let err = read_telemetry(time.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTelemetry {
                line: 3,
                field: "time_of_day_seconds"
            }
        ));
    }

    #[test]
    fn test_replay_rejects_out_of_range_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("telemetry.jsonl");
        let text = format!(
            "{}{}",
            telemetry(40),
            telemetry(1).replace("36000", "100000")
        );
        std::fs::write(&input, text).unwrap();
        let out = dir.path().join("out");

        let err = run_replay(&command(input, out.clone()), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidTelemetry { line: 41, .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_replay_writes_verifiable_log() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("telemetry.jsonl");
        std::fs::write(&input, telemetry(40)).unwrap();
        let out = dir.path().join("out");

        let (path, log) = run_replay(&command(input, out.clone()), &Config::default()).unwrap();
        assert!(path.starts_with(&out));
        assert_eq!(log.records, 10);
        assert!(log.suggested_name.contains("(autosave on quit)"));
        assert_eq!(verify_file(&path).unwrap().outcome, VerifyOutcome::Ok);
    }

    #[test]
    fn test_replay_too_short() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("telemetry.jsonl");
        std::fs::write(&input, telemetry(8)).unwrap();

        let err = run_replay(&command(input, dir.path().to_path_buf()), &Config::default())
            .unwrap_err();
        assert!(err.is_session_too_short());
    }

    #[test]
    fn test_replay_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_replay(
            &command(dir.path().join("absent.jsonl"), dir.path().to_path_buf()),
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.is_file_error());
    }
}
