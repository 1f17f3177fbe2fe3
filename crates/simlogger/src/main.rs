//! `simlog` - CLI for simlogger
//!
//! Verifies IGC logs, fingerprints companion files, previews flight plan task
//! declarations and replays recorded telemetry into new logs.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use simlogger::cli::{
    run_replay, verify_report, Cli, Command, ConfigCommand, FingerprintCommand, PlanCommand,
    ReplayCommand,
};
use simlogger::filter::PerformanceFilter;
use simlogger::fingerprint::{fingerprint_binary, fingerprint_filtered_text, verify_file};
use simlogger::route::load_route_plan;
use simlogger::{init_logging, Config};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Verify(cmd) => {
            let result = verify_file(&cmd.file);
            if let Ok(verification) = &result {
                if let Some(general) = &verification.general_checksum {
                    println!("{general}");
                }
            }
            let (message, status) = verify_report(&cmd.file, &result);
            println!("{message}");
            Ok(ExitCode::from(status))
        }
        Command::Fingerprint(cmd) => handle_fingerprint(&cmd).map(|()| ExitCode::SUCCESS),
        Command::Plan(cmd) => handle_plan(&cmd).map(|()| ExitCode::SUCCESS),
        Command::Replay(cmd) => {
            let config = load_config(cli.config)?;
            handle_replay(&config, &cmd).map(|()| ExitCode::SUCCESS)
        }
        Command::Config(cmd) => handle_config(cli.config, cmd),
    }
}

fn load_config(path: Option<std::path::PathBuf>) -> Result<Config> {
    Config::load_from(path).context("could not load configuration")
}

fn handle_fingerprint(cmd: &FingerprintCommand) -> Result<()> {
    let digest = if cmd.aircraft_cfg {
        fingerprint_filtered_text(&cmd.file, &mut PerformanceFilter::new())?
    } else {
        fingerprint_binary(&cmd.file)?
    };
    println!("{digest}");
    Ok(())
}

fn handle_plan(cmd: &PlanCommand) -> Result<()> {
    let plan = load_route_plan(&cmd.file)?;
    if !plan.is_complete() {
        eprintln!("Missing tags: {}", plan.missing.join(", "));
    }
    if plan.has_route() {
        for line in plan.lines() {
            print!("{line}");
        }
    } else {
        eprintln!("Fewer than two route waypoints; no task declaration would be written.");
    }
    Ok(())
}

fn handle_replay(config: &Config, cmd: &ReplayCommand) -> Result<()> {
    let (path, log) = run_replay(cmd, config)
        .with_context(|| format!("replay of {} failed", cmd.telemetry.display()))?;
    println!("{}", path.display());
    tracing::info!(records = log.records, "Replay complete");
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Recorder]");
                println!("  Log directory:      {}", config.log_dir().display());
                println!("  Max records:        {}", config.recorder.max_records);
                println!("  Min records:        {}", config.recorder.min_records);
                println!("  Tick interval:      {}", config.recorder.tick_interval);
                println!();
                println!("[Phase]");
                println!("  Min samples:        {}", config.phase.min_samples);
                println!("  Min flight seconds: {}", config.phase.min_flight_seconds);
                println!();
                println!("[Identity]");
                println!("  Logger name:        {}", config.identity.logger_name);
                println!("  Simulator:          {}", config.identity.simulator);
                println!("  Hardware version:   {}", config.identity.hardware_version);
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                path.unwrap_or_else(Config::default_config_path).display()
            );
        }
        ConfigCommand::Validate { file } => {
            let target = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", target.display());
            match Config::load_file(&target) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
