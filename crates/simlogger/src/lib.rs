//! `simlogger` - Tamper-evident IGC flight logs from simulator telemetry
//!
//! This library turns a stream of simulator events into a self-checking IGC
//! log. Companion files (flight, weather, aircraft) are fingerprinted when
//! they load, position samples are buffered while the aircraft flies, and on
//! finalize the whole session is written out with a checksum trailer that any
//! later edit will break.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod checksum;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod logging;
pub mod phase;
pub mod recorder;
pub mod route;
pub mod session;
pub mod shared;

pub use checksum::{checksum, ChecksumState, Digest};
pub use config::Config;
pub use document::{verify, write_log, LogDocument};
pub use error::{Error, Result};
pub use fingerprint::{Verification, VerifyOutcome};
pub use logging::init_logging;
pub use phase::{FlightPhaseTracker, GroundPhase, PhaseEvent};
pub use recorder::{ComposedLog, FinalizeReason, LogRecorder, PositionSample};
pub use route::{RoutePlan, RoutePlanParser};
pub use session::{AircraftInfo, CompanionFile, FlightSession, LockStatus};
pub use shared::SharedSession;
