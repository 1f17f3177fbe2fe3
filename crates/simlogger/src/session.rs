//! One flight, from load to finalize.
//!
//! A [`FlightSession`] is driven by the simulator bridge through explicit
//! event methods: file loads, aircraft strings, lock notifications and
//! telemetry ticks. It owns the fingerprints, the declared route, the phase
//! tracker and the position buffer, and composes the log on request.
//!
//! Loads replace state rather than merging into it. Loading a flight,
//! aircraft or plan also restarts position recording, since the earlier
//! samples no longer describe the loaded setup.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checksum::Digest;
use crate::config::{Config, IdentityConfig};
use crate::error::{Error, Result};
use crate::filter::PerformanceFilter;
use crate::fingerprint::{fingerprint_binary, fingerprint_filtered_text};
use crate::phase::{FlightPhaseTracker, PhaseEvent};
use crate::recorder::{ComposedLog, FinalizeReason, LogHeader, LogRecorder, PositionSample};
use crate::route::{load_route_plan, RoutePlan};

/// File name of the aircraft configuration next to the AIR file.
pub const AIRCRAFT_CFG_NAME: &str = "aircraft.cfg";

/// Display name recorded for a companion file that could not be read.
pub const NOT_FOUND: &str = "not found";

/// A file whose fingerprint goes into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompanionFile {
    /// The flight (`.FLT`) file.
    Flight,
    /// Weather (`.WX`) next to the flight file.
    Weather,
    /// CumulusX settings (`.CMX`) next to the flight file.
    CumulusX,
    /// Mission (`.XML`) next to the flight file.
    Mission,
    /// Aircraft configuration, performance sections only.
    AircraftCfg,
    /// Flight model (`.AIR`) file.
    Air,
}

impl CompanionFile {
    /// Order of the fingerprint lines in the log.
    pub const ALL: [Self; 6] = [
        Self::Flight,
        Self::Weather,
        Self::CumulusX,
        Self::Mission,
        Self::AircraftCfg,
        Self::Air,
    ];

    /// Order in which digests feed the aggregate checksum.
    pub const AGGREGATE_ORDER: [Self; 6] = [
        Self::Flight,
        Self::Air,
        Self::Weather,
        Self::CumulusX,
        Self::AircraftCfg,
        Self::Mission,
    ];

    /// Label used in the fingerprint line.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Flight => "FLT",
            Self::Weather => "WX",
            Self::CumulusX => "CMX",
            Self::Mission => "mission",
            Self::AircraftCfg => "aircraft.cfg",
            Self::Air => "AIR",
        }
    }

    /// Extension of the sibling file derived from the flight file, if any.
    #[must_use]
    pub fn flight_sibling_extension(self) -> Option<&'static str> {
        match self {
            Self::Weather => Some("WX"),
            Self::CumulusX => Some("CMX"),
            Self::Mission => Some("XML"),
            _ => None,
        }
    }
}

impl fmt::Display for CompanionFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Digest and short name of one companion file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Content digest, or [`Digest::UNAVAILABLE`].
    pub digest: Digest,
    /// `folder/file` name shown next to the digest.
    pub display_name: String,
}

impl Fingerprint {
    /// Placeholder for a file that was never loaded or could not be read.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            digest: Digest::UNAVAILABLE,
            display_name: NOT_FOUND.to_string(),
        }
    }

    /// Whether a real digest was computed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.display_name != NOT_FOUND
    }

    /// Fingerprint `path` as `kind`, degrading to [`Fingerprint::unavailable`]
    /// when the file cannot be read.
    #[must_use]
    pub fn of(kind: CompanionFile, path: &Path) -> Self {
        let digest = match kind {
            CompanionFile::AircraftCfg => {
                fingerprint_filtered_text(path, &mut PerformanceFilter::new())
            }
            _ => fingerprint_binary(path),
        };
        match digest {
            Ok(digest) => Self {
                digest,
                display_name: display_name(path),
            },
            Err(e) => {
                warn!(file = %kind, error = %e, "Companion file unavailable");
                Self::unavailable()
            }
        }
    }
}

/// Fingerprints by companion file.
pub type Fingerprints = BTreeMap<CompanionFile, Fingerprint>;

/// Parent folder name and file name joined with `/`.
#[must_use]
pub fn display_name(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.parent().and_then(Path::file_name) {
        Some(folder) => format!("{}/{file}", folder.to_string_lossy()),
        None => file,
    }
}

/// External lock flags reported in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockStatus {
    /// CumulusX lock code; nonzero means locked.
    pub cumulus_x_code: u32,
    /// Weather file fingerprinted on load and not changed since.
    pub weather_locked: bool,
    /// The thermal descriptions file is still in place.
    pub thermal_file_present: bool,
}

impl LockStatus {
    /// Whether CumulusX reported a lock.
    #[must_use]
    pub fn cumulus_x_locked(&self) -> bool {
        self.cumulus_x_code != 0
    }

    /// CumulusX label for the aggregate checksum.
    #[must_use]
    pub fn cumulus_x_label(&self) -> &'static str {
        if self.cumulus_x_locked() {
            "CX LOCKED"
        } else {
            "CX UNLOCKED"
        }
    }

    /// Weather label for the aggregate checksum.
    #[must_use]
    pub fn weather_label(&self) -> &'static str {
        if self.weather_locked {
            "WX LOCKED"
        } else {
            "WX UNLOCKED"
        }
    }

    /// Thermal file label for the aggregate checksum.
    #[must_use]
    pub fn thermal_label(&self) -> &'static str {
        if self.thermal_file_present {
            "THERM FILE PRESENT"
        } else {
            "NO THERM FILE"
        }
    }
}

/// Aircraft strings reported by the simulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftInfo {
    /// ATC identifier (registration / competition id).
    pub atc_id: String,
    /// ATC type, written as the competition class.
    pub atc_type: String,
    /// Aircraft title, written as the glider type.
    pub title: String,
}

/// State of one flight.
#[derive(Debug)]
pub struct FlightSession {
    identity: IdentityConfig,
    tick_interval: u32,
    ticks: u32,
    recorder: LogRecorder,
    phase: FlightPhaseTracker,
    fingerprints: Fingerprints,
    locks: LockStatus,
    aircraft: AircraftInfo,
    route: Option<RoutePlan>,
    date: Option<NaiveDate>,
    flight_name: String,
}

impl Default for FlightSession {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl FlightSession {
    /// Create an empty session using the recorder, phase and identity settings.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            identity: config.identity.clone(),
            tick_interval: config.recorder.tick_interval.max(1),
            ticks: 0,
            recorder: LogRecorder::new(config.recorder.max_records, config.recorder.min_records),
            phase: FlightPhaseTracker::new(
                config.phase.min_samples,
                config.phase.min_flight_seconds,
            ),
            fingerprints: Fingerprints::new(),
            locks: LockStatus::default(),
            aircraft: AircraftInfo::default(),
            route: None,
            date: None,
            flight_name: String::new(),
        }
    }

    fn restart_recording(&mut self) {
        if !self.recorder.is_empty() {
            debug!(discarded = self.recorder.len(), "Restarting position recording");
        }
        self.recorder.clear();
        self.phase.reset();
        self.ticks = 0;
    }

    fn fingerprint(&mut self, kind: CompanionFile, path: &Path) -> bool {
        let fingerprint = Fingerprint::of(kind, path);
        let available = fingerprint.is_available();
        self.fingerprints.insert(kind, fingerprint);
        available
    }

    /// A flight file was loaded.
    ///
    /// Fingerprints the flight file and its WX, CMX and XML siblings. The
    /// weather counts as locked when its file could be fingerprinted.
    pub fn on_flight_loaded(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.restart_recording();

        self.flight_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.fingerprint(CompanionFile::Flight, path);

        for kind in [CompanionFile::Weather, CompanionFile::CumulusX, CompanionFile::Mission] {
            if let Some(ext) = kind.flight_sibling_extension() {
                let sibling = path.with_extension(ext);
                let available = self.fingerprint(kind, &sibling);
                if kind == CompanionFile::Weather {
                    self.locks.weather_locked = available;
                }
            }
        }
        info!(flight = %self.flight_name, "Flight loaded");
    }

    /// An aircraft was loaded; `air_path` is its flight model file.
    ///
    /// The aircraft configuration is taken from the same folder.
    pub fn on_aircraft_loaded(&mut self, air_path: impl AsRef<Path>) {
        let air_path = air_path.as_ref();
        self.restart_recording();

        self.fingerprint(CompanionFile::Air, air_path);
        let cfg_path = air_path
            .parent()
            .map_or_else(|| PathBuf::from(AIRCRAFT_CFG_NAME), |dir| dir.join(AIRCRAFT_CFG_NAME));
        self.fingerprint(CompanionFile::AircraftCfg, &cfg_path);
        info!(air = %display_name(air_path), "Aircraft loaded");
    }

    /// A flight plan was loaded.
    ///
    /// An unreadable plan clears the route and is logged; it never fails the
    /// session.
    pub fn on_flight_plan_loaded(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match load_route_plan(path) {
            Ok(plan) => self.set_route_plan(plan),
            Err(e) => {
                warn!(error = %e, "Flight plan unavailable");
                self.restart_recording();
                self.route = None;
            }
        }
    }

    /// Replace the declared route with an already parsed plan.
    pub fn set_route_plan(&mut self, plan: RoutePlan) {
        self.restart_recording();
        info!(title = %plan.title, waypoints = plan.waypoints.len(), "Flight plan loaded");
        self.route = Some(plan);
    }

    /// Aircraft strings arrived.
    pub fn on_aircraft_info(&mut self, info: AircraftInfo) {
        debug!(atc_id = %info.atc_id, "Aircraft info received");
        self.aircraft = info;
    }

    /// The simulator reported its zulu date.
    pub fn on_startup_date(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }

    /// One telemetry tick.
    ///
    /// Every tick updates the flight phase; only every n-th tick is offered
    /// to the position buffer. Returns any takeoff or landing detected.
    /// Ticks with out-of-range fields are ignored entirely.
    pub fn on_telemetry(&mut self, sample: PositionSample) -> Option<PhaseEvent> {
        if let Some(field) = sample.out_of_range_field() {
            warn!(field, t = sample.time_of_day_seconds, "Ignoring out-of-range telemetry");
            return None;
        }
        let event = self.phase.observe(sample.on_ground, sample.time_of_day_seconds);

        self.ticks += 1;
        if self.ticks >= self.tick_interval {
            self.ticks = 0;
            self.recorder.accept(sample);
        }

        if let Some(event) = event {
            info!(?event, "Flight phase changed");
        }
        event
    }

    /// CumulusX reported its lock code.
    pub fn on_cumulus_x_code(&mut self, code: u32) {
        self.locks.cumulus_x_code = code;
    }

    /// The weather was changed inside the simulator.
    pub fn on_weather_changed(&mut self) {
        if self.locks.weather_locked {
            info!("Weather changed, WX no longer locked");
        }
        self.locks.weather_locked = false;
    }

    /// Record whether the thermal descriptions file is still in place.
    pub fn set_thermal_file_present(&mut self, present: bool) {
        self.locks.thermal_file_present = present;
    }

    /// Accepted position samples.
    #[must_use]
    pub fn positions(&self) -> &[PositionSample] {
        self.recorder.positions()
    }

    /// Number of accepted position samples.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.recorder.len()
    }

    /// Current fingerprints.
    #[must_use]
    pub fn fingerprints(&self) -> &Fingerprints {
        &self.fingerprints
    }

    /// Current lock flags.
    #[must_use]
    pub fn locks(&self) -> &LockStatus {
        &self.locks
    }

    /// The declared route, if a plan was loaded.
    #[must_use]
    pub fn route(&self) -> Option<&RoutePlan> {
        self.route.as_ref()
    }

    /// The phase tracker.
    #[must_use]
    pub fn phase(&self) -> &FlightPhaseTracker {
        &self.phase
    }

    /// Compose the log now, stamped with the local time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionTooShort`] if too few samples were recorded.
    pub fn finalize(&self, reason: FinalizeReason) -> Result<ComposedLog> {
        self.finalize_at(reason, Local::now().naive_local())
    }

    /// Compose the log with an explicit wall-clock time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionTooShort`] if too few samples were recorded.
    pub fn finalize_at(&self, reason: FinalizeReason, now: NaiveDateTime) -> Result<ComposedLog> {
        let header = LogHeader {
            identity: &self.identity,
            aircraft: &self.aircraft,
            date: self.date,
            fingerprints: &self.fingerprints,
            locks: &self.locks,
            route: self.route.as_ref(),
            flight_name: &self.flight_name,
        };
        self.recorder.finalize(&header, reason, now)
    }

    /// The simulator is quitting. Returns an autosave log if the session is
    /// long enough to be worth keeping.
    ///
    /// # Errors
    ///
    /// Propagates composition errors other than a short session.
    pub fn on_quit(&self) -> Result<Option<ComposedLog>> {
        self.autosave(FinalizeReason::Quit)
    }

    /// The simulator connection was lost. Same policy as [`Self::on_quit`].
    ///
    /// # Errors
    ///
    /// Propagates composition errors other than a short session.
    pub fn on_crash(&self) -> Result<Option<ComposedLog>> {
        self.autosave(FinalizeReason::Crash)
    }

    fn autosave(&self, reason: FinalizeReason) -> Result<Option<ComposedLog>> {
        if self.recorder.len() <= self.recorder.min_records() {
            debug!(records = self.recorder.len(), ?reason, "Session too short for autosave");
            return Ok(None);
        }
        match self.finalize(reason) {
            Ok(log) => Ok(Some(log)),
            Err(Error::SessionTooShort { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
