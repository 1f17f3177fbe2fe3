//! Position buffering and log composition.
//!
//! [`LogRecorder`] keeps the accepted position samples for one session and
//! turns them, together with the session metadata in a [`LogHeader`], into a
//! finished log. Composition happens entirely in memory; writing the result
//! is left to [`crate::document::write_log`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::checksum::{ChecksumState, Digest};
use crate::config::IdentityConfig;
use crate::document::{format_position_line, single_line, LogDocument};
use crate::error::{Error, Result};
use crate::route::RoutePlan;
use crate::session::{AircraftInfo, CompanionFile, Fingerprint, Fingerprints, LockStatus};

/// Default cap on retained position samples.
pub const DEFAULT_MAX_RECORDS: usize = 40_000;

/// Default minimum number of samples needed to compose a log.
pub const DEFAULT_MIN_RECORDS: usize = 4;

/// Extension declaration for the FXA and ENL fields of the position lines.
const EXTENSION_LINE: &str = "I023638FXA3941ENL";

const SECONDS_PER_DAY: u32 = 86_400;

/// One telemetry sample accepted into the log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Simulator zulu time, seconds since midnight.
    pub time_of_day_seconds: u32,
    /// Latitude in decimal degrees, north positive.
    pub latitude_deg: f64,
    /// Longitude in decimal degrees, east positive.
    pub longitude_deg: f64,
    /// Altitude above sea level in meters.
    pub altitude_meters: f64,
    /// Simulator on-ground flag.
    pub on_ground: bool,
    /// Engine 1 RPM.
    #[serde(default)]
    pub engine_rpm: i32,
}

impl PositionSample {
    /// Name of the first field outside its valid range, if any.
    ///
    /// Times must fall within one day, coordinates within the globe, and
    /// altitude must be a finite number.
    #[must_use]
    pub fn out_of_range_field(&self) -> Option<&'static str> {
        if self.time_of_day_seconds >= SECONDS_PER_DAY {
            Some("time_of_day_seconds")
        } else if !(-90.0..=90.0).contains(&self.latitude_deg) {
            Some("latitude_deg")
        } else if !(-180.0..=180.0).contains(&self.longitude_deg) {
            Some("longitude_deg")
        } else if !self.altitude_meters.is_finite() {
            Some("altitude_meters")
        } else {
            None
        }
    }

    /// Whether every field is within its valid range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.out_of_range_field().is_none()
    }
}

/// Why a log is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalizeReason {
    /// The user asked for a log.
    #[default]
    Manual,
    /// The simulator is shutting down.
    Quit,
    /// The simulator connection dropped unexpectedly.
    Crash,
    /// A landing was detected.
    Landing,
}

impl FinalizeReason {
    /// Label appended to the file name; empty for manual saves.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Manual => "",
            Self::Quit => "autosave on quit",
            Self::Crash => "autosave on sim crash",
            Self::Landing => "autosave on landing",
        }
    }
}

/// Session metadata needed to compose a log.
#[derive(Debug, Clone, Copy)]
pub struct LogHeader<'a> {
    /// Logger and simulator names.
    pub identity: &'a IdentityConfig,
    /// Aircraft strings reported by the simulator.
    pub aircraft: &'a AircraftInfo,
    /// Simulator zulu date, if reported.
    pub date: Option<NaiveDate>,
    /// Companion file fingerprints.
    pub fingerprints: &'a Fingerprints,
    /// External lock flags.
    pub locks: &'a LockStatus,
    /// Declared task, if a plan was loaded.
    pub route: Option<&'a RoutePlan>,
    /// Flight file name without extension, used in the suggested file name.
    pub flight_name: &'a str,
}

/// A composed log ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedLog {
    /// Full document text, trailer included.
    pub text: String,
    /// File name the log should be saved under.
    pub suggested_name: String,
    /// Number of position lines in the log.
    pub records: usize,
}

/// Digest over all companion fingerprints and lock labels.
///
/// Lets a reviewer check one value instead of six. Only the fingerprint strings
/// and labels are absorbed, never file content.
#[must_use]
pub fn aggregate_digest(fingerprints: &Fingerprints, locks: &LockStatus) -> Digest {
    let mut state = ChecksumState::new();
    for kind in CompanionFile::AGGREGATE_ORDER {
        let digest = fingerprints.get(&kind).map_or(Digest::UNAVAILABLE, |f| f.digest);
        state.absorb_str(digest.as_str());
    }
    state.absorb_str(locks.cumulus_x_label());
    state.absorb_str(locks.weather_label());
    state.absorb_str(locks.thermal_label());
    state.digest()
}

/// Bounded, deduplicated buffer of position samples.
#[derive(Debug, Clone)]
pub struct LogRecorder {
    positions: Vec<PositionSample>,
    max_records: usize,
    min_records: usize,
}

impl Default for LogRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS, DEFAULT_MIN_RECORDS)
    }
}

impl LogRecorder {
    /// Create a recorder with explicit limits.
    #[must_use]
    pub fn new(max_records: usize, min_records: usize) -> Self {
        Self {
            positions: Vec::new(),
            max_records,
            min_records,
        }
    }

    /// Offer a sample. Returns `true` if it was retained.
    ///
    /// Samples are dropped when a field is out of range, once the buffer is
    /// full, and when they repeat the timestamp of the previously retained
    /// sample.
    pub fn accept(&mut self, sample: PositionSample) -> bool {
        if let Some(field) = sample.out_of_range_field() {
            debug!(field, "Out-of-range sample dropped");
            return false;
        }
        if self.positions.len() >= self.max_records {
            trace!(max = self.max_records, "Position buffer full, sample dropped");
            return false;
        }
        if let Some(last) = self.positions.last() {
            if last.time_of_day_seconds == sample.time_of_day_seconds {
                trace!(t = sample.time_of_day_seconds, "Duplicate timestamp, sample dropped");
                return false;
            }
        }
        self.positions.push(sample);
        true
    }

    /// Retained samples in order.
    #[must_use]
    pub fn positions(&self) -> &[PositionSample] {
        &self.positions
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no samples have been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether the buffer has reached its cap.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.positions.len() >= self.max_records
    }

    /// Minimum number of samples needed to compose a log.
    #[must_use]
    pub fn min_records(&self) -> usize {
        self.min_records
    }

    /// Drop all samples.
    pub fn clear(&mut self) {
        self.positions.clear();
    }

    /// Compose the log for the current buffer.
    ///
    /// `now` is the local wall-clock time, used for the date/time line and the
    /// suggested file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionTooShort`] if fewer than the minimum number of
    /// samples were retained. Nothing should be persisted in that case.
    pub fn finalize(
        &self,
        header: &LogHeader<'_>,
        reason: FinalizeReason,
        now: NaiveDateTime,
    ) -> Result<ComposedLog> {
        if self.positions.len() < self.min_records {
            return Err(Error::SessionTooShort {
                recorded: self.positions.len(),
                minimum: self.min_records,
            });
        }

        let mut doc = LogDocument::new();
        push_identity(&mut doc, header);
        doc.push(format!(
            "L SIM date/time on users PC:  {}",
            now.format("%Y-%m-%d %H:%M")
        ));
        push_fingerprints(&mut doc, header);

        if let Some(route) = header.route.filter(|r| r.has_route()) {
            doc.extend(route.lines());
        }

        for sample in &self.positions {
            doc.push(format_position_line(sample));
        }

        let suggested_name = suggested_name(header, reason, now);
        debug!(
            name = %suggested_name,
            records = self.positions.len(),
            lines = doc.lines().len(),
            "Composed flight log"
        );

        Ok(ComposedLog {
            text: doc.finish(),
            suggested_name,
            records: self.positions.len(),
        })
    }
}

fn push_identity(doc: &mut LogDocument, header: &LogHeader<'_>) {
    let version = env!("CARGO_PKG_VERSION");
    let logger = single_line(&header.identity.logger_name);
    let simulator = single_line(&header.identity.simulator);
    let hardware = single_line(&header.identity.hardware_version);
    let atc_id = single_line(&header.aircraft.atc_id);
    let date = header
        .date
        .map_or_else(|| "000000".to_string(), |d| d.format("%d%m%y").to_string());

    doc.push(format!("AXXX {logger} v{version}"));
    doc.push(format!("HFDTE{date}"));
    doc.push("HFFXA035");
    doc.push("HFPLTPILOTINCHARGE: not recorded");
    doc.push("HFCM2CREW2: not recorded");
    doc.push(format!(
        "HFGTYGLIDERTYPE:{}",
        single_line(&header.aircraft.title)
    ));
    doc.push(format!("HFGIDGLIDERID:{atc_id}"));
    doc.push("HFDTM100GPSDATUM: WGS-1984");
    doc.push(format!("HFRFWFIRMWAREVERSION: {version}"));
    doc.push(format!("HFRHWHARDWAREVERSION: {hardware}"));
    doc.push(format!("HFFTYFRTYPE: {logger}"));
    doc.push(format!("HFGPSGPS:{simulator}"));
    doc.push(format!("HFPRSPRESSALTSENSOR: {simulator}"));
    doc.push(format!("HFCIDCOMPETITIONID:{atc_id}"));
    doc.push(format!(
        "HFCCLCOMPETITIONCLASS:{}",
        single_line(&header.aircraft.atc_type)
    ));
    doc.push(EXTENSION_LINE);
}

fn push_fingerprints(doc: &mut LogDocument, header: &LogHeader<'_>) {
    let unavailable = Fingerprint::unavailable();
    for kind in CompanionFile::ALL {
        let fingerprint = header.fingerprints.get(&kind).unwrap_or(&unavailable);
        doc.push(format!(
            "L SIM {:<24}{} ({})",
            format!("{} checksum", kind.label()),
            fingerprint.digest,
            single_line(&fingerprint.display_name)
        ));
    }

    let locks = header.locks;
    let locked = |yes: bool| if yes { "LOCKED OK" } else { "UNLOCKED" };
    doc.push(format!(
        "L SIM {:<24}{}",
        "CumulusX status:",
        locked(locks.cumulus_x_locked())
    ));
    doc.push(format!(
        "L SIM {:<24}{}",
        "WX status=",
        locked(locks.weather_locked)
    ));
    doc.push(format!(
        "L SIM ThermalDescriptions.xml {}",
        if locks.thermal_file_present {
            "STILL BEING USED"
        } else {
            "REMOVED OK"
        }
    ));

    doc.push(format!(
        "L SIM GENERAL CHECKSUM            {}  <---- CHECK THIS FIRST",
        aggregate_digest(header.fingerprints, locks)
    ));
}

fn file_name_part(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn suggested_name(header: &LogHeader<'_>, reason: FinalizeReason, now: NaiveDateTime) -> String {
    let mut name = format!(
        "{}_{}{}",
        file_name_part(&header.aircraft.atc_id),
        file_name_part(header.flight_name),
        now.format("_%Y-%m-%d_%H%M")
    );
    let label = reason.label();
    if label.len() > 1 {
        name.push('(');
        name.push_str(label);
        name.push(')');
    }
    name.push_str(".igc");
    name
}
