//! Fixed-width log lines and the self-checking document.
//!
//! A [`LogDocument`] absorbs every line into a running checksum as it is
//! pushed, so the trailer written by [`LogDocument::finish`] always covers
//! exactly the lines before it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::checksum::{ChecksumState, Digest};
use crate::error::{Error, Result};
use crate::fingerprint::{verify_document, VerifyOutcome, TRAILER_MARKER};
use crate::recorder::PositionSample;

/// Fix accuracy constant written into every position line.
pub const FIX_ACCURACY: u32 = 27;

/// Largest value that fits the 5-digit altitude fields.
const MAX_ALTITUDE: f64 = 99_999.0;

const SECONDS_PER_DAY: u32 = 86_400;

/// 59 minutes and 999 thousandths.
const MAX_THOUSANDTHS: u32 = 59_999;

/// Absorbs representation error in values that are exact in thousandths.
const FRACTION_EPSILON: f64 = 1e-6;

/// An in-progress log: lines plus the checksum of everything pushed so far.
#[derive(Debug, Clone, Default)]
pub struct LogDocument {
    lines: Vec<String>,
    state: ChecksumState,
}

impl LogDocument {
    /// Start an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, terminating it with `\n` if needed.
    pub fn push(&mut self, line: impl Into<String>) {
        let mut line = line.into();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.state.absorb_str(&line);
        self.lines.push(line);
    }

    /// Append several lines in order.
    pub fn extend<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.push(line);
        }
    }

    /// Lines pushed so far.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Digest of every line pushed so far.
    #[must_use]
    pub fn digest(&self) -> Digest {
        self.state.digest()
    }

    /// The trailer line for the current content.
    #[must_use]
    pub fn trailer(&self) -> String {
        format!("{}{}\n", char::from(TRAILER_MARKER), self.digest())
    }

    /// Append the trailer and return the full text.
    #[must_use]
    pub fn finish(self) -> String {
        let trailer = self.trailer();
        let mut text = self.lines.concat();
        text.push_str(&trailer);
        text
    }
}

/// Verify a composed document held in memory.
#[must_use]
pub fn verify(text: &str) -> VerifyOutcome {
    verify_document(text)
}

/// Degrees, whole minutes and thousandths of a minute, truncated.
fn split_degrees(value: f64) -> (u32, u32, u32) {
    let value = value.abs();
    let degrees = value.trunc();
    // Truncate once, on the whole fraction, so exact minute values stay exact.
    let fraction = ((value - degrees) * 60_000.0 + FRACTION_EPSILON).trunc();
    // `as` saturates: NaN and tiny negative rounding errors become 0.
    let total = (fraction as u32).min(MAX_THOUSANDTHS);
    (degrees as u32, total / 1000, total % 1000)
}

/// Load proxy from engine RPM, clamped to three digits.
#[must_use]
pub fn engine_noise_level(rpm: i32) -> u32 {
    if rpm > 9990 {
        999
    } else {
        u32::try_from(rpm / 10).unwrap_or(0)
    }
}

/// Render one position sample as a `B` record.
#[must_use]
pub fn format_position_line(sample: &PositionSample) -> String {
    let t = sample.time_of_day_seconds % SECONDS_PER_DAY;
    let hours = t / 3600;
    let minutes = (t % 3600) / 60;
    let seconds = t % 60;

    let ns = if sample.latitude_deg > 0.0 { 'N' } else { 'S' };
    let ew = if sample.longitude_deg > 0.0 { 'E' } else { 'W' };
    // Clamped so the degree fields never widen the record.
    let (lat_dd, lat_mm, lat_mmm) = split_degrees(sample.latitude_deg.clamp(-90.0, 90.0));
    let (lon_ddd, lon_mm, lon_mmm) = split_degrees(sample.longitude_deg.clamp(-180.0, 180.0));

    // Truncated, then clamped to the 5-digit field.
    let altitude = sample.altitude_meters.trunc().clamp(0.0, MAX_ALTITUDE) as u32;

    format!(
        "B{hours:02}{minutes:02}{seconds:02}{lat_dd:02}{lat_mm:02}{lat_mmm:03}{ns}{lon_ddd:03}{lon_mm:02}{lon_mmm:03}{ew}A{altitude:05}{altitude:05}{FIX_ACCURACY:03}{:03}\n",
        engine_noise_level(sample.engine_rpm)
    )
}

/// Replace line breaks and other control characters so a value stays on one line.
#[must_use]
pub fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Write a composed log into `dir`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`Error::DirectoryCreate`] or [`Error::FileWrite`] on failure.
/// Nothing is retried.
pub fn write_log(dir: impl AsRef<Path>, log: &crate::recorder::ComposedLog) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let path = dir.join(&log.suggested_name);
    fs::write(&path, &log.text).map_err(|source| Error::file_write(&path, source))?;
    info!(path = %path.display(), records = log.records, "Wrote flight log");
    Ok(path)
}
