//! File fingerprinting and trailer verification.
//!
//! Companion files are fingerprinted when they are loaded so that edits made
//! after the session show up as a changed digest. Finished logs carry their own
//! digest in a trailing `G` record; [`verify_reader`] recomputes it.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::checksum::{ChecksumState, Digest, DIGEST_LEN};
use crate::error::{Error, Result};
use crate::filter::LineFilter;

/// First character of the trailer line.
pub const TRAILER_MARKER: u8 = b'G';

/// Lines starting with this text carry the aggregate companion-file digest.
pub const GENERAL_CHECKSUM_PREFIX: &str = "L SIM GENERAL";

/// Outcome of checking a document's trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The trailer matches the content before it.
    Ok,
    /// No line starts with the trailer marker.
    TrailerNotFound,
    /// The trailer line is shorter than the marker plus a digest.
    TrailerTooShort,
    /// The trailer digest differs from the computed one.
    Mismatch,
}

impl VerifyOutcome {
    /// Whether the document verified.
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Human-readable explanation, as printed by `simlog verify`.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "IGC file checks OK.",
            Self::TrailerTooShort => {
                "BAD CHECKSUM. This file contains a checksum but it is too short."
            }
            Self::TrailerNotFound => "BAD CHECKSUM. This file does not contain a 'G' record.",
            Self::Mismatch => "BAD CHECKSUM. 'G' record found but checksum is wrong.",
        }
    }
}

impl std::fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of verifying a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Trailer check outcome.
    pub outcome: VerifyOutcome,
    /// The aggregate checksum line found before the trailer, if any.
    pub general_checksum: Option<String>,
    /// Digest computed over the lines preceding the trailer.
    pub computed: Digest,
}

/// Fingerprint a file in binary mode.
///
/// Every byte is offered to the checksum; the alphabet decides which count.
///
/// # Errors
///
/// Returns [`Error::FileRead`] if the file cannot be opened or read.
pub fn fingerprint_binary(path: impl AsRef<Path>) -> Result<Digest> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::file_read(path, source))?;
    let digest = fingerprint_reader(file).map_err(|source| Error::file_read(path, source))?;
    debug!(path = %path.display(), %digest, "Fingerprinted binary file");
    Ok(digest)
}

/// Fingerprint any byte stream.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn fingerprint_reader(mut reader: impl Read) -> std::io::Result<Digest> {
    let mut state = ChecksumState::new();
    let mut buf = [0u8; 8192];
    loop {
        let count = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(count) => count,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        state.absorb_bytes(&buf[..count]);
    }
    Ok(state.digest())
}

/// Fingerprint a text file line by line, absorbing only admitted lines.
///
/// # Errors
///
/// Returns [`Error::FileRead`] if the file cannot be opened or read.
pub fn fingerprint_filtered_text(
    path: impl AsRef<Path>,
    filter: &mut impl LineFilter,
) -> Result<Digest> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::file_read(path, source))?;
    let digest = fingerprint_lines(BufReader::new(file), filter)
        .map_err(|source| Error::file_read(path, source))?;
    debug!(path = %path.display(), %digest, "Fingerprinted filtered text file");
    Ok(digest)
}

/// Fingerprint the admitted lines of a buffered reader.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn fingerprint_lines(
    mut reader: impl BufRead,
    filter: &mut impl LineFilter,
) -> std::io::Result<Digest> {
    let mut state = ChecksumState::new();
    let mut line = Vec::new();
    while reader.read_until(b'\n', &mut line)? > 0 {
        if filter.admit(&line) {
            state.absorb_bytes(&line);
        }
        line.clear();
    }
    Ok(state.digest())
}

/// Verify the trailer of a document read from `reader`.
///
/// Lines are absorbed until one starts with [`TRAILER_MARKER`]; the digest
/// following the marker must equal the digest of everything before it.
///
/// # Errors
///
/// Propagates read errors from `reader`.
pub fn verify_reader(mut reader: impl BufRead) -> std::io::Result<Verification> {
    let mut state = ChecksumState::new();
    let mut general_checksum = None;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(Verification {
                outcome: VerifyOutcome::TrailerNotFound,
                general_checksum,
                computed: state.digest(),
            });
        }
        if line.first() == Some(&TRAILER_MARKER) {
            break;
        }
        if line.starts_with(GENERAL_CHECKSUM_PREFIX.as_bytes()) {
            general_checksum = Some(String::from_utf8_lossy(trim_line_end(&line)).into_owned());
        }
        state.absorb_bytes(&line);
    }

    let computed = state.digest();
    let trailer = trim_line_end(&line);
    let outcome = if trailer.len() < DIGEST_LEN + 1 {
        VerifyOutcome::TrailerTooShort
    } else if &trailer[1..=DIGEST_LEN] == computed.as_bytes() {
        VerifyOutcome::Ok
    } else {
        VerifyOutcome::Mismatch
    };

    Ok(Verification {
        outcome,
        general_checksum,
        computed,
    })
}

/// Verify an in-memory document.
#[must_use]
pub fn verify_document(text: &str) -> VerifyOutcome {
    match verify_reader(text.as_bytes()) {
        Ok(verification) => verification.outcome,
        // Reading from a byte slice cannot fail.
        Err(_) => VerifyOutcome::TrailerNotFound,
    }
}

/// Verify a log file on disk.
///
/// # Errors
///
/// Returns [`Error::FileRead`] if the file cannot be opened or read.
pub fn verify_file(path: impl AsRef<Path>) -> Result<Verification> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::file_read(path, source))?;
    let verification =
        verify_reader(BufReader::new(file)).map_err(|source| Error::file_read(path, source))?;
    debug!(path = %path.display(), outcome = ?verification.outcome, "Verified log");
    Ok(verification)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}
