//! Line filters applied before text is fingerprinted.
//!
//! Aircraft configuration files mix performance data with cosmetic settings
//! (sounds, liveries, panel layout). [`PerformanceFilter`] admits only the
//! lines inside sections that change how the aircraft flies, so cosmetic
//! edits never alter the fingerprint.

use tracing::trace;

/// Decides, line by line, which lines of a text file are fingerprinted.
pub trait LineFilter {
    /// Return `true` if `line` should be absorbed into the checksum.
    fn admit(&mut self, line: &[u8]) -> bool;
}

/// Admits every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl LineFilter for PassThrough {
    fn admit(&mut self, _line: &[u8]) -> bool {
        true
    }
}

/// A section header prefix and how many of its leading characters must match.
///
/// The count includes the opening bracket, so `[flaps.` with a length of 4
/// matches any header that begins with `[fla`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRule {
    /// The header text the rule is written against.
    pub pattern: &'static str,
    /// Number of leading characters compared.
    pub match_len: usize,
}

impl SectionRule {
    const fn new(pattern: &'static str, match_len: usize) -> Self {
        Self { pattern, match_len }
    }

    /// Check whether a header (starting at its `[`) satisfies this rule.
    #[must_use]
    pub fn matches(&self, header: &[u8]) -> bool {
        let wanted = &self.pattern.as_bytes()[..self.match_len.min(self.pattern.len())];
        header.starts_with(wanted)
    }
}

/// Sections of `aircraft.cfg` that affect flight performance.
pub const PERFORMANCE_SECTIONS: [SectionRule; 11] = [
    SectionRule::new("[airplane_geometry]", 5),
    SectionRule::new("[flaps.", 4),
    SectionRule::new("[flight_tuning]", 4),
    SectionRule::new("[water_ballast_system]", 3),
    SectionRule::new("[weight_and_balance]", 3),
    SectionRule::new("[generalenginedata]", 11),
    SectionRule::new("[jet_engine]", 4),
    SectionRule::new("[piston_engine]", 4),
    SectionRule::new("[propeller]", 4),
    SectionRule::new("[turbineenginedata]", 6),
    SectionRule::new("[turboprop_engine]", 6),
];

/// Only spaces may precede a header bracket, and only this many columns deep.
const HEADER_SCAN_LIMIT: usize = 10;

/// Locate the `[` of a section header line.
///
/// Returns `None` unless the first non-space character within the first ten
/// columns is `[`.
#[must_use]
pub fn header_start(line: &[u8]) -> Option<usize> {
    for (i, &byte) in line.iter().take(HEADER_SCAN_LIMIT).enumerate() {
        match byte {
            b'[' => return Some(i),
            b' ' => {}
            _ => return None,
        }
    }
    None
}

/// Section-aware filter isolating performance-relevant configuration.
#[derive(Debug, Clone)]
pub struct PerformanceFilter {
    rules: &'static [SectionRule],
    inside_relevant_section: bool,
}

impl Default for PerformanceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceFilter {
    /// Create a filter using [`PERFORMANCE_SECTIONS`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(&PERFORMANCE_SECTIONS)
    }

    /// Create a filter with a custom rule list.
    #[must_use]
    pub fn with_rules(rules: &'static [SectionRule]) -> Self {
        Self {
            rules,
            inside_relevant_section: false,
        }
    }

    /// Whether the most recent header opened a relevant section.
    #[must_use]
    pub fn inside_relevant_section(&self) -> bool {
        self.inside_relevant_section
    }

    fn is_relevant_header(&self, header: &[u8]) -> bool {
        self.rules.iter().any(|rule| rule.matches(header))
    }
}

impl LineFilter for PerformanceFilter {
    fn admit(&mut self, line: &[u8]) -> bool {
        match header_start(line) {
            Some(pos) => {
                self.inside_relevant_section = self.is_relevant_header(&line[pos..]);
                trace!(
                    header = %String::from_utf8_lossy(line).trim_end(),
                    relevant = self.inside_relevant_section,
                    "Section header"
                );
                false
            }
            None => self.inside_relevant_section,
        }
    }
}
