//! Rolling substitution checksum.
//!
//! Every digest in a flight log, both the companion file fingerprints and the
//! trailing `G` record, comes from this engine. The alphabet, permutation
//! table and index modulus are fixed: logs written by older loggers must keep
//! verifying, so none of these constants may change.
//!
//! Characters outside [`ALPHABET`] are skipped without touching the state.
//! Line endings, spaces and punctuation therefore never affect a digest.
//!
//! # Example
//!
//! ```
//! use simlogger::checksum::{checksum, ChecksumState};
//!
//! let mut state = ChecksumState::new();
//! state.absorb_str("AB");
//! assert_eq!(state.digest().as_str(), "KBOK06");
//!
//! // Unrecognized characters are ignored.
//! assert_eq!(checksum("A - B\r\n"), checksum("AB"));
//! ```

use std::fmt;

/// Characters that contribute to a checksum, in table order.
pub const ALPHABET: &[u8; 63] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ.abcdefghijklmnopqrstuvwxyz";

/// Permutation of `0..63` driving the substitution.
pub const PERMUTATION: [u8; 63] = [
    14, 46, 51, 8, 26, 2, 32, 39, 29, //
    37, 4, 44, 20, 61, 22, 58, 16, 25, //
    60, 13, 31, 53, 11, 50, 6, 38, 41, //
    23, 56, 17, 1, 19, 45, 10, 28, 15, //
    36, 9, 57, 12, 49, 33, 3, 24, 30, //
    62, 47, 5, 43, 0, 27, 52, 34, 55, //
    21, 54, 59, 18, 48, 35, 40, 7, 42,
];

/// The position counter wraps at this value.
pub const INDEX_MODULUS: u16 = 1987;

/// Number of characters in a rendered digest.
pub const DIGEST_LEN: usize = 6;

/// Digest characters are drawn from the first 36 alphabet entries.
const RENDER_RADIX: u8 = 36;

const ALPHABET_LEN: usize = ALPHABET.len();

/// Position of `byte` in [`ALPHABET`], if it is a recognized character.
#[must_use]
pub fn alphabet_position(byte: u8) -> Option<usize> {
    match byte {
        b'0'..=b'9' => Some(usize::from(byte - b'0')),
        b'A'..=b'Z' => Some(usize::from(byte - b'A') + 10),
        b'.' => Some(36),
        b'a'..=b'z' => Some(usize::from(byte - b'a') + 37),
        _ => None,
    }
}

/// Mutable accumulator for one checksum computation.
///
/// A fresh state starts with `index = 1` and `digest[i] = i`. States are never
/// shared between independent computations; create one per digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumState {
    index: u16,
    slots: [u8; DIGEST_LEN],
}

impl Default for ChecksumState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumState {
    /// Create a freshly reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: 1,
            slots: [0, 1, 2, 3, 4, 5],
        }
    }

    /// Feed a single byte. Bytes outside the alphabet leave the state untouched.
    pub fn absorb(&mut self, byte: u8) {
        let Some(position) = alphabet_position(byte) else {
            return;
        };

        let mapped = usize::from(PERMUTATION[(position + usize::from(self.index)) % ALPHABET_LEN]);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = PERMUTATION[(usize::from(*slot) + mapped + i) % ALPHABET_LEN];
        }
        self.index = (self.index + 1) % INDEX_MODULUS;
    }

    /// Feed a single character. Non-ASCII characters are never recognized.
    pub fn absorb_char(&mut self, ch: char) {
        if let Ok(byte) = u8::try_from(ch) {
            self.absorb(byte);
        }
    }

    /// Feed every character of `text` in order.
    pub fn absorb_str(&mut self, text: &str) {
        self.absorb_bytes(text.as_bytes());
    }

    /// Feed raw bytes in order.
    pub fn absorb_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.absorb(byte);
        }
    }

    /// Number of recognized characters absorbed, modulo [`INDEX_MODULUS`], plus one.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Render the current state as a fixed-width digest.
    #[must_use]
    pub fn digest(&self) -> Digest {
        let mut chars = [0u8; DIGEST_LEN];
        for (out, slot) in chars.iter_mut().zip(self.slots) {
            *out = ALPHABET[usize::from(slot % RENDER_RADIX)];
        }
        Digest(chars)
    }
}

/// Compute the digest of a string in one call.
#[must_use]
pub fn checksum(text: &str) -> Digest {
    let mut state = ChecksumState::new();
    state.absorb_str(text);
    state.digest()
}

/// A rendered checksum: six characters from `0-9A-Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Digest recorded for a file that could not be read.
    pub const UNAVAILABLE: Self = Self(*b"000000");

    /// View the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Every byte comes from ALPHABET, which is ASCII.
        std::str::from_utf8(&self.0).unwrap_or("000000")
    }

    /// The raw digest characters.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_vectors() {
        let vectors = [
            ("", "012345"),
            ("AB", "KBOK06"),
            ("ab", "QBC8XP"),
            ("G", "2NHJAF"),
            ("Hello World", "DTFKT0"),
            ("HFFXA035\n", "65MLG9"),
            ("pitch=1.0\nlift=2\n", "2I9QQG"),
        ];
        for (input, expected) in vectors {
            assert_eq!(checksum(input).as_str(), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_fresh_state() {
        let state = ChecksumState::new();
        assert_eq!(state.index(), 1);
        assert_eq!(state.digest().as_str(), "012345");
    }

    #[test]
    fn test_alphabet_positions_match_table() {
        for (i, &byte) in ALPHABET.iter().enumerate() {
            assert_eq!(alphabet_position(byte), Some(i));
        }
        assert_eq!(alphabet_position(b' '), None);
        assert_eq!(alphabet_position(b'\n'), None);
        assert_eq!(alphabet_position(b'-'), None);
        assert_eq!(alphabet_position(0xB0), None);
    }

    #[test]
    fn test_permutation_is_a_permutation() {
        let mut seen = [false; 63];
        for &value in &PERMUTATION {
            assert!(!seen[usize::from(value)], "duplicate {value}");
            seen[usize::from(value)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_deterministic() {
        let text = "B1200004730000N00830000EA0050000500027000";
        let first = checksum(text);
        for _ in 0..5 {
            assert_eq!(checksum(text), first);
        }
    }

    #[test]
    fn test_unrecognized_characters_ignored() {
        let base = checksum("HFGIDGLIDERID.D1234");
        assert_eq!(checksum("HF GID-GLIDER:ID.D_1234\r\n"), base);
        assert_eq!(checksum("\u{b0}HFGIDGLIDERID.D1234\u{e9}"), base);

        let mut state = ChecksumState::new();
        state.absorb_str(" -_:;!\t\r\n");
        assert_eq!(state, ChecksumState::new());
    }

    #[test]
    fn test_absorb_char_matches_bytes() {
        let mut by_char = ChecksumState::new();
        for ch in "Zulu 1200".chars() {
            by_char.absorb_char(ch);
        }
        let mut by_bytes = ChecksumState::new();
        by_bytes.absorb_bytes(b"Zulu 1200");
        assert_eq!(by_char, by_bytes);

        let before = by_char.clone();
        by_char.absorb_char('\u{2603}');
        assert_eq!(by_char, before);
    }

    #[test]
    fn test_single_substitution_changes_digest() {
        let original = "L SIM FLT checksum 4X2PQZ (Flights/Task1.FLT)";
        let base = checksum(original);
        let bytes = original.as_bytes();

        for (i, &byte) in bytes.iter().enumerate() {
            if alphabet_position(byte).is_none() {
                continue;
            }
            for &replacement in ALPHABET {
                if replacement == byte {
                    continue;
                }
                let mut changed = bytes.to_vec();
                changed[i] = replacement;
                let changed = String::from_utf8(changed).unwrap();
                assert_ne!(checksum(&changed), base, "substitution at {i} with {}", replacement as char);
            }
        }
    }

    #[test]
    fn test_insertion_and_removal_change_digest() {
        let base = checksum("HFDTE150624");
        assert_ne!(checksum("HFDTE1506240"), base);
        assert_ne!(checksum("HFDTE15062"), base);
        assert_ne!(checksum("HFDTE150642"), base);
    }

    #[test]
    fn test_index_wraps_at_modulus() {
        let mut state = ChecksumState::new();
        for _ in 0..(INDEX_MODULUS - 1) {
            state.absorb(b'A');
        }
        assert_eq!(state.index(), 0);
        state.absorb(b'A');
        assert_eq!(state.index(), 1);
    }

    #[test]
    fn test_digest_display() {
        let digest = checksum("AB");
        assert_eq!(digest.to_string(), "KBOK06");
        assert_eq!(digest.as_bytes(), b"KBOK06");
        assert_eq!(Digest::UNAVAILABLE.to_string(), "000000");
    }
}
