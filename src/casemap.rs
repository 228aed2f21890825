//! Case-folding tables for the three RFC case mappings a server can
//! advertise via `CASEMAPPING=` in its 005, plus the case-insensitive
//! map key built on top of them.

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

/// The case-folding rule in effect for a session, negotiated from the
/// server's `CASEMAPPING` 005 token (falls back to `Rfc1459` if absent,
/// per RFC 2812).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaseMap {
    Ascii,
    #[default]
    Rfc1459,
    StrictRfc1459,
}

impl CaseMap {
    /// Parses the value of a `CASEMAPPING=` 005 token. Unknown values are
    /// not an error here; callers fall back to the default and log it
    /// (see `session::logon`).
    pub fn from_isupport_value(v: &str) -> Option<CaseMap> {
        match v {
            "ascii" => Some(CaseMap::Ascii),
            "rfc1459" => Some(CaseMap::Rfc1459),
            "strict-rfc1459" => Some(CaseMap::StrictRfc1459),
            _ => None,
        }
    }

    /// Folds a single byte per this case map's rule.
    #[inline]
    pub fn fold_byte(self, b: u8) -> u8 {
        if b.is_ascii_lowercase() {
            return b;
        }
        if !(b'A'..=b'Z').contains(&b) {
            return match (self, b) {
                (CaseMap::Rfc1459, b'[') => b'{',
                (CaseMap::Rfc1459, b']') => b'}',
                (CaseMap::Rfc1459, b'\\') => b'|',
                (CaseMap::Rfc1459, b'^') => b'~',
                (CaseMap::StrictRfc1459, b'[') => b'{',
                (CaseMap::StrictRfc1459, b']') => b'}',
                (CaseMap::StrictRfc1459, b'\\') => b'|',
                _ => b,
            };
        }
        b + (b'a' - b'A')
    }

    /// Folds every byte of `s` into a fresh, lowercased-per-this-map `String`.
    pub fn fold(self, s: &str) -> String {
        s.bytes().map(|b| self.fold_byte(b) as char).collect()
    }

    /// `true` iff `a` and `b` compare equal under this case map.
    pub fn eq(self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a.bytes()
                .zip(b.bytes())
                .all(|(x, y)| self.fold_byte(x) == self.fold_byte(y))
    }
}
