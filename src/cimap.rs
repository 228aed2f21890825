//! A case-insensitive, string-keyed map.
//!
//! The spec describes a bucketed hash table with linked-list buckets and
//! "removal returns the original key" semantics. The idiomatic Rust
//! rendering of that is a newtype key with a `Hash`/`Eq` impl that folds
//! under the active `CaseMap`, used as the key of a plain
//! `std::collections::HashMap` — bucketing, safe deletion during
//! iteration (`retain`), and original-key-on-removal (`remove_entry`)
//! all come for free from the standard library. This plays the same role
//! the teacher crate's own `bft::collections` module does: a thin,
//! domain-specific wrapper over a std collection, not a hand-rolled one.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::casemap::CaseMap;

/// A map key that compares and hashes under a `CaseMap` fold, while
/// retaining the original casing for iteration/display.
#[derive(Debug, Clone)]
pub struct CiKey {
    original: String,
    casemap: CaseMap,
}

impl CiKey {
    pub fn new(original: impl Into<String>, casemap: CaseMap) -> Self {
        CiKey {
            original: original.into(),
            casemap,
        }
    }

    /// The casing as originally observed (e.g. on the wire).
    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn into_string(self) -> String {
        self.original
    }
}

impl PartialEq for CiKey {
    fn eq(&self, other: &Self) -> bool {
        self.casemap.eq(&self.original, &other.original)
    }
}

impl Eq for CiKey {}

impl Hash for CiKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.original.bytes() {
            self.casemap.fold_byte(b).hash(state);
        }
    }
}

/// A case-insensitive map from name to `V`, folded under `CaseMap`.
pub type CiMap<V> = HashMap<CiKey, V>;

/// Convenience lookups over `CiMap` that build the probe key for the
/// caller, so call sites don't spell out `CiKey::new` everywhere.
pub trait CiMapExt<V> {
    fn get_folded(&self, key: &str, casemap: CaseMap) -> Option<&V>;
    fn get_folded_mut(&mut self, key: &str, casemap: CaseMap) -> Option<&mut V>;
    fn remove_folded(&mut self, key: &str, casemap: CaseMap) -> Option<(String, V)>;
    fn contains_folded(&self, key: &str, casemap: CaseMap) -> bool;
}

impl<V> CiMapExt<V> for CiMap<V> {
    fn get_folded(&self, key: &str, casemap: CaseMap) -> Option<&V> {
        self.get(&CiKey::new(key, casemap))
    }

    fn get_folded_mut(&mut self, key: &str, casemap: CaseMap) -> Option<&mut V> {
        self.get_mut(&CiKey::new(key, casemap))
    }

    fn remove_folded(&mut self, key: &str, casemap: CaseMap) -> Option<(String, V)> {
        self.remove_entry(&CiKey::new(key, casemap))
            .map(|(k, v)| (k.into_string(), v))
    }

    fn contains_folded(&self, key: &str, casemap: CaseMap) -> bool {
        self.contains_key(&CiKey::new(key, casemap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_under_rfc1459() {
        let mut m: CiMap<u32> = CiMap::new();
        m.insert(CiKey::new("Nick^One", CaseMap::Rfc1459), 1);
        assert_eq!(m.get_folded("nick~one", CaseMap::Rfc1459), Some(&1));
    }

    #[test]
    fn original_casing_survives_in_the_key() {
        let mut m: CiMap<u32> = CiMap::new();
        m.insert(CiKey::new("NickName", CaseMap::Ascii), 1);
        let (orig, _) = m.remove_folded("nickname", CaseMap::Ascii).unwrap();
        assert_eq!(orig, "NickName");
    }

    #[test]
    fn removal_of_absent_key_is_none() {
        let mut m: CiMap<u32> = CiMap::new();
        assert!(m.remove_folded("ghost", CaseMap::Ascii).is_none());
    }

    #[test]
    fn retain_allows_safe_deletion_during_iteration() {
        let mut m: CiMap<u32> = CiMap::new();
        m.insert(CiKey::new("a", CaseMap::Ascii), 1);
        m.insert(CiKey::new("b", CaseMap::Ascii), 2);
        m.retain(|_, v| *v != 1);
        assert_eq!(m.len(), 1);
        assert!(m.contains_folded("b", CaseMap::Ascii));
    }
}
