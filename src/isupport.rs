//! Parsing of `RPL_ISUPPORT` (005) tokens.
//!
//! A 005 line carries a bag of `KEY` or `KEY=VALUE` tokens; this module
//! turns the ones this crate cares about (`CASEMAPPING`, `CHANMODES`,
//! `PREFIX`, `NETWORK`) into typed fields on [`IsupportState`], and
//! leaves everything else alone. `session::Session` owns one of these
//! and feeds it every 005 line it sees during and after registration.

use crate::casemap::CaseMap;

/// The four RFC 2812/"draft" mode classes a `CHANMODES=` token divides
/// channel modes into:
///
/// - `A`: always takes a parameter (ban lists and similar; add/remove both take one)
/// - `B`: always takes a parameter
/// - `C`: takes a parameter only when being set
/// - `D`: never takes a parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChanModeClasses {
    pub a: Vec<char>,
    pub b: Vec<char>,
    pub c: Vec<char>,
    pub d: Vec<char>,
}

impl ChanModeClasses {
    /// Which class `mode` belongs to, if any.
    pub fn class_of(&self, mode: char) -> Option<ModeClass> {
        if self.a.contains(&mode) {
            Some(ModeClass::A)
        } else if self.b.contains(&mode) {
            Some(ModeClass::B)
        } else if self.c.contains(&mode) {
            Some(ModeClass::C)
        } else if self.d.contains(&mode) {
            Some(ModeClass::D)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    A,
    B,
    C,
    D,
}

/// A single `PREFIX=(modes)symbols` entry, e.g. `o` paired with `@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixEntry {
    pub mode: char,
    pub symbol: char,
}

/// The subset of 005 state this crate tracks and exposes.
///
/// Starts at RFC defaults and is refined token-by-token as 005 lines
/// arrive; a server that never sends a given token leaves the default in
/// place rather than erroring, per the spec's "degrade gracefully"
/// stance on ISUPPORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsupportState {
    pub casemapping: CaseMap,
    pub chanmodes: ChanModeClasses,
    pub prefix: Vec<PrefixEntry>,
    pub network: Option<String>,
    pub chantypes: Vec<char>,
}

impl Default for IsupportState {
    fn default() -> Self {
        IsupportState {
            casemapping: CaseMap::default(),
            // RFC 2812 has no CHANMODES default; these four are the
            // modes every server in practice supports even pre-005.
            chanmodes: ChanModeClasses {
                a: vec!['b'],
                b: vec!['k'],
                c: vec!['l'],
                d: vec!['i', 'm', 'n', 'p', 's', 't'],
            },
            prefix: vec![
                PrefixEntry { mode: 'o', symbol: '@' },
                PrefixEntry { mode: 'v', symbol: '+' },
            ],
            network: None,
            chantypes: vec!['#', '&'],
        }
    }
}

impl IsupportState {
    /// Applies every `KEY` / `KEY=VALUE` token in one 005 line's
    /// parameter list (excluding the leading nick and trailing
    /// "are supported by this server" text).
    pub fn apply_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for tok in tokens {
            self.apply_token(tok);
        }
    }

    fn apply_token(&mut self, tok: &str) {
        let (key, value) = match tok.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (tok, None),
        };

        // A leading `-` negates a previously-advertised token (seen on
        // servers that change config and re-send 005); we only track
        // positive state, so such tokens are logged and otherwise
        // ignored rather than attempting to "unapply" anything.
        if let Some(stripped) = key.strip_prefix('-') {
            log::debug!("ignoring negated 005 token -{stripped}");
            return;
        }

        match (key, value) {
            ("CASEMAPPING", Some(v)) => match CaseMap::from_isupport_value(v) {
                Some(cm) => self.casemapping = cm,
                None => log::warn!("unknown CASEMAPPING value: {v}"),
            },
            ("CHANMODES", Some(v)) => match parse_chanmodes(v) {
                Some(cm) => self.chanmodes = cm,
                None => log::warn!("malformed CHANMODES value: {v}"),
            },
            ("PREFIX", Some(v)) => match parse_prefix(v) {
                Some(p) => self.prefix = p,
                None => log::warn!("malformed PREFIX value: {v}"),
            },
            ("NETWORK", Some(v)) => self.network = Some(v.to_owned()),
            ("CHANTYPES", Some(v)) => self.chantypes = v.chars().collect(),
            (_, _) => log::debug!("unhandled 005 token: {tok}"),
        }
    }

    pub fn mode_class(&self, mode: char) -> Option<ModeClass> {
        self.chanmodes.class_of(mode)
    }

    /// The mode character paired with a `PREFIX` symbol, e.g. `@` → `o`.
    pub fn mode_for_symbol(&self, symbol: char) -> Option<char> {
        self.prefix.iter().find(|p| p.symbol == symbol).map(|p| p.mode)
    }

    pub fn symbol_for_mode(&self, mode: char) -> Option<char> {
        self.prefix.iter().find(|p| p.mode == mode).map(|p| p.symbol)
    }
}

/// Parses `"abc,def,ghi,jkl"` into the four ordered classes.
fn parse_chanmodes(v: &str) -> Option<ChanModeClasses> {
    let mut groups = v.split(',');
    let a = groups.next()?.chars().collect();
    let b = groups.next()?.chars().collect();
    let c = groups.next()?.chars().collect();
    let d = groups.next()?.chars().collect();
    Some(ChanModeClasses { a, b, c, d })
}

/// Parses `"(ov)@+"` into `[{o,@}, {v,+}]`.
fn parse_prefix(v: &str) -> Option<Vec<PrefixEntry>> {
    let rest = v.strip_prefix('(')?;
    let (modes, symbols) = rest.split_once(')')?;
    if modes.chars().count() != symbols.chars().count() {
        return None;
    }
    Some(
        modes
            .chars()
            .zip(symbols.chars())
            .map(|(mode, symbol)| PrefixEntry { mode, symbol })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_casemapping_token() {
        let mut st = IsupportState::default();
        st.apply_tokens(["CASEMAPPING=ascii"]);
        assert_eq!(st.casemapping, CaseMap::Ascii);
    }

    #[test]
    fn parses_chanmodes_token() {
        let mut st = IsupportState::default();
        st.apply_tokens(["CHANMODES=eIb,k,l,imnpst"]);
        assert_eq!(st.chanmodes.a, vec!['e', 'I', 'b']);
        assert_eq!(st.chanmodes.b, vec!['k']);
        assert_eq!(st.chanmodes.c, vec!['l']);
        assert_eq!(st.mode_class('e'), Some(ModeClass::A));
        assert_eq!(st.mode_class('k'), Some(ModeClass::B));
    }

    #[test]
    fn parses_prefix_token() {
        let mut st = IsupportState::default();
        st.apply_tokens(["PREFIX=(ov)@+"]);
        assert_eq!(st.symbol_for_mode('o'), Some('@'));
        assert_eq!(st.mode_for_symbol('+'), Some('v'));
    }

    #[test]
    fn unknown_tokens_are_ignored_not_errors() {
        let mut st = IsupportState::default();
        st.apply_tokens(["SOMETHING_WE_DONT_KNOW=1", "AWAYLEN=200"]);
        assert_eq!(st, IsupportState::default());
    }

    #[test]
    fn network_token_is_captured() {
        let mut st = IsupportState::default();
        st.apply_tokens(["NETWORK=Libera.Chat"]);
        assert_eq!(st.network.as_deref(), Some("Libera.Chat"));
    }

    #[test]
    fn malformed_prefix_token_is_ignored_and_logged() {
        let mut st = IsupportState::default();
        let before = st.clone();
        st.apply_tokens(["PREFIX=(ovo)@+"]); // mismatched lengths
        assert_eq!(st, before);
    }

    #[test]
    fn negated_token_is_ignored() {
        let mut st = IsupportState::default();
        let before = st.clone();
        st.apply_tokens(["-KNOCK"]);
        assert_eq!(st, before);
    }
}
