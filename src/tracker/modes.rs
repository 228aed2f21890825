//! Parsing of channel `MODE` strings against a server's 005-derived
//! mode classes and prefix alphabet (scenario 6 of the testable
//! properties).

use crate::isupport::{IsupportState, ModeClass};

/// One `+X`/`-X` change out of a parsed `MODE` line, with its argument
/// already resolved (or `None` if the letter takes none).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub adding: bool,
    pub letter: char,
    pub arg: Option<String>,
}

/// Parses a `MODE` command's mode string (`"+o-v+b"`) against its
/// positional arguments, using `isupport` to decide which letters
/// consume an argument and under what sign.
///
/// Letters the session doesn't recognize (absent from both `CHANMODES`
/// and the `PREFIX` alphabet) are logged and skipped; they never
/// consume an argument, since there is no way to know whether they
/// would have.
pub fn parse_mode_changes(modestr: &str, args: &[&str], isupport: &IsupportState) -> Vec<ModeChange> {
    let mut changes = Vec::new();
    let mut adding = true;
    let mut args = args.iter();

    for c in modestr.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            letter => {
                let takes_arg = if isupport.prefix.iter().any(|p| p.mode == letter) {
                    true
                } else {
                    match isupport.mode_class(letter) {
                        Some(ModeClass::A) | Some(ModeClass::B) => true,
                        Some(ModeClass::C) => adding,
                        Some(ModeClass::D) => false,
                        None => {
                            log::warn!("unknown channel mode letter: {letter}");
                            continue;
                        }
                    }
                };
                let arg = if takes_arg {
                    args.next().map(|s| (*s).to_owned())
                } else {
                    None
                };
                changes.push(ModeChange { adding, letter, arg });
            }
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_sign_mode_string_scenario() {
        let mut isupport = IsupportState::default();
        isupport.apply_tokens(["PREFIX=(ov)@+", "CHANMODES=b,k,l,imnpst"]);

        let changes = parse_mode_changes(
            "+o-v+b",
            &["nick1", "nick2", "*!*@ev.il"],
            &isupport,
        );

        assert_eq!(
            changes,
            vec![
                ModeChange { adding: true, letter: 'o', arg: Some("nick1".into()) },
                ModeChange { adding: false, letter: 'v', arg: Some("nick2".into()) },
                ModeChange { adding: true, letter: 'b', arg: Some("*!*@ev.il".into()) },
            ]
        );
    }

    #[test]
    fn class_c_mode_only_consumes_argument_when_setting() {
        let mut isupport = IsupportState::default();
        isupport.apply_tokens(["CHANMODES=b,k,l,imnpst"]);

        let set = parse_mode_changes("+l", &["50"], &isupport);
        assert_eq!(set[0].arg, Some("50".to_owned()));

        let unset = parse_mode_changes("-l", &[], &isupport);
        assert_eq!(unset[0].arg, None);
    }

    #[test]
    fn class_d_mode_never_consumes_an_argument() {
        let isupport = IsupportState::default();
        let changes = parse_mode_changes("+nt", &[], &isupport);
        assert_eq!(changes[0].arg, None);
        assert_eq!(changes[1].arg, None);
    }

    #[test]
    fn unknown_letter_is_skipped_without_consuming_an_argument() {
        let isupport = IsupportState::default();
        let changes = parse_mode_changes("+z+n", &["unexpected"], &isupport);
        // 'z' is unknown and skipped; 'n' is class D and takes no argument,
        // so the stray arg is never consumed by anything.
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].letter, 'n');
    }
}
