//! The line grammar: a borrowed, zero-allocation tokenizer for one IRC
//! message, plus the small amount of string-splitting (prefix into
//! nick/user/host) callers need once a message has been tokenized.

mod tokenizer;

pub use tokenizer::{tokenize, Message, OwnedMessage, MAX_PARAMS};

/// Splits a message prefix of the form `nick!user@host` into its three
/// parts. Any part that wasn't present in the input is the empty string,
/// matching the source's convention (scenario 2 of the spec):
///
/// - `"nick!u@h.example"` → `("nick", "u", "h.example")`
/// - `"nick@h"` → `("nick", "", "h")`
/// - `"nick"` → `("nick", "", "")`
pub fn split_prefix(prefix: &str) -> (&str, &str, &str) {
    let (nick_and_user, host) = match prefix.find('@') {
        Some(i) => (&prefix[..i], &prefix[i + 1..]),
        None => (prefix, ""),
    };
    match nick_and_user.find('!') {
        Some(i) => (&nick_and_user[..i], &nick_and_user[i + 1..], host),
        None => (nick_and_user, "", host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_full_prefix() {
        assert_eq!(split_prefix("nick!u@h.example"), ("nick", "u", "h.example"));
    }

    #[test]
    fn splits_prefix_without_ident() {
        assert_eq!(split_prefix("nick@h"), ("nick", "", "h"));
    }

    #[test]
    fn splits_bare_nick() {
        assert_eq!(split_prefix("nick"), ("nick", "", ""));
    }

    #[test]
    fn splits_server_name_prefix() {
        assert_eq!(split_prefix("irc.example.org"), ("irc.example.org", "", ""));
    }
}
