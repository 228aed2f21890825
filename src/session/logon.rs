//! The logon/registration state machine and nick-collision mutation
//! (§4.F, scenario 3).

use rand::Rng;

/// DISCONNECTED → TRANSPORT_UP → REGISTERING → REGISTERED → DISCONNECTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogonState {
    Disconnected,
    TransportUp,
    Registering,
    Registered,
}

/// Maximum nick length this crate's mutation strategy will grow a nick
/// to via `_`-appending before switching to digit rotation.
const MAX_MUTATED_LEN: usize = 9;

/// Produces the next nick to try after a 432/433/436 rejection.
///
/// Below 9 characters, appends one more `_`. At 9 characters, the last
/// character is turned into (or advanced as) a digit; once it wraps past
/// `'9'`, a random digit position (never the first character, so the
/// nick always keeps at least one stable leading character) is replaced
/// by a fresh random digit, so the sequence never gets stuck retrying
/// the same rejected nick forever.
pub fn mutate_nick(nick: &str) -> String {
    let len = nick.chars().count();
    if len < MAX_MUTATED_LEN {
        let mut out = nick.to_owned();
        out.push('_');
        return out;
    }

    let mut chars: Vec<char> = nick.chars().collect();
    let last = chars[len - 1];
    if !last.is_ascii_digit() {
        chars[len - 1] = '0';
    } else if last == '9' {
        let mut rng = rand::thread_rng();
        let pos = 1 + rng.gen_range(0..len - 1);
        let digit = rng.gen_range(0..10);
        chars[pos] = char::from_digit(digit, 10).expect("0..10 is a valid decimal digit");
    } else {
        let next = last.to_digit(10).expect("ascii digit") + 1;
        chars[len - 1] = char::from_digit(next, 10).expect("0..10 is a valid decimal digit");
    }
    chars.into_iter().collect()
}

/// The first four non-PING messages observed before reaching
/// `LogonState::Registered`, for callers that want to inspect the raw
/// registration conversation (scenario 5).
#[derive(Debug, Clone, Default)]
pub struct LogonConversation {
    lines: Vec<crate::proto::OwnedMessage>,
}

const CAPTURE_SLOTS: usize = 4;

impl LogonConversation {
    pub fn new() -> Self {
        LogonConversation { lines: Vec::with_capacity(CAPTURE_SLOTS) }
    }

    /// Records `msg` iff it isn't `PING` and the buffer isn't full yet.
    /// Call sites still handle `PING`/auto-PONG themselves; this is an
    /// observation-only capture.
    pub fn observe(&mut self, msg: &crate::proto::OwnedMessage) {
        if self.lines.len() >= CAPTURE_SLOTS || msg.command == "PING" {
            return;
        }
        self.lines.push(msg.clone());
    }

    pub fn messages(&self) -> &[crate::proto::OwnedMessage] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutate_nick_appends_underscore_until_nine_chars() {
        let mut nick = "bot".to_owned();
        for expected_len in 4..=9 {
            nick = mutate_nick(&nick);
            assert_eq!(nick.len(), expected_len);
        }
        assert_eq!(nick, "bot______");
    }

    #[test]
    fn mutate_nick_turns_last_char_into_a_digit_at_cap() {
        let mutated = mutate_nick("bot______"); // 9 chars, last is '_'
        assert_eq!(mutated.len(), 9);
        assert!(mutated.chars().last().unwrap().is_ascii_digit());
    }

    #[test]
    fn mutate_nick_advances_a_trailing_digit() {
        let mutated = mutate_nick("botbotbo5");
        assert_eq!(mutated, "botbotbo6");
    }

    #[test]
    fn mutate_nick_rotates_a_random_digit_once_trailing_digit_wraps() {
        let mutated = mutate_nick("botbotbo9");
        assert_eq!(mutated.len(), 9);
        assert_eq!(&mutated[..1], "b"); // leading char is never touched
        assert_ne!(mutated, "botbotbo9"); // some interior digit changed
    }

    #[test]
    fn logon_conversation_captures_first_four_non_ping_messages() {
        use crate::proto::tokenize;

        let mut convo = LogonConversation::new();
        let lines = [
            "PING :x",
            ":srv 001 nick :Welcome",
            ":srv 002 nick :Your host",
            ":srv 005 nick AWAYLEN=200 :are supported",
            ":srv 375 nick :MOTD start",
            ":srv 376 nick :MOTD end",
        ];
        for line in lines {
            let msg = tokenize(line).unwrap().to_owned_message();
            convo.observe(&msg);
        }

        assert_eq!(convo.messages().len(), 4);
        assert_eq!(convo.messages()[0].command, "001");
        assert_eq!(convo.messages()[3].command, "375");
    }
}
