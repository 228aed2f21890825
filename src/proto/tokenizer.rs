//! In-place tokenization of one IRC line into prefix/command/params.
//!
//! `tokenize` never allocates: every field of the returned [`Message`]
//! borrows from the input line. Callers that need a message to outlive
//! the buffer it was framed from (the transport's read buffer is reused
//! on the next `read`) call [`Message::to_owned`] to get an
//! [`OwnedMessage`].

use smallvec::SmallVec;

use crate::error::{Error, ErrorKind, Result};

/// Upper bound on the number of parameters (middle + trailing) a message
/// can carry — 14 middle params plus one trailing, per RFC 1459/2812.
pub const MAX_PARAMS: usize = 15;

type ParamVec<'a> = SmallVec<[&'a str; MAX_PARAMS]>;

/// A tokenized IRC message, borrowing from the line it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    prefix: Option<&'a str>,
    command: &'a str,
    params: ParamVec<'a>,
    /// Whether the last parameter was introduced with an explicit `:`,
    /// as opposed to being the 15th, overflow parameter. Drives the
    /// transport's "colon trail" heuristic (see `conn`).
    colon_trail: bool,
}

impl<'a> Message<'a> {
    /// The message's source, e.g. `"nick!user@host"` or a server name.
    /// `None` for messages with no prefix (most client-to-server lines).
    pub fn prefix(&self) -> Option<&'a str> {
        self.prefix
    }

    /// The command name or three-digit numeric, always present.
    pub fn command(&self) -> &'a str {
        self.command
    }

    /// The ordered parameter list, middle params followed by the
    /// trailing param if present.
    pub fn params(&self) -> &[&'a str] {
        &self.params
    }

    /// Convenience accessor for a single parameter by index.
    pub fn arg(&self, i: usize) -> Option<&'a str> {
        self.params.get(i).copied()
    }

    /// Whether this message's last parameter was colon-introduced.
    pub fn colon_trail(&self) -> bool {
        self.colon_trail
    }

    /// Deep-copies this message so it can outlive the read buffer it
    /// borrowed from.
    pub fn to_owned_message(&self) -> OwnedMessage {
        OwnedMessage {
            prefix: self.prefix.map(str::to_owned),
            command: self.command.to_owned(),
            params: self.params.iter().map(|s| (*s).to_owned()).collect(),
            colon_trail: self.colon_trail,
        }
    }

    /// Re-serializes this message to the wire grammar (without the
    /// trailing `\r\n`), following the same trailing-colon convention
    /// used when parsing: the last parameter gets a `:` prefix iff it is
    /// empty, contains a space, or was itself colon-introduced.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if let Some(p) = self.prefix {
            out.push(':');
            out.push_str(p);
            out.push(' ');
        }
        out.push_str(self.command);
        for (i, p) in self.params.iter().enumerate() {
            out.push(' ');
            let is_last = i == self.params.len() - 1;
            if is_last && (p.is_empty() || p.contains(' ') || p.starts_with(':') || self.colon_trail) {
                out.push(':');
            }
            out.push_str(p);
        }
        out
    }
}

/// An owned copy of a [`Message`], for callers that need to retain a
/// message past the next `read()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub colon_trail: bool,
}

impl OwnedMessage {
    pub fn arg(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }
}

/// Tokenizes one already-delimiter-stripped IRC line.
///
/// `line` must not contain the terminating `\r`/`\n` (the caller strips
/// it while framing the message, see `conn::io`). An empty `line` is a
/// protocol error here — callers that want to silently skip blank lines
/// do that check before calling `tokenize`.
pub fn tokenize(line: &str) -> Result<Message<'_>> {
    if line.is_empty() {
        return Err(protocol_error());
    }
    if line.starts_with(' ') {
        return Err(protocol_error());
    }

    let (prefix, rest) = if let Some(stripped) = line.strip_prefix(':') {
        match stripped.find(' ') {
            Some(i) => (Some(&stripped[..i]), skip_spaces(&stripped[i + 1..])),
            None => return Err(protocol_error()), // prefix with no command
        }
    } else {
        (None, line)
    };

    let (command, mut rest) = split_token(rest);
    if command.is_empty() {
        return Err(protocol_error());
    }

    let mut params = ParamVec::new();
    let mut colon_trail = false;

    loop {
        rest = skip_spaces(rest);
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            colon_trail = true;
            break;
        }
        if params.len() == MAX_PARAMS - 1 {
            // Overflow: the remainder of the line becomes the final
            // param verbatim, mirroring how real daemons stop
            // splitting after the 15th parameter.
            params.push(rest);
            colon_trail = false;
            break;
        }
        let (tok, next) = split_token(rest);
        params.push(tok);
        rest = next;
    }

    Ok(Message {
        prefix,
        command,
        params,
        colon_trail,
    })
}

fn protocol_error() -> Error {
    Error::simple(ErrorKind::Protocol)
}

/// Splits off the next whitespace-delimited token, returning `(token, rest)`.
fn split_token(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    }
}

fn skip_spaces(s: &str) -> &str {
    s.trim_start_matches(' ')
}
