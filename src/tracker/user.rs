//! A single observed user, shared across every channel they're a member of.

use std::any::Any;
use std::fmt;

/// An IRC user as seen by the tracker.
///
/// `nchans` is the authoritative reference count backing deletion: when
/// it reaches zero the user is dropped from the user map (see
/// `Tracker::remove_membership`). There is no back-pointer to the
/// channels a user is in — the channel map is walked instead, which
/// avoids the owning-map cycle a pointer-based design would need.
pub struct User {
    /// Current nick, in the casing most recently observed on the wire.
    pub nick: String,
    pub ident: String,
    pub host: String,
    /// Real name (the `:fullname` trailing arg of `USER`, or a `WHOIS`/`WHO`
    /// reply field); empty until something populates it.
    pub realname: String,
    pub nchans: usize,
    /// Caller-attached opaque data; the Rust replacement for the
    /// source's "auto-free on disposal" tag bit, since ownership already
    /// frees it when the user entry is dropped.
    pub tag: Option<Box<dyn Any + Send + Sync>>,
}

impl User {
    pub fn new(nick: impl Into<String>) -> Self {
        User {
            nick: nick.into(),
            ident: String::new(),
            host: String::new(),
            realname: String::new(),
            nchans: 0,
            tag: None,
        }
    }

    pub fn with_hostmask(nick: impl Into<String>, ident: impl Into<String>, host: impl Into<String>) -> Self {
        User {
            nick: nick.into(),
            ident: ident.into(),
            host: host.into(),
            realname: String::new(),
            nchans: 0,
            tag: None,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("nick", &self.nick)
            .field("ident", &self.ident)
            .field("host", &self.host)
            .field("realname", &self.realname)
            .field("nchans", &self.nchans)
            .field("tag", &self.tag.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_with_zero_channels() {
        let u = User::new("nick");
        assert_eq!(u.nchans, 0);
        assert!(u.tag.is_none());
    }
}
