//! The in-memory channel/user model (component G): ingests JOIN, PART,
//! KICK, QUIT, NICK, MODE, TOPIC, and NAMES events and keeps a
//! consistent view keyed by folded name under the session's active
//! `CaseMap`.
//!
//! Channels and users live in two owning maps; a member references its
//! user only by folded-nick key, not by pointer, so there is no
//! channel → member → user → channel cycle to break — `user.nchans` is
//! the authoritative count backing deletion (see `remove_membership`).

mod channel;
mod modes;
mod user;

pub use channel::{Channel, Member};
pub use modes::{parse_mode_changes, ModeChange};
pub use user::User;

use crate::casemap::CaseMap;
use crate::cimap::{CiKey, CiMap, CiMapExt};
use crate::isupport::{IsupportState, ModeClass};

/// The authoritative in-memory model of joined channels and observed
/// users for one session.
#[derive(Debug)]
pub struct Tracker {
    casemap: CaseMap,
    channels: CiMap<Channel>,
    users: CiMap<User>,
}

impl Tracker {
    pub fn new(casemap: CaseMap) -> Self {
        Tracker {
            casemap,
            channels: CiMap::new(),
            users: CiMap::new(),
        }
    }

    /// Updates the fold used for every subsequent lookup. Existing keys
    /// are left as-is; a mid-session `CASEMAPPING` change is rare enough
    /// (and already a server-side oddity) that this crate does not
    /// attempt to re-key live entries.
    pub fn set_casemap(&mut self, casemap: CaseMap) {
        self.casemap = casemap;
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get_folded(name, self.casemap)
    }

    pub fn user(&self, nick: &str) -> Option<&User> {
        self.users.get_folded(nick, self.casemap)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// A JOIN of any nick (including our own — the caller does not need
    /// to special-case itself; joining creates the channel on first use).
    pub fn handle_join(&mut self, nick: &str, ident: &str, host: &str, channel: &str) {
        let casemap = self.casemap;

        let chan = self
            .channels
            .entry(CiKey::new(channel, casemap))
            .or_insert_with(|| Channel::new(channel));
        if chan.members.contains_folded(nick, casemap) {
            return;
        }
        chan.members.insert(CiKey::new(nick, casemap), Member::default());

        let user = self
            .users
            .entry(CiKey::new(nick, casemap))
            .or_insert_with(|| User::new(nick));
        user.nick = nick.to_owned();
        if !ident.is_empty() {
            user.ident = ident.to_owned();
        }
        if !host.is_empty() {
            user.host = host.to_owned();
        }
        user.nchans += 1;
    }

    pub fn handle_part(&mut self, nick: &str, channel: &str) {
        self.remove_membership(nick, channel);
    }

    pub fn handle_kick(&mut self, channel: &str, target_nick: &str) {
        self.remove_membership(target_nick, channel);
    }

    /// Removes `nick` from every channel it is a member of and from the
    /// user map.
    pub fn handle_quit(&mut self, nick: &str) {
        let casemap = self.casemap;
        for chan in self.channels.values_mut() {
            chan.members.remove_folded(nick, casemap);
        }
        self.users.remove_folded(nick, casemap);
    }

    pub fn handle_nick(&mut self, old_nick: &str, new_nick: &str) {
        let casemap = self.casemap;

        if let Some((_, mut user)) = self.users.remove_folded(old_nick, casemap) {
            user.nick = new_nick.to_owned();
            self.users.insert(CiKey::new(new_nick, casemap), user);
        }
        for chan in self.channels.values_mut() {
            if let Some((_, member)) = chan.members.remove_folded(old_nick, casemap) {
                chan.members.insert(CiKey::new(new_nick, casemap), member);
            }
        }
    }

    pub fn handle_mode(&mut self, channel: &str, modestr: &str, args: &[&str], isupport: &IsupportState) {
        let casemap = self.casemap;
        let changes = parse_mode_changes(modestr, args, isupport);
        let order: Vec<char> = isupport.prefix.iter().map(|p| p.symbol).collect();

        let Some(chan) = self.channels.get_folded_mut(channel, casemap) else {
            return;
        };

        for change in changes {
            if let Some(symbol) = isupport.symbol_for_mode(change.letter) {
                if let Some(target_nick) = change.arg.as_deref() {
                    if let Some(member) = chan.members.get_folded_mut(target_nick, casemap) {
                        if change.adding {
                            member.add_prefix(symbol, &order);
                        } else {
                            member.remove_prefix(symbol);
                        }
                    }
                }
                continue;
            }

            match isupport.mode_class(change.letter) {
                Some(ModeClass::A) => {
                    let list = chan.lists.entry(change.letter).or_default();
                    if let Some(arg) = change.arg {
                        if change.adding {
                            if !list.contains(&arg) {
                                list.push(arg);
                            }
                        } else {
                            list.retain(|x| x != &arg);
                        }
                    }
                }
                _ => {
                    if change.adding {
                        chan.modes.insert(change.letter, change.arg);
                    } else {
                        chan.modes.remove(&change.letter);
                    }
                }
            }
        }
    }

    /// Updates a channel's topic fields. Each of `topic`/`setter`/`set_at`
    /// is independently optional so `RPL_TOPIC` (332, topic text only)
    /// and `RPL_TOPICWHOTIME` (333, setter + timestamp only) can each
    /// update their own slice without clobbering the other's.
    pub fn handle_topic(&mut self, channel: &str, topic: Option<&str>, setter: Option<&str>, set_at: Option<u64>) {
        let casemap = self.casemap;
        if let Some(chan) = self.channels.get_folded_mut(channel, casemap) {
            if let Some(t) = topic {
                chan.topic = t.to_owned();
            }
            if let Some(s) = setter {
                chan.topic_setter = s.to_owned();
            }
            if let Some(t) = set_at {
                chan.topic_set_at = t;
            }
        }
    }

    pub fn handle_created_at(&mut self, channel: &str, created_at: u64) {
        let casemap = self.casemap;
        if let Some(chan) = self.channels.get_folded_mut(channel, casemap) {
            chan.created_at = created_at;
        }
    }

    /// One `RPL_NAMREPLY` (353) line's worth of prefixed nicks.
    pub fn handle_names(&mut self, channel: &str, names: &[&str], isupport: &IsupportState) {
        let casemap = self.casemap;
        let symbols: Vec<char> = isupport.prefix.iter().map(|p| p.symbol).collect();

        for &raw in names {
            let (prefixes, nick) = split_name_prefixes(raw, &symbols);
            if nick.is_empty() {
                continue;
            }

            let chan = self
                .channels
                .entry(CiKey::new(channel, casemap))
                .or_insert_with(|| Channel::new(channel));

            let already_member = chan.members.contains_folded(nick, casemap);
            let member = chan
                .members
                .entry(CiKey::new(nick, casemap))
                .or_insert_with(Member::default);
            for &symbol in &prefixes {
                member.add_prefix(symbol, &symbols);
            }

            let user = self
                .users
                .entry(CiKey::new(nick, casemap))
                .or_insert_with(|| User::new(nick));
            if !already_member {
                user.nchans += 1;
            }
        }
    }

    pub fn handle_names_end(&mut self, channel: &str) {
        let casemap = self.casemap;
        if let Some(chan) = self.channels.get_folded_mut(channel, casemap) {
            chan.synced = true;
        }
    }

    fn remove_membership(&mut self, nick: &str, channel: &str) {
        let casemap = self.casemap;
        let Some(chan) = self.channels.get_folded_mut(channel, casemap) else {
            return;
        };
        if chan.members.remove_folded(nick, casemap).is_none() {
            return;
        }
        if let Some(user) = self.users.get_folded_mut(nick, casemap) {
            user.nchans = user.nchans.saturating_sub(1);
            if user.nchans == 0 {
                self.users.remove_folded(nick, casemap);
            }
        }
    }
}

/// Splits leading `PREFIX` symbol characters (e.g. `"@+nick"`) off a
/// NAMES-listed nick.
fn split_name_prefixes<'a>(raw: &'a str, symbols: &[char]) -> (Vec<char>, &'a str) {
    let mut prefixes = Vec::new();
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if symbols.contains(&c) {
            prefixes.push(c);
            rest = &rest[c.len_utf8()..];
        } else {
            break;
        }
    }
    (prefixes, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isupport_with_ov() -> IsupportState {
        let mut st = IsupportState::default();
        st.apply_tokens(["PREFIX=(ov)@+", "CHANMODES=b,k,l,imnpst"]);
        st
    }

    #[test]
    fn join_creates_channel_and_user_and_increments_nchans() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#ch");
        assert!(t.channel("#ch").unwrap().members.contains_folded("nick1", CaseMap::Rfc1459));
        assert_eq!(t.user("nick1").unwrap().nchans, 1);
    }

    #[test]
    fn part_decrements_and_deletes_user_at_zero() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#ch");
        t.handle_part("nick1", "#ch");
        assert!(t.user("nick1").is_none());
        assert!(!t.channel("#ch").unwrap().members.contains_folded("nick1", CaseMap::Rfc1459));
    }

    #[test]
    fn quit_removes_user_from_every_channel() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#a");
        t.handle_join("nick1", "u", "h", "#b");
        t.handle_quit("nick1");
        assert!(t.user("nick1").is_none());
        assert!(!t.channel("#a").unwrap().members.contains_folded("nick1", CaseMap::Rfc1459));
        assert!(!t.channel("#b").unwrap().members.contains_folded("nick1", CaseMap::Rfc1459));
    }

    #[test]
    fn nick_change_preserves_membership_and_casing() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("OldNick", "u", "h", "#ch");
        t.handle_nick("OldNick", "NewNick");
        assert!(t.user("oldnick").is_none());
        let user = t.user("newnick").unwrap();
        assert_eq!(user.nick, "NewNick");
        assert!(t.channel("#ch").unwrap().members.contains_folded("newnick", CaseMap::Rfc1459));
    }

    #[test]
    fn mode_parse_scenario_assigns_prefixes_and_ban() {
        let isupport = isupport_with_ov();
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#ch");
        t.handle_join("nick2", "u", "h", "#ch");
        t.handle_join("nick3", "u", "h", "#ch");
        // nick2 starts with voice so the `-v` has something to remove.
        t.handle_mode("#ch", "+v", &["nick2"], &isupport);

        t.handle_mode("#ch", "+o-v+b", &["nick1", "nick2", "*!*@ev.il"], &isupport);

        let chan = t.channel("#ch").unwrap();
        assert_eq!(chan.members.get_folded("nick1", CaseMap::Rfc1459).unwrap().modepfx, "@");
        assert_eq!(chan.members.get_folded("nick2", CaseMap::Rfc1459).unwrap().modepfx, "");
        assert_eq!(chan.lists.get(&'b').unwrap(), &vec!["*!*@ev.il".to_owned()]);
    }

    #[test]
    fn names_reply_interns_users_with_prefixes_then_end_marks_synced() {
        let isupport = isupport_with_ov();
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_names("#ch", &["@nick1", "+nick2", "nick3"], &isupport);
        t.handle_names_end("#ch");

        let chan = t.channel("#ch").unwrap();
        assert!(chan.synced);
        assert_eq!(chan.members.get_folded("nick1", CaseMap::Rfc1459).unwrap().modepfx, "@");
        assert_eq!(chan.members.get_folded("nick2", CaseMap::Rfc1459).unwrap().modepfx, "+");
        assert_eq!(t.user("nick3").unwrap().nchans, 1);
    }

    #[test]
    fn topic_numeric_sets_topic_fields() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#ch");
        t.handle_topic("#ch", Some("hello world"), Some("nick1"), Some(12345));
        let chan = t.channel("#ch").unwrap();
        assert_eq!(chan.topic, "hello world");
        assert_eq!(chan.topic_setter, "nick1");
        assert_eq!(chan.topic_set_at, 12345);
    }

    #[test]
    fn nchans_invariant_holds_across_multiple_channels() {
        let mut t = Tracker::new(CaseMap::Rfc1459);
        t.handle_join("nick1", "u", "h", "#a");
        t.handle_join("nick1", "u", "h", "#b");
        t.handle_join("nick1", "u", "h", "#c");
        t.handle_part("nick1", "#b");

        let tracked_in = t.channels().filter(|c| c.members.contains_folded("nick1", CaseMap::Rfc1459)).count();
        assert_eq!(t.user("nick1").unwrap().nchans, tracked_in as usize);
    }
}
