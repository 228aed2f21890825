//! The IRC session (`irc` in the spec, component F): the logon state
//! machine, 005 ingestion, built-in message reactions (auto-PONG,
//! tracker updates), and the pre/post handler table layered on top of
//! [`conn::Transport`].

mod config;
mod dispatch;
mod logon;

pub use config::{ConnectTimeout, ServiceConfig, SessionConfig};
pub use dispatch::{HandlerOrder, HandlerResult};
pub use logon::{LogonConversation, LogonState};

use std::collections::HashMap;

use dispatch::HandlerEntry;
use logon::mutate_nick;

use crate::casemap::CaseMap;
use crate::conn::Transport;
use crate::error::{ErrorKind, Result};
use crate::isupport::IsupportState;
use crate::proto::{split_prefix, OwnedMessage};
use crate::tracker::Tracker;

/// A single synchronous connection to an IRC server: owns the
/// transport, the tracker, and the negotiated 005 parameters, and
/// drives registration as messages are read.
///
/// `!Sync` in spirit: nothing prevents wrapping a `Session` in a
/// `Mutex`, but the crate does no interior synchronization of its own
/// (see SPEC_FULL.md §5).
pub struct Session {
    config: SessionConfig,
    transport: Transport,
    tracker: Tracker,
    isupport: IsupportState,
    state: LogonState,
    own_nick: String,
    pending_nick: String,
    banned: bool,
    banmsg: String,
    lasterr: Option<String>,
    conversation: LogonConversation,
    handlers: HashMap<String, Vec<HandlerEntry>>,
}

/// Write timeout used for lines this crate emits on its own behalf
/// (PASS/NICK/USER, auto-PONG, nick retries) when no caller-supplied
/// budget applies. Generous since these are small, already-connected
/// writes, not a network round trip.
const INTERNAL_WRITE_TIMEOUT_US: u64 = 5_000_000;

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let nick = config.nick.clone();
        Session {
            transport: Transport::new(config.host.clone(), config.port),
            tracker: Tracker::new(CaseMap::default()),
            isupport: IsupportState::default(),
            state: LogonState::Disconnected,
            own_nick: nick.clone(),
            pending_nick: nick,
            banned: false,
            banmsg: String::new(),
            lasterr: None,
            conversation: LogonConversation::new(),
            handlers: HashMap::new(),
            config,
        }
    }

    pub fn state(&self) -> LogonState {
        self.state
    }

    pub fn online(&self) -> bool {
        self.state == LogonState::Registered
    }

    pub fn banned(&self) -> bool {
        self.banned
    }

    pub fn banmsg(&self) -> &str {
        &self.banmsg
    }

    pub fn lasterr(&self) -> Option<&str> {
        self.lasterr.as_deref()
    }

    pub fn nick(&self) -> &str {
        &self.own_nick
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn isupport(&self) -> &IsupportState {
        &self.isupport
    }

    pub fn conversation(&self) -> &LogonConversation {
        &self.conversation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registers `handler` to run on every message with command `cmd`
    /// (a bare command name like `"PRIVMSG"`, or a three-digit numeric
    /// like `"353"`), in the given phase relative to this crate's own
    /// built-in reactions.
    pub fn register_handler(
        &mut self,
        cmd: impl Into<String>,
        order: HandlerOrder,
        handler: impl FnMut(&mut Session, &OwnedMessage) -> HandlerResult + 'static,
    ) {
        self.handlers
            .entry(cmd.into())
            .or_default()
            .push(HandlerEntry { order, handler: Box::new(handler) });
    }

    /// Connects the transport and sends the registration preamble
    /// (`PASS`/`NICK`/`USER` or `SERVICE`). Leaves the session in
    /// `Registering`; the caller's `read` loop drives the rest of the
    /// logon state machine as numerics arrive.
    pub fn connect(&mut self) -> Result<()> {
        self.config.validate()?;

        self.transport.set_proxy(self.config.proxy.clone());
        self.transport.set_tls(self.config.ssl);
        self.transport
            .connect(self.config.connect_timeout.soft_us, self.config.connect_timeout.hard_us)?;
        self.state = LogonState::TransportUp;

        self.tracker = Tracker::new(CaseMap::default());
        self.isupport = IsupportState::default();
        self.conversation = LogonConversation::new();
        self.banned = false;
        self.banmsg.clear();

        self.send_registration_preamble()?;
        self.state = LogonState::Registering;
        Ok(())
    }

    fn send_registration_preamble(&mut self) -> Result<()> {
        if let Some(pass) = self.config.pass.clone() {
            self.transport.write(&format!("PASS {pass}"), INTERNAL_WRITE_TIMEOUT_US)?;
        }
        self.pending_nick = self.config.nick.clone();
        self.transport
            .write(&format!("NICK {}", self.pending_nick), INTERNAL_WRITE_TIMEOUT_US)?;

        match self.config.service.clone() {
            Some(svc) if svc.enable => {
                self.transport.write(
                    &format!(
                        "SERVICE {} * {} {} * :{}",
                        self.pending_nick, svc.distribution, svc.kind, svc.info
                    ),
                    INTERNAL_WRITE_TIMEOUT_US,
                )?;
            }
            _ => {
                self.transport.write(
                    &format!("USER {} {} * :{}", self.config.user, self.config.conflags, self.config.fname),
                    INTERNAL_WRITE_TIMEOUT_US,
                )?;
            }
        }
        Ok(())
    }

    /// Reads and dispatches at most one message, blocking up to `to_us`
    /// microseconds (see `conn::Transport::read` for the timeout
    /// convention: `Ok(None)` is a plain timeout, not an error).
    pub fn read(&mut self, to_us: u64) -> Result<Option<OwnedMessage>> {
        let owned = match self.transport.read(to_us) {
            Ok(Some(msg)) => msg.to_owned_message(),
            Ok(None) => return Ok(None),
            Err(e) => {
                self.lasterr = Some(e.to_string());
                if e.kind() == ErrorKind::Eof {
                    self.state = LogonState::Disconnected;
                }
                return Err(e);
            }
        };

        self.dispatch(&owned);
        Ok(Some(owned))
    }

    /// Sends a raw line, appending `\r\n` if missing.
    pub fn write(&mut self, line: &str, to_us: u64) -> Result<()> {
        self.transport.write(line, to_us)
    }

    /// Tears down the transport and returns to `Disconnected`. The
    /// configuration survives, so the same `Session` can `connect()` again.
    pub fn disconnect(&mut self) {
        self.transport.reset();
        self.state = LogonState::Disconnected;
    }

    fn dispatch(&mut self, msg: &OwnedMessage) {
        if self.state == LogonState::Registering {
            self.conversation.observe(msg);
        }
        self.run_handlers(&msg.command, msg, HandlerOrder::Pre);
        self.handle_builtin(msg);
        self.run_handlers(&msg.command, msg, HandlerOrder::Post);
    }

    fn run_handlers(&mut self, cmd: &str, msg: &OwnedMessage, order: HandlerOrder) {
        let Some(mut entries) = self.handlers.remove(cmd) else {
            return;
        };
        for entry in entries.iter_mut() {
            if entry.order == order {
                if let HandlerResult::Stop = (entry.handler)(self, msg) {
                    break;
                }
            }
        }
        self.handlers.insert(cmd.to_owned(), entries);
    }

    fn handle_builtin(&mut self, msg: &OwnedMessage) {
        match msg.command.as_str() {
            "PING" if !self.config.dumb => {
                let payload = msg.arg(0).unwrap_or("");
                let _ = self.transport.write(&format!("PONG :{payload}"), INTERNAL_WRITE_TIMEOUT_US);
            }
            "001" => {
                if let Some(nick) = msg.arg(0) {
                    self.own_nick = nick.to_owned();
                }
            }
            "005" => self.handle_isupport(msg),
            "376" | "422" if self.state == LogonState::Registering => {
                self.state = LogonState::Registered;
            }
            "432" | "433" | "436" if self.state == LogonState::Registering => {
                self.pending_nick = mutate_nick(&self.pending_nick);
                let nick = self.pending_nick.clone();
                let _ = self.transport.write(&format!("NICK {nick}"), INTERNAL_WRITE_TIMEOUT_US);
            }
            "464" => {
                self.lasterr = Some(msg.arg(0).unwrap_or("bad password").to_owned());
                self.state = LogonState::Disconnected;
                self.transport.reset();
            }
            "465" => {
                self.banned = true;
                self.banmsg = msg.params.last().cloned().unwrap_or_default();
                self.state = LogonState::Disconnected;
                self.transport.reset();
            }
            "ERROR" => {
                self.lasterr = Some(msg.params.last().cloned().unwrap_or_default());
                self.state = LogonState::Disconnected;
                self.transport.reset();
            }
            "JOIN" if self.config.tracking => {
                if let (Some(prefix), Some(channel)) = (&msg.prefix, msg.arg(0)) {
                    let (nick, ident, host) = split_prefix(prefix);
                    self.tracker.handle_join(nick, ident, host, channel);
                }
            }
            "PART" if self.config.tracking => {
                if let (Some(prefix), Some(channel)) = (&msg.prefix, msg.arg(0)) {
                    let (nick, _, _) = split_prefix(prefix);
                    self.tracker.handle_part(nick, channel);
                }
            }
            "KICK" if self.config.tracking => {
                if let (Some(channel), Some(target)) = (msg.arg(0), msg.arg(1)) {
                    self.tracker.handle_kick(channel, target);
                }
            }
            "QUIT" if self.config.tracking => {
                if let Some(prefix) = &msg.prefix {
                    let (nick, _, _) = split_prefix(prefix);
                    self.tracker.handle_quit(nick);
                }
            }
            "NICK" if self.config.tracking => {
                if let (Some(prefix), Some(new_nick)) = (&msg.prefix, msg.arg(0)) {
                    let (old_nick, _, _) = split_prefix(prefix);
                    if self.isupport.casemapping.eq(old_nick, &self.own_nick) {
                        self.own_nick = new_nick.to_owned();
                    }
                    self.tracker.handle_nick(old_nick, new_nick);
                }
            }
            "MODE" if self.config.tracking => self.handle_mode(msg),
            "TOPIC" if self.config.tracking => {
                if let (Some(channel), Some(topic)) = (msg.arg(0), msg.arg(1)) {
                    let setter = msg.prefix.as_deref().map(|p| split_prefix(p).0.to_owned());
                    self.tracker.handle_topic(channel, Some(topic), setter.as_deref(), None);
                }
            }
            "332" if self.config.tracking => {
                if let (Some(channel), Some(topic)) = (msg.arg(1), msg.arg(2)) {
                    self.tracker.handle_topic(channel, Some(topic), None, None);
                }
            }
            "333" if self.config.tracking => {
                if let (Some(channel), Some(setter), Some(ts)) = (msg.arg(1), msg.arg(2), msg.arg(3)) {
                    self.tracker.handle_topic(channel, None, Some(setter), ts.parse().ok());
                }
            }
            "353" if self.config.tracking => {
                if let (Some(channel), Some(names_str)) = (msg.arg(2), msg.arg(3)) {
                    let names: Vec<&str> = names_str.split(' ').filter(|s| !s.is_empty()).collect();
                    self.tracker.handle_names(channel, &names, &self.isupport);
                }
            }
            "366" if self.config.tracking => {
                if let Some(channel) = msg.arg(1) {
                    self.tracker.handle_names_end(channel);
                }
            }
            _ => {}
        }
    }

    fn handle_isupport(&mut self, msg: &OwnedMessage) {
        let params = &msg.params;
        if params.len() <= 1 {
            return;
        }
        let end = if msg.colon_trail { params.len() - 1 } else { params.len() };
        let tokens: Vec<&str> = params[1..end].iter().map(String::as_str).collect();
        self.isupport.apply_tokens(tokens);
        self.tracker.set_casemap(self.isupport.casemapping);
    }

    fn handle_mode(&mut self, msg: &OwnedMessage) {
        let Some(target) = msg.arg(0) else { return };
        if self.tracker.channel(target).is_none() {
            return;
        }
        let Some(modestr) = msg.arg(1) else { return };
        let rest: Vec<&str> = msg.params.iter().skip(2).map(String::as_str).collect();
        self.tracker.handle_mode(target, modestr, &rest, &self.isupport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionConfig::new("irc.example.org", 6667, "bot"))
    }

    #[test]
    fn welcome_numeric_captures_own_nick_but_stays_registering_until_end_of_motd() {
        let mut s = session();
        s.state = LogonState::Registering;
        let msg = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "001".to_owned(),
            params: vec!["bot_actual".to_owned(), "Welcome".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&msg);
        assert_eq!(s.nick(), "bot_actual");
        assert_eq!(s.state(), LogonState::Registering);

        let end_of_motd = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "376".to_owned(),
            params: vec!["bot_actual".to_owned(), "End of MOTD".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&end_of_motd);
        assert_eq!(s.state(), LogonState::Registered);
    }

    #[test]
    fn logon_conversation_captures_first_four_non_ping_messages_through_end_of_motd() {
        let mut s = session();
        s.state = LogonState::Registering;

        let ping = OwnedMessage {
            prefix: None,
            command: "PING".to_owned(),
            params: vec!["x".to_owned()],
            colon_trail: true,
        };
        let welcome = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "001".to_owned(),
            params: vec!["bot".to_owned(), "Welcome".to_owned()],
            colon_trail: true,
        };
        let yourhost = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "002".to_owned(),
            params: vec!["bot".to_owned(), "Your host is irc.example.org".to_owned()],
            colon_trail: true,
        };
        let isupport = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "005".to_owned(),
            params: vec!["bot".to_owned(), "CASEMAPPING=ascii".to_owned(), "are supported".to_owned()],
            colon_trail: true,
        };
        let end_of_motd = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "375".to_owned(),
            params: vec!["bot".to_owned(), "MOTD start".to_owned()],
            colon_trail: true,
        };

        s.dispatch(&ping);
        s.dispatch(&welcome);
        s.dispatch(&yourhost);
        s.dispatch(&isupport);
        s.dispatch(&end_of_motd);

        assert_eq!(s.state(), LogonState::Registering);
        let captured = s.conversation().messages();
        assert_eq!(captured.len(), 4);
        assert_eq!(captured[0].command, "001");
        assert_eq!(captured[1].command, "002");
        assert_eq!(captured[2].command, "005");
        assert_eq!(captured[3].command, "375");
    }

    #[test]
    fn isupport_numeric_updates_casemapping() {
        let mut s = session();
        let msg = OwnedMessage {
            prefix: Some("irc.example.org".to_owned()),
            command: "005".to_owned(),
            params: vec![
                "bot".to_owned(),
                "CASEMAPPING=ascii".to_owned(),
                "PREFIX=(ov)@+".to_owned(),
                "are supported by this server".to_owned(),
            ],
            colon_trail: true,
        };
        s.dispatch(&msg);
        assert_eq!(s.isupport().casemapping, CaseMap::Ascii);
    }

    #[test]
    fn nick_collision_mutates_and_resends_during_registering() {
        let mut s = session();
        s.state = LogonState::Registering;
        s.pending_nick = "bot".to_owned();
        let msg = OwnedMessage {
            prefix: None,
            command: "433".to_owned(),
            params: vec!["*".to_owned(), "bot".to_owned(), "Nickname in use".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&msg);
        assert_eq!(s.pending_nick, "bot_");
    }

    #[test]
    fn banned_numeric_sets_banned_flag_and_message() {
        let mut s = session();
        let msg = OwnedMessage {
            prefix: None,
            command: "465".to_owned(),
            params: vec!["bot".to_owned(), "You are banned".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&msg);
        assert!(s.banned());
        assert_eq!(s.banmsg(), "You are banned");
        assert_eq!(s.state(), LogonState::Disconnected);
    }

    #[test]
    fn join_and_part_update_the_tracker() {
        let mut s = session();
        let join = OwnedMessage {
            prefix: Some("nick1!u@h".to_owned()),
            command: "JOIN".to_owned(),
            params: vec!["#ch".to_owned()],
            colon_trail: false,
        };
        s.dispatch(&join);
        use crate::cimap::CiMapExt;
        assert!(s.tracker().channel("#ch").unwrap().members.contains_folded("nick1", CaseMap::default()));

        let part = OwnedMessage {
            prefix: Some("nick1!u@h".to_owned()),
            command: "PART".to_owned(),
            params: vec!["#ch".to_owned()],
            colon_trail: false,
        };
        s.dispatch(&part);
        assert!(s.tracker().user("nick1").is_none());
    }

    #[test]
    fn custom_handler_runs_and_can_stop_further_handlers() {
        let mut s = session();
        let calls = std::rc::Rc::new(std::cell::RefCell::new(0));
        let calls_a = calls.clone();
        let calls_b = calls.clone();

        s.register_handler("PRIVMSG", HandlerOrder::Pre, move |_s, _m| {
            *calls_a.borrow_mut() += 1;
            HandlerResult::Stop
        });
        s.register_handler("PRIVMSG", HandlerOrder::Pre, move |_s, _m| {
            *calls_b.borrow_mut() += 1;
            HandlerResult::Continue
        });

        let msg = OwnedMessage {
            prefix: Some("nick1!u@h".to_owned()),
            command: "PRIVMSG".to_owned(),
            params: vec!["#ch".to_owned(), "hi".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&msg);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn dumb_mode_suppresses_auto_pong() {
        let mut s = session();
        s.config.dumb = true;
        // No transport is connected, so a write would error; dumb mode
        // must skip the write entirely rather than attempt and fail.
        let msg = OwnedMessage {
            prefix: None,
            command: "PING".to_owned(),
            params: vec!["x".to_owned()],
            colon_trail: true,
        };
        s.dispatch(&msg); // would panic/error noisily if it tried to write
    }
}
