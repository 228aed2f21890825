//! The session's configuration surface (§6), mirroring the teacher's
//! plain-fields `NodeConfig` rather than a method-chained builder:
//! fields are public, a `new` constructor supplies defaults, and
//! `validate` runs the same "initial checks of correctness" the teacher
//! performs at the top of `Node::bootstrap`, just ahead of `connect`.

use crate::conn::proxy::ProxySpec;
use crate::error::{Error, ErrorKind, Result};

/// Registering as a service (`SERVICE`) instead of a normal user
/// (`USER`/`NICK`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceConfig {
    pub enable: bool,
    pub distribution: String,
    pub kind: String,
    pub info: String,
}

/// Per-address (`soft`) and overall (`hard`) connect budgets, in
/// microseconds. `0` means unbounded for either field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectTimeout {
    pub soft_us: u64,
    pub hard_us: u64,
}

impl Default for ConnectTimeout {
    fn default() -> Self {
        ConnectTimeout { soft_us: 10_000_000, hard_us: 30_000_000 }
    }
}

/// Everything needed to register with a server, bootstrapped once by
/// `Session::new` and read (never mutated mid-registration) by the logon
/// state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub proxy: Option<ProxySpec>,

    pub nick: String,
    pub user: String,
    pub fname: String,
    pub pass: Option<String>,
    /// `USER` mode bitmask sent at registration (bit 2 = `w`, bit 3 = `i`,
    /// per RFC 2812 §3.1.3).
    pub conflags: u8,
    pub service: Option<ServiceConfig>,

    pub connect_timeout: ConnectTimeout,

    pub tracking: bool,
    /// Disables every built-in reaction, including auto-PONG.
    pub dumb: bool,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, nick: impl Into<String>) -> Self {
        let nick = nick.into();
        SessionConfig {
            host: host.into(),
            port,
            ssl: false,
            proxy: None,
            user: nick.clone(),
            fname: nick.clone(),
            nick,
            pass: None,
            conflags: 0,
            service: None,
            connect_timeout: ConnectTimeout::default(),
            tracking: true,
            dumb: false,
        }
    }

    /// Checks that are cheap to do eagerly rather than surfacing as a
    /// confusing failure deep in the logon state machine.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(config_error("host must not be empty"));
        }
        if self.nick.is_empty() {
            return Err(config_error("nick must not be empty"));
        }
        if self.user.is_empty() {
            return Err(config_error("user must not be empty"));
        }
        if let Some(svc) = &self.service {
            if svc.enable && svc.distribution.is_empty() {
                return Err(config_error("service distribution must not be empty"));
            }
        }
        Ok(())
    }
}

fn config_error(msg: &str) -> Error {
    Error::wrapped(ErrorKind::Config, msg.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_user_and_fname_to_nick() {
        let cfg = SessionConfig::new("irc.example.org", 6667, "bot");
        assert_eq!(cfg.user, "bot");
        assert_eq!(cfg.fname, "bot");
    }

    #[test]
    fn validate_rejects_empty_nick() {
        let mut cfg = SessionConfig::new("irc.example.org", 6667, "bot");
        cfg.nick.clear();
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn validate_accepts_sane_defaults() {
        let cfg = SessionConfig::new("irc.example.org", 6667, "bot");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_service_with_no_distribution() {
        let mut cfg = SessionConfig::new("irc.example.org", 6667, "bot");
        cfg.service = Some(ServiceConfig { enable: true, ..Default::default() });
        assert_eq!(cfg.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}
