//! Proxy handshakes: HTTP CONNECT, SOCKS4, SOCKS5, all run on an
//! already-connected, non-blocking socket, and the `<type>:<host>[:port]`
//! specifier grammar used to configure one.

mod http_connect;
mod socks4;
mod socks5;
mod wire;

use std::net::TcpStream;

use crate::error::{Error, ErrorKind, Result};
use crate::platform::clock::now_micros;

/// The supported proxy protocols. A closed enumeration, per the spec's
/// call for tagged variants over free integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProxyKind {
    Http,
    Socks4,
    Socks5,
}

/// A fully-specified proxy to tunnel through.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProxySpec {
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

impl ProxySpec {
    /// Runs this proxy's handshake against `target_host`/`target_port`
    /// (the *ultimate* IRC server, not the proxy itself), bounded by
    /// `budget_us` microseconds.
    pub fn handshake(
        &self,
        stream: &mut TcpStream,
        target_host: &str,
        target_port: u16,
        budget_us: u64,
    ) -> Result<()> {
        let deadline_us = now_micros().saturating_add(budget_us);
        match self.kind {
            ProxyKind::Http => http_connect::handshake(stream, target_host, target_port, deadline_us),
            ProxyKind::Socks4 => socks4::handshake(stream, target_host, target_port, deadline_us),
            ProxyKind::Socks5 => socks5::handshake(stream, target_host, target_port, deadline_us),
        }
    }
}

/// Parses the proxy specifier grammar: `<type>:<host>[:port][/ssl]`,
/// where `type` is one of `HTTP`, `SOCKS4`, `SOCKS5` (case-insensitive).
/// The trailing `/ssl` marker is consumed but is the caller's concern
/// (whether the *proxy itself* is reached over TLS) — this crate's
/// `ssl` config flag governs TLS to the ultimate IRC server, so the
/// marker is parsed for grammar-compatibility and otherwise ignored.
///
/// `"SOCKS5:[::1]:1080"` parses to `(Socks5, "::1", 1080)`.
pub fn parse_proxy_spec(spec: &str) -> Result<ProxySpec> {
    let spec = spec.strip_suffix("/ssl").unwrap_or(spec);
    let (kind_str, host_port) = spec
        .split_once(':')
        .ok_or_else(config_error)?;

    let kind = match kind_str.to_ascii_uppercase().as_str() {
        "HTTP" => ProxyKind::Http,
        "SOCKS4" => ProxyKind::Socks4,
        "SOCKS5" => ProxyKind::Socks5,
        _ => return Err(config_error()),
    };

    let (host, port) = parse_host_port(host_port)?;
    Ok(ProxySpec { kind, host, port })
}

/// Parses the host specifier grammar: `srvaddr[:port][/ssl]`, with
/// bracketed IPv6 syntax (`[::1]:6697`). Returns `(host, port)`; `port`
/// defaults to 0 (meaning "caller must supply one") when absent.
pub fn parse_host_port(spec: &str) -> Result<(String, u16)> {
    let spec = spec.strip_suffix("/ssl").unwrap_or(spec);

    if let Some(rest) = spec.strip_prefix('[') {
        let (host, after) = rest.split_once(']').ok_or_else(config_error)?;
        let port = match after.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| config_error())?,
            None => 0,
        };
        return Ok((host.to_owned(), port));
    }

    match spec.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| config_error())?;
            Ok((host.to_owned(), port))
        }
        None => Ok((spec.to_owned(), 0)),
    }
}

fn config_error() -> Error {
    Error::simple(ErrorKind::Config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_proxy_spec() {
        let p = parse_proxy_spec("HTTP:10.0.0.1:8080").unwrap();
        assert_eq!(p.kind, ProxyKind::Http);
        assert_eq!(p.host, "10.0.0.1");
        assert_eq!(p.port, 8080);
    }

    #[test]
    fn parses_socks5_proxy_spec_with_bracketed_ipv6() {
        let p = parse_proxy_spec("SOCKS5:[::1]:1080").unwrap();
        assert_eq!(p.kind, ProxyKind::Socks5);
        assert_eq!(p.host, "::1");
        assert_eq!(p.port, 1080);
    }

    #[test]
    fn proxy_kind_is_case_insensitive() {
        assert_eq!(parse_proxy_spec("socks4:host:1").unwrap().kind, ProxyKind::Socks4);
    }

    #[test]
    fn rejects_unknown_proxy_type() {
        assert_eq!(
            parse_proxy_spec("WIBBLE:host:1").unwrap_err().kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn parses_host_port_with_ssl_marker() {
        let (host, port) = parse_host_port("irc.example.org:6697/ssl").unwrap();
        assert_eq!(host, "irc.example.org");
        assert_eq!(port, 6697);
    }

    #[test]
    fn parses_bare_host_with_no_port() {
        let (host, port) = parse_host_port("irc.example.org").unwrap();
        assert_eq!(host, "irc.example.org");
        assert_eq!(port, 0);
    }
}
