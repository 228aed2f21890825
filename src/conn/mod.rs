//! The transport (`iconn` in the spec): one-shot connect with dual
//! soft/hard timeouts, proxy/TLS negotiation, framed line I/O, and
//! teardown.
//!
//! The socket stays non-blocking for its entire lifetime, from the
//! initial `connect` through steady-state `read`/`write` — every
//! operation is bounded by an explicit microsecond budget enforced via
//! `platform::socket::wait_{readable,writable}`, which is this crate's
//! rendering of the spec's `select`. (The spec's prose also mentions
//! "restoring blocking mode" after connect; that reading would conflict
//! with the proxy handshakes' own explicit requirement to run on a
//! non-blocking socket, so this crate keeps one consistent non-blocking
//! + poll discipline throughout — see DESIGN.md.)

pub mod proxy;
mod wire;

use std::io::{self, Read, Write};
use std::net::TcpStream;

use crate::error::{Error, ErrorKind, Result};
use crate::platform;
use crate::platform::clock::{now_micros, remaining_micros};
use crate::platform::resolve::ResolvedAddr;
use crate::platform::socket::{wait_readable, wait_writable, Readiness};
use crate::proto::{tokenize, Message};
use proxy::ProxySpec;
use wire::Wire;

/// Size of the fixed read buffer backing the line reader.
const BUF_CAPACITY: usize = 4096;
/// Maximum content length of one line, excluding the CRLF terminator
/// (512 bytes total on the wire, per RFC 1459/2812).
const MAX_LINE_CONTENT: usize = 510;

/// The transport's connectivity state.
///
/// The spec additionally names an `INVALID` state reached by disposing
/// the handle; in Rust that's simply dropping the `Transport` value, so
/// there is no `Invalid` variant to represent here — see DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Off,
    On,
}

/// A one-shot connection to an IRC server, with optional proxy and TLS.
pub struct Transport {
    host: String,
    port: u16,
    proxy: Option<ProxySpec>,
    tls: bool,
    state: TransportState,
    wire: Option<Wire>,

    buf: Box<[u8; BUF_CAPACITY]>,
    read_pos: usize,
    fill_len: usize,

    colon_trail: bool,
    eof: bool,
}

impl Transport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Transport {
            host: host.into(),
            port,
            proxy: None,
            tls: false,
            state: TransportState::Off,
            wire: None,
            buf: Box::new([0u8; BUF_CAPACITY]),
            read_pos: 0,
            fill_len: 0,
            colon_trail: false,
            eof: false,
        }
    }

    pub fn set_proxy(&mut self, proxy: Option<ProxySpec>) {
        self.proxy = proxy;
    }

    pub fn set_tls(&mut self, tls: bool) {
        self.tls = tls;
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == TransportState::On
    }

    /// Whether the last message framed had an explicit colon before its
    /// trailing argument; a heuristic for mirroring style on output, and
    /// documented as such (it may be wrong immediately after reconnect).
    pub fn colon_trail(&self) -> bool {
        self.colon_trail
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Resolves the host, then tries each candidate address in turn,
    /// bounded by a soft (per-address) and hard (overall) microsecond
    /// budget. `hard_us == 0` means no overall deadline.
    pub fn connect(&mut self, soft_us: u64, hard_us: u64) -> Result<()> {
        let addrs = platform::resolve(&self.host, self.port)?;
        let n = addrs.len() as u64;

        let hard_deadline = if hard_us == 0 {
            None
        } else {
            Some(now_micros().saturating_add(hard_us))
        };

        // If the configured soft budget can't add up to the hard budget
        // across every candidate, raise it so the full hard budget stays
        // reachable (spec §4.B).
        let effective_soft_us = match hard_deadline {
            Some(_) if soft_us != 0 && soft_us.saturating_mul(n) < hard_us => hard_us / n.max(1),
            _ => soft_us,
        };

        let mut last_err = None;
        for addr in &addrs {
            let budget_us = per_candidate_budget(effective_soft_us, hard_deadline);
            if budget_us == Some(0) {
                last_err = Some(Error::simple(ErrorKind::Timeout));
                continue;
            }
            match self.try_connect_one(addr, budget_us) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!("connect to {} failed: {e}", addr.printable());
                    last_err = Some(e);
                }
            }
        }

        self.state = TransportState::Off;
        Err(last_err.unwrap_or_else(|| Error::simple(ErrorKind::Resolve)))
    }

    fn try_connect_one(&mut self, addr: &ResolvedAddr, budget_us: Option<u64>) -> Result<()> {
        let deadline_us = budget_us.map(|b| now_micros().saturating_add(b));
        let poll_budget = |deadline: Option<u64>| match deadline {
            Some(d) => remaining_micros(now_micros(), d),
            None => u64::from(u32::MAX), // practically unbounded, see platform::socket
        };

        let sock = platform::socket::new_nonblocking_tcp(addr)?;
        platform::socket::begin_connect(&sock, addr)?;

        if wait_writable(&sock, poll_budget(deadline_us))? == Readiness::TimedOut {
            return Err(Error::simple(ErrorKind::Timeout));
        }
        if let Some(e) = sock.take_error()? {
            return Err(e.into());
        }

        let mut tcp: TcpStream = sock.into();

        if let Some(proxy) = self.proxy.clone() {
            let rem = match deadline_us {
                Some(d) => remaining_micros(now_micros(), d),
                None => u64::from(u32::MAX),
            };
            proxy.handshake(&mut tcp, &self.host, self.port, rem)?;
        }

        let wire = if self.tls {
            self.wrap_tls(tcp)?
        } else {
            Wire::Plain(tcp)
        };

        self.wire = Some(wire);
        self.state = TransportState::On;
        self.read_pos = 0;
        self.fill_len = 0;
        self.colon_trail = false;
        self.eof = false;
        Ok(())
    }

    #[cfg(feature = "tls")]
    fn wrap_tls(&self, tcp: TcpStream) -> Result<Wire> {
        // The handshake itself runs on a blocking socket (see
        // `platform::tls`): by this point any proxy handshake — the one
        // step that genuinely needs the socket non-blocking — has already
        // finished, so there is nothing else to poll concurrently with the
        // handshake. The socket is flipped back to non-blocking
        // immediately after, before steady-state read/write resume.
        tcp.set_nonblocking(false)?;
        let stream = platform::tls::TlsStream::connect(tcp, &self.host)?;
        stream.set_nonblocking(true)?;
        Ok(Wire::Tls(Box::new(stream)))
    }

    #[cfg(not(feature = "tls"))]
    fn wrap_tls(&self, _tcp: TcpStream) -> Result<Wire> {
        Err(Error::simple(ErrorKind::Config))
    }

    /// Frames and tokenizes one message, blocking up to `to_us`
    /// microseconds. `to_us == 0` means "do not block": only bytes
    /// already buffered, or immediately available on the socket, can
    /// complete a message.
    ///
    /// Returns `Ok(Some(_))` with the message, `Ok(None)` on timeout (the
    /// buffered bytes remain valid for the next call), or `Err(_)` on a
    /// fatal I/O or unrecoverable protocol error.
    pub fn read(&mut self, to_us: u64) -> Result<Option<Message<'_>>> {
        if self.state != TransportState::On {
            return Err(Error::simple(ErrorKind::Io));
        }
        let deadline_us = now_micros().saturating_add(to_us);

        loop {
            self.skip_leading_delimiters();

            if let Some(delim_at) = self.find_delimiter() {
                let line_start = self.read_pos;
                let line_end = delim_at;
                self.read_pos = delim_at + 1;

                if line_start == line_end {
                    // A line with only CR/LF: silently skipped, not a
                    // tokenize call.
                    continue;
                }

                let len = line_end - line_start;
                if len > MAX_LINE_CONTENT {
                    // Recoverable: cursors already past this line.
                    return Err(Error::simple(ErrorKind::Protocol));
                }

                let bytes = &self.buf[line_start..line_end];
                let line = std::str::from_utf8(bytes)
                    .map_err(|_| Error::simple(ErrorKind::Protocol))?;
                let msg = tokenize(line)?;
                self.colon_trail = msg.colon_trail();
                return Ok(Some(msg));
            }

            // No delimiter yet: make room, then try to read more.
            if self.read_pos == 0 && self.fill_len == self.buf.len() {
                // Buffer is entirely one undelimited line; unrecoverable.
                self.reset();
                return Err(Error::simple(ErrorKind::Protocol));
            }
            self.compact();

            let remaining = remaining_micros(now_micros(), deadline_us);
            let wire = self.wire.as_mut().expect("state On implies a wire");
            if wait_readable(wire, remaining)? == Readiness::TimedOut {
                return Ok(None);
            }

            match wire.read(&mut self.buf[self.fill_len..]) {
                Ok(0) => {
                    self.eof = true;
                    self.state = TransportState::Off;
                    return Err(Error::simple(ErrorKind::Eof));
                }
                Ok(n) => self.fill_len += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    self.state = TransportState::Off;
                    return Err(e.into());
                }
            }
        }
    }

    /// Sends `line`, appending `\r\n` iff not already present, retrying
    /// short writes until everything is sent or a permanent error occurs.
    pub fn write(&mut self, line: &str, to_us: u64) -> Result<()> {
        if self.state != TransportState::On {
            return Err(Error::simple(ErrorKind::Io));
        }
        let deadline_us = now_micros().saturating_add(to_us);

        let mut out = line.to_owned();
        if !out.ends_with("\r\n") {
            out.push_str("\r\n");
        }
        let bytes = out.as_bytes();

        let mut sent = 0;
        while sent < bytes.len() {
            let remaining = remaining_micros(now_micros(), deadline_us);
            let wire = self.wire.as_mut().expect("state On implies a wire");
            if wait_writable(wire, remaining)? == Readiness::TimedOut {
                return Err(Error::simple(ErrorKind::Timeout));
            }
            match wire.write(&bytes[sent..]) {
                Ok(0) => {
                    self.state = TransportState::Off;
                    return Err(Error::simple(ErrorKind::Eof));
                }
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    self.state = TransportState::Off;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Closes the wire and zeroes the buffer cursors, transitioning to
    /// `Off`. The configuration (host, port, proxy, tls) is preserved so
    /// the same `Transport` can be reconnected.
    pub fn reset(&mut self) {
        self.wire = None;
        self.read_pos = 0;
        self.fill_len = 0;
        self.colon_trail = false;
        self.eof = false;
        self.state = TransportState::Off;
    }

    fn skip_leading_delimiters(&mut self) {
        while self.read_pos < self.fill_len
            && matches!(self.buf[self.read_pos], b'\r' | b'\n')
        {
            self.read_pos += 1;
        }
    }

    fn find_delimiter(&self) -> Option<usize> {
        self.buf[self.read_pos..self.fill_len]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .map(|i| self.read_pos + i)
    }

    fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.buf.copy_within(self.read_pos..self.fill_len, 0);
        self.fill_len -= self.read_pos;
        self.read_pos = 0;
    }
}

fn per_candidate_budget(effective_soft_us: u64, hard_deadline: Option<u64>) -> Option<u64> {
    let hard_rem = hard_deadline.map(|d| remaining_micros(now_micros(), d));
    match (effective_soft_us, hard_rem) {
        (0, None) => None,
        (0, Some(h)) => Some(h),
        (s, None) => Some(s),
        (s, Some(h)) => Some(s.min(h)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn loopback_pair() -> (Transport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || listener.accept().unwrap().0);

        let mut t = Transport::new(addr.ip().to_string(), addr.port());
        t.connect(0, 0).expect("connect to loopback");
        let server_sock = handle.join().unwrap();
        (t, server_sock)
    }

    #[test]
    fn connects_and_frames_one_message() {
        let (mut t, mut server) = loopback_pair();
        server.write_all(b":nick!u@h PRIVMSG #ch :hi there\r\n").unwrap();

        let msg = t.read(1_000_000).expect("read").expect("some message");
        assert_eq!(msg.command(), "PRIVMSG");
        assert_eq!(msg.params(), &["#ch", "hi there"]);
    }

    #[test]
    fn read_times_out_with_no_data() {
        let (mut t, _server) = loopback_pair();
        let r = t.read(1_000).expect("read should not error on timeout");
        assert!(r.is_none());
    }

    #[test]
    fn blank_lines_are_skipped_without_surfacing() {
        let (mut t, mut server) = loopback_pair();
        server.write_all(b"\r\n\r\nPING :x\r\n").unwrap();

        let msg = t.read(1_000_000).expect("read").expect("some message");
        assert_eq!(msg.command(), "PING");
    }

    #[test]
    fn over_length_line_is_a_recoverable_protocol_error() {
        let (mut t, mut server) = loopback_pair();
        let mut long_line = vec![b'A'; 600];
        long_line.push(b'\r');
        long_line.push(b'\n');
        server.write_all(&long_line).unwrap();
        server.write_all(b"PING :x\r\n").unwrap();

        let err = t.read(1_000_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(t.is_online(), "transport should stay usable after a recoverable error");

        let msg = t.read(1_000_000).expect("read").expect("some message");
        assert_eq!(msg.command(), "PING");
    }

    #[test]
    fn write_appends_crlf_when_missing() {
        let (mut t, mut server) = loopback_pair();
        t.write("PING :x", 1_000_000).unwrap();

        let mut buf = [0u8; 16];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"PING :x\r\n");
    }

    #[test]
    fn write_does_not_duplicate_existing_crlf() {
        let (mut t, mut server) = loopback_pair();
        t.write("PING :x\r\n", 1_000_000).unwrap();

        let mut buf = [0u8; 16];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"PING :x\r\n");
    }

    #[test]
    fn eof_is_reported_and_transport_goes_offline() {
        let (mut t, server) = loopback_pair();
        drop(server);

        let err = t.read(1_000_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eof);
        assert!(!t.is_online());
    }

    #[test]
    fn hard_budget_of_one_microsecond_times_out_against_real_resolution() {
        let mut t = Transport::new("127.0.0.1", 9); // discard port, unreachable-ish
        let err = t.connect(0, 1);
        assert!(err.is_err());
    }
}
