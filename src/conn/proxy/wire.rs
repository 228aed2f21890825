//! Shared non-blocking read/write helpers for the proxy handshakes.
//!
//! Every handshake runs on the same non-blocking socket the transport
//! uses for steady-state I/O (see `conn::mod` for why this crate keeps
//! the socket non-blocking for its entire lifetime rather than toggling
//! back to blocking mode after connect). These helpers turn that into
//! "write/read fully, bounded by an absolute microsecond deadline".

use std::io::{self, Read, Write};
use std::net::TcpStream;

use crate::error::{Error, ErrorKind, Result};
use crate::platform::clock::{now_micros, remaining_micros};
use crate::platform::socket::{wait_readable, wait_writable, Readiness};

fn remaining_or_timeout(deadline_us: u64) -> Result<u64> {
    let rem = remaining_micros(now_micros(), deadline_us);
    if rem == 0 {
        return Err(Error::simple(ErrorKind::Timeout));
    }
    Ok(rem)
}

/// Writes all of `buf` to `stream`, waiting for writability as needed,
/// failing once `deadline_us` (an absolute `now_micros()` timestamp)
/// passes.
pub fn write_all(stream: &mut TcpStream, buf: &[u8], deadline_us: u64) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        let rem = remaining_or_timeout(deadline_us)?;
        if wait_writable(stream, rem)? == Readiness::TimedOut {
            return Err(Error::simple(ErrorKind::Timeout));
        }
        match stream.write(&buf[sent..]) {
            Ok(0) => return Err(Error::simple(ErrorKind::Eof)),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Reads exactly `buf.len()` bytes from `stream`.
pub fn read_exact(stream: &mut TcpStream, buf: &mut [u8], deadline_us: u64) -> Result<()> {
    let mut got = 0;
    while got < buf.len() {
        let rem = remaining_or_timeout(deadline_us)?;
        if wait_readable(stream, rem)? == Readiness::TimedOut {
            return Err(Error::simple(ErrorKind::Timeout));
        }
        match stream.read(&mut buf[got..]) {
            Ok(0) => return Err(Error::simple(ErrorKind::Eof)),
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Reads bytes one at a time until `needle` has been seen at the end of
/// the accumulated buffer (used by the HTTP CONNECT handshake to find
/// the blank line terminating the response headers). Bounded to
/// `max_len` bytes to avoid an unbounded accumulation against a
/// misbehaving or malicious proxy.
pub fn read_until(
    stream: &mut TcpStream,
    needle: &[u8],
    max_len: usize,
    deadline_us: u64,
) -> Result<Vec<u8>> {
    let mut acc = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if acc.len() >= max_len {
            return Err(Error::simple(ErrorKind::ProxyRefused));
        }
        read_exact(stream, &mut byte, deadline_us)?;
        acc.push(byte[0]);
        if acc.len() >= needle.len() && &acc[acc.len() - needle.len()..] == needle {
            return Ok(acc);
        }
    }
}
