//! HTTP CONNECT tunneling, the simplest of the three proxy handshakes:
//! send a `CONNECT` request, read until the blank line, require a `2xx`
//! status.

use std::net::TcpStream;

use super::wire::{read_until, write_all};
use crate::error::{Error, ErrorKind, Result};

const MAX_RESPONSE_LEN: usize = 8192;

pub fn handshake(
    stream: &mut TcpStream,
    target_host: &str,
    target_port: u16,
    deadline_us: u64,
) -> Result<()> {
    let request = format!("CONNECT {target_host}:{target_port} HTTP/1.0\r\n\r\n");
    write_all(stream, request.as_bytes(), deadline_us)?;

    let response = read_until(stream, b"\r\n\r\n", MAX_RESPONSE_LEN, deadline_us)?;
    let status_line = response
        .split(|&b| b == b'\n')
        .next()
        .ok_or_else(|| Error::simple(ErrorKind::ProxyRefused))?;
    let status_line = String::from_utf8_lossy(status_line);
    let status_line = status_line.trim();

    if !is_success_status_line(status_line) {
        return Err(Error::wrapped(
            ErrorKind::ProxyRefused,
            format!("HTTP CONNECT refused: {status_line}"),
        ));
    }
    Ok(())
}

fn is_success_status_line(line: &str) -> bool {
    // "HTTP/1.x 2xx ..." — we only need to check the prefix and that the
    // status code's first digit is '2'.
    let Some(rest) = line.strip_prefix("HTTP/1.") else {
        return false;
    };
    let Some(rest) = rest.strip_prefix(['0', '1']) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix(' ') else {
        return false;
    };
    rest.starts_with('2')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_2xx_status_lines() {
        assert!(is_success_status_line("HTTP/1.1 200 Connection Established"));
        assert!(is_success_status_line("HTTP/1.0 299 ok"));
    }

    #[test]
    fn rejects_non_2xx_status_lines() {
        assert!(!is_success_status_line("HTTP/1.1 407 Proxy Authentication Required"));
        assert!(!is_success_status_line("HTTP/1.1 500 Internal Server Error"));
        assert!(!is_success_status_line("garbage"));
    }
}
