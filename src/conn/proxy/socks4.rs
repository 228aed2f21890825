//! SOCKS4 client handshake.
//!
//! Per the Open Question resolved in `SPEC_FULL.md` §9: this crate
//! resolves `target_host` locally and requires an IPv4 result, rather
//! than negotiating SOCKS4a hostname-passing.

use std::net::{Ipv4Addr, TcpStream};

use super::wire::{read_exact, write_all};
use crate::error::{Error, ErrorKind, Result};
use crate::platform::resolve::resolve;

const REPLY_GRANTED: u8 = 0x5A;

pub fn handshake(
    stream: &mut TcpStream,
    target_host: &str,
    target_port: u16,
    deadline_us: u64,
) -> Result<()> {
    let ipv4 = resolve_ipv4(target_host)?;

    let mut req = Vec::with_capacity(9);
    req.push(0x04); // VN: SOCKS version 4
    req.push(0x01); // CD: CONNECT
    req.extend_from_slice(&target_port.to_be_bytes());
    req.extend_from_slice(&ipv4.octets());
    req.push(0x00); // USERID, empty, NUL-terminated

    write_all(stream, &req, deadline_us)?;

    let mut reply = [0u8; 8];
    read_exact(stream, &mut reply, deadline_us)?;

    if reply[1] != REPLY_GRANTED {
        return Err(Error::wrapped(
            ErrorKind::ProxyRefused,
            format!("SOCKS4 request rejected, code 0x{:02x}", reply[1]),
        ));
    }
    Ok(())
}

fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    let addrs = resolve(host, 0)?;
    addrs
        .iter()
        .find_map(|a| match a.sockaddr().ip() {
            std::net::IpAddr::V4(v4) => Some(v4),
            std::net::IpAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            Error::wrapped(
                ErrorKind::ProxyRefused,
                format!("{host} has no IPv4 address; SOCKS4a is not implemented"),
            )
        })
}
