//! SOCKS5 client handshake, no-auth only (the spec doesn't call for
//! username/password or GSSAPI negotiation).

use std::net::{IpAddr, TcpStream};

use super::wire::{read_exact, write_all};
use crate::error::{Error, ErrorKind, Result};

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

pub fn handshake(
    stream: &mut TcpStream,
    target_host: &str,
    target_port: u16,
    deadline_us: u64,
) -> Result<()> {
    // Greeting: version 5, one method offered, "no auth".
    write_all(stream, &[0x05, 0x01, 0x00], deadline_us)?;
    let mut greeting_reply = [0u8; 2];
    read_exact(stream, &mut greeting_reply, deadline_us)?;
    if greeting_reply[0] != 0x05 {
        return Err(Error::simple(ErrorKind::ProxyRefused));
    }
    if greeting_reply[1] != 0x00 {
        return Err(Error::wrapped(
            ErrorKind::ProxyRefused,
            format!("SOCKS5 server rejected all auth methods, selected 0x{:02x}", greeting_reply[1]),
        ));
    }

    let request = build_connect_request(target_host, target_port);
    write_all(stream, &request, deadline_us)?;

    // Fixed header: VER, REP, RSV, ATYP.
    let mut header = [0u8; 4];
    read_exact(stream, &mut header, deadline_us)?;
    if header[0] != 0x05 {
        return Err(Error::simple(ErrorKind::ProxyRefused));
    }
    if header[1] != 0x00 {
        return Err(Error::wrapped(
            ErrorKind::ProxyRefused,
            format!("SOCKS5 CONNECT refused, REP=0x{:02x}", header[1]),
        ));
    }

    // Consume and discard BND.ADDR + BND.PORT; their length depends on ATYP.
    let addr_len = match header[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len_byte = [0u8; 1];
            read_exact(stream, &mut len_byte, deadline_us)?;
            len_byte[0] as usize
        }
        other => {
            return Err(Error::wrapped(
                ErrorKind::ProxyRefused,
                format!("SOCKS5 reply has unknown ATYP 0x{other:02x}"),
            ))
        }
    };
    let mut rest = vec![0u8; addr_len + 2]; // + BND.PORT
    read_exact(stream, &mut rest, deadline_us)?;
    Ok(())
}

fn build_connect_request(target_host: &str, target_port: u16) -> Vec<u8> {
    let mut req = vec![0x05, 0x01, 0x00];
    match target_host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            req.push(ATYP_IPV4);
            req.extend_from_slice(&v4.octets());
        }
        Ok(IpAddr::V6(v6)) => {
            req.push(ATYP_IPV6);
            req.extend_from_slice(&v6.octets());
        }
        Err(_) => {
            req.push(ATYP_DOMAIN);
            req.push(target_host.len() as u8);
            req.extend_from_slice(target_host.as_bytes());
        }
    }
    req.extend_from_slice(&target_port.to_be_bytes());
    req
}
