//! The maybe-TLS byte stream `Transport` reads and writes once connected.
//!
//! A small closed enum rather than a `Box<dyn Read + Write + ...>`: the
//! set of transports is fixed at compile time (plain TCP, or TLS-over-TCP
//! when the `tls` feature is enabled), so static dispatch is both the
//! simpler and the faster choice.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};

#[cfg(feature = "tls")]
use crate::platform::tls::TlsStream;

pub enum Wire {
    Plain(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<TlsStream>),
}

impl Read for Wire {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Wire::Plain(s) => s.read(buf),
            #[cfg(feature = "tls")]
            Wire::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Wire::Plain(s) => s.write(buf),
            #[cfg(feature = "tls")]
            Wire::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Wire::Plain(s) => s.flush(),
            #[cfg(feature = "tls")]
            Wire::Tls(s) => s.flush(),
        }
    }
}

impl AsRawFd for Wire {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Wire::Plain(s) => s.as_raw_fd(),
            #[cfg(feature = "tls")]
            Wire::Tls(s) => s.as_raw_fd(),
        }
    }
}
