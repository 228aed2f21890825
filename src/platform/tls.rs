//! Optional TLS wrapping of the transport, built on `rustls`.
//!
//! Follows the teacher crate's `bft::init`/`InitGuard` precedent for the
//! one piece of process-wide state this crate has: the crypto provider
//! backing `rustls` must be installed exactly once per process. Everything
//! else here is a per-connection, synchronous handshake over an
//! already-connected blocking socket.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Once};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::error::{Error, ErrorKind, Result, ResultWrappedExt};

static INIT: Once = Once::new();

/// Idempotently installs the default crypto provider used by `rustls`.
///
/// Safe to call from multiple sessions in the same process; only the
/// first call does any work, mirroring the teacher's `Flag`-guarded
/// `bft::init`.
pub fn ensure_crypto_provider_installed() {
    INIT.call_once(|| {
        // Only fails if a different provider has already been installed,
        // which `Once` already prevents from happening concurrently.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn client_config() -> Result<Arc<ClientConfig>> {
    ensure_crypto_provider_installed();

    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        log::warn!("failed to load a native root certificate: {err}");
    }
    for cert in native.certs {
        // Individual malformed roots are skipped rather than failing the
        // whole handshake; a handful of bad roots among hundreds is
        // common on misconfigured systems and shouldn't block connecting.
        let _ = roots.add(cert);
    }
    if roots.is_empty() {
        return Err(Error::simple(ErrorKind::TlsHandshake));
    }

    let cfg = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(cfg))
}

/// A TLS-wrapped blocking stream over an already-connected `TcpStream`.
///
/// Implements `Read`/`Write` directly, so `conn::io` can treat it exactly
/// like the plaintext socket once the handshake completes.
pub struct TlsStream {
    inner: StreamOwned<ClientConnection, TcpStream>,
}

impl TlsStream {
    /// Performs a blocking TLS client handshake with `server_name` over
    /// `sock`. `sock` must already be in blocking mode; non-blocking
    /// handshakes are not supported since the spec only requires the TLS
    /// step to run after connect/proxy have already bounded the budget
    /// via their own timeouts, and rustls's blocking `Stream` API is the
    /// simplest correct way to drive the handshake to completion.
    pub fn connect(sock: TcpStream, server_name: &str) -> Result<Self> {
        let cfg = client_config()?;
        let name = ServerName::try_from(server_name.to_owned())
            .map_err(|e| Error::wrapped(ErrorKind::TlsHandshake, e))?;
        let conn = ClientConnection::new(cfg, name).wrapped(ErrorKind::TlsHandshake)?;
        let mut stream = StreamOwned::new(conn, sock);
        // Force the handshake now rather than lazily on first read/write,
        // so `Transport::connect` can report a TLS failure at connect
        // time instead of surfacing it as a confusing read error later.
        stream.flush().wrapped(ErrorKind::TlsHandshake)?;
        Ok(TlsStream { inner: stream })
    }

    /// Flips the underlying socket's blocking mode. Used by `conn::Transport`
    /// to return to non-blocking steady-state I/O once the handshake (which
    /// runs on a blocking socket) has completed.
    pub fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.inner.get_ref().set_nonblocking(nonblocking)
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl AsRawFd for TlsStream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.get_ref().as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_crypto_provider_installed_is_idempotent() {
        ensure_crypto_provider_installed();
        ensure_crypto_provider_installed();
    }
}
