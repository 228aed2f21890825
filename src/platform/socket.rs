//! Non-blocking socket primitives: create/connect, and a single-fd
//! `poll(2)`-based wait that stands in for the spec's `select`.
//!
//! Every suspension point in this crate (`conn::Transport::connect`,
//! `read`, `write`, the proxy handshakes) bottoms out in [`wait_readable`]
//! or [`wait_writable`], so this is the one place that talks to the raw
//! file descriptor.

use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{ErrorKind, Result, ResultWrappedExt};
use crate::platform::resolve::ResolvedAddr;

/// Outcome of waiting on a file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The fd became ready before the budget expired.
    Ready,
    /// The budget expired with no readiness event.
    TimedOut,
}

/// Creates a non-blocking TCP socket suitable for connecting to `addr`.
pub fn new_nonblocking_tcp(addr: &ResolvedAddr) -> Result<Socket> {
    let sock = Socket::new(addr.domain(), Type::STREAM, Some(Protocol::TCP)).wrapped(ErrorKind::Io)?;
    sock.set_nonblocking(true).wrapped(ErrorKind::Io)?;
    Ok(sock)
}

/// Begins a non-blocking connect. Per `connect(2)`, `EINPROGRESS` is the
/// expected outcome and is not an error here; the caller waits for
/// writability next.
pub fn begin_connect(sock: &Socket, addr: &ResolvedAddr) -> Result<()> {
    match sock.connect(&addr.sockaddr().into()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock || in_progress(&e) => Ok(()),
        Err(e) => Err(e).wrapped(ErrorKind::Io),
    }
}

fn in_progress(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINPROGRESS)
}

/// Waits up to `budget_us` microseconds for `fd` to become writable
/// (used after a non-blocking `connect`, and before proxy/TLS writes).
pub fn wait_writable(fd: &impl AsRawFd, budget_us: u64) -> Result<Readiness> {
    poll_for(fd, libc::POLLOUT, budget_us)
}

/// Waits up to `budget_us` microseconds for `fd` to become readable
/// (used by the line reader and the proxy handshakes).
pub fn wait_readable(fd: &impl AsRawFd, budget_us: u64) -> Result<Readiness> {
    poll_for(fd, libc::POLLIN, budget_us)
}

fn poll_for(fd: &impl AsRawFd, events: libc::c_short, budget_us: u64) -> Result<Readiness> {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events,
        revents: 0,
    };
    let timeout_ms = duration_to_poll_timeout_ms(Duration::from_micros(budget_us));

    loop {
        // SAFETY: `pfd` is a single, valid `pollfd` on the stack, and its
        // length (1) matches the `nfds` argument.
        let rc = unsafe { libc::poll(&mut pfd as *mut _, 1, timeout_ms) };
        if rc < 0 {
            let e = io::Error::last_os_error();
            if e.kind() == io::ErrorKind::Interrupted {
                // EINTR: retried per the spec's propagation policy (§7).
                continue;
            }
            return Err(e).wrapped(ErrorKind::Io);
        }
        if rc == 0 {
            return Ok(Readiness::TimedOut);
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 && pfd.revents & events == 0 {
            // The fd is "ready" only in the sense that something bad
            // happened; let the subsequent read/write surface the real
            // errno rather than guessing here.
            return Ok(Readiness::Ready);
        }
        return Ok(Readiness::Ready);
    }
}

/// `poll(2)`'s timeout is a signed millisecond count, with `-1` meaning
/// "block forever". The spec never asks for that (a zero remaining
/// budget is always a timeout, never "block forever"), but very large
/// budgets still have to saturate into `c_int` range rather than wrap.
fn duration_to_poll_timeout_ms(d: Duration) -> libc::c_int {
    let ms = d.as_millis();
    if ms > libc::c_int::MAX as u128 {
        libc::c_int::MAX
    } else {
        ms as libc::c_int
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn wait_readable_times_out_on_idle_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        client.set_nonblocking(true).unwrap();

        let r = wait_readable(&client, 1_000).unwrap();
        assert_eq!(r, Readiness::TimedOut);
    }

    #[test]
    fn wait_writable_is_immediately_ready_for_connected_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();

        let r = wait_writable(&client, 50_000).unwrap();
        assert_eq!(r, Readiness::Ready);
    }
}
