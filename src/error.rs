//! Error related business logic of `srsirc`.
//!
//! Contains the [`ErrorKind`] enum, as well as other useful extensions of
//! the `std::result::Result` type, to work with our very own [`Error`] type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// Extension of the standard library's `Result` type,
/// used to wrap its error in a `srsirc::error::Error`.
pub trait ResultWrappedExt {
    type T;

    fn wrapped_msg(self, kind: ErrorKind, msg: &str) -> Result<Self::T>;
    fn wrapped(self, kind: ErrorKind) -> Result<Self::T>;
}

/// Extension of the standard library's `Result` type.
///
/// Different from `ResultWrappedExt`, this trait is used in cases where we
/// want to drop the underlying error type in the `Result`, e.g. when the
/// error doesn't implement `Send`, or there simply isn't one to wrap
/// (a plain boolean failure from a C-style API).
pub trait ResultSimpleExt {
    type T;

    fn simple(self, kind: ErrorKind) -> Result<Self::T>;
    fn simple_msg(self, kind: ErrorKind, msg: &str) -> Result<Self::T>;
}

impl<T, E> ResultWrappedExt for result::Result<T, E>
where
    E: Into<Box<dyn error::Error + Send + Sync>>,
{
    type T = T;

    fn wrapped(self, kind: ErrorKind) -> Result<Self::T> {
        self.map_err(|e| Error::wrapped(kind, e))
    }

    fn wrapped_msg(self, kind: ErrorKind, msg: &str) -> Result<Self::T> {
        self.map_err(|e| Error::wrapped(kind, format!("{}: {}", msg, e.into())))
    }
}

impl<T, E> ResultSimpleExt for result::Result<T, E> {
    type T = T;

    fn simple(self, kind: ErrorKind) -> Result<Self::T> {
        self.map_err(|_| Error::simple(kind))
    }

    fn simple_msg(self, kind: ErrorKind, msg: &str) -> Result<Self::T> {
        self.map_err(|_| Error::wrapped(kind, msg.to_owned()))
    }
}

/// Extension for plain `Option`s, for the cases where a missing value
/// is itself the error (e.g. a resolver producing zero addresses).
pub trait OptionExt {
    type T;

    fn ok_or_kind(self, kind: ErrorKind) -> Result<Self::T>;
}

impl<T> OptionExt for Option<T> {
    type T = T;

    fn ok_or_kind(self, kind: ErrorKind) -> Result<Self::T> {
        self.ok_or_else(|| Error::simple(kind))
    }
}

/// Wrapper result type for `std::result::Result`.
pub type Result<T> = result::Result<T, Error>;

/// The error type used throughout this crate.
pub struct Error {
    inner: ErrorInner,
}

#[derive(Debug)]
enum ErrorInner {
    Simple(ErrorKind),
    Wrapped(ErrorKind, Box<dyn error::Error + Send + Sync>),
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl Error {
    /// Returns an error not wrapping another
    /// error implementation, with kind `ErrorKind`.
    pub fn simple(kind: ErrorKind) -> Self {
        let inner = ErrorInner::Simple(kind);
        Error { inner }
    }

    /// Wraps an arbitrary error in an `Error`,
    /// with kind of type `ErrorKind`.
    pub fn wrapped<E>(kind: ErrorKind, e: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        let inner = ErrorInner::Wrapped(kind, e.into());
        Error { inner }
    }

    /// Returns a copy of the `ErrorKind` of this `Error`.
    pub fn kind(&self) -> ErrorKind {
        match &self.inner {
            ErrorInner::Simple(k) => *k,
            ErrorInner::Wrapped(k, _) => *k,
        }
    }

    /// Swaps the `ErrorKind` of this `Error`, keeping any wrapped cause.
    pub fn swap_kind(self, k: ErrorKind) -> Self {
        let inner = match self.inner {
            ErrorInner::Simple(_) => ErrorInner::Simple(k),
            ErrorInner::Wrapped(_, e) => ErrorInner::Wrapped(k, e),
        };
        Error { inner }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ErrorInner::Simple(k) => write!(fmt, "{:?}", k),
            ErrorInner::Wrapped(k, e) => write!(fmt, "{:?}: {}", k, e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock {
            return Error::wrapped(ErrorKind::Timeout, e);
        }
        Error::wrapped(ErrorKind::Io, e)
    }
}

impl error::Error for Error {}

/// The taxonomy of errors this crate can produce. See `SPEC_FULL.md` §7 for
/// the rationale behind each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Address resolution produced no usable records.
    Resolve,
    /// Soft or hard connect budget exhausted without a socket.
    Timeout,
    /// A proxy handshake's protocol-level reply indicated failure.
    ProxyRefused,
    /// TLS handshake returned a non-success result.
    TlsHandshake,
    /// A malformed message: leading space, over-length line, empty command.
    Protocol,
    /// The peer performed an orderly close.
    Eof,
    /// Any other I/O failure from connect/read/write/poll.
    Io,
    /// The server rejected registration (464 bad password, or `ERROR`).
    LogonRejected,
    /// The server reported we are banned (465); see `Session::banmsg`.
    Banned,
    /// A setter/builder was given an invalid value.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Resolve => "address resolution failed",
            ErrorKind::Timeout => "operation timed out",
            ErrorKind::ProxyRefused => "proxy handshake refused",
            ErrorKind::TlsHandshake => "TLS handshake failed",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Eof => "connection closed by peer",
            ErrorKind::Io => "I/O error",
            ErrorKind::LogonRejected => "logon rejected by server",
            ErrorKind::Banned => "banned from server",
            ErrorKind::Config => "invalid configuration",
        };
        f.write_str(s)
    }
}
