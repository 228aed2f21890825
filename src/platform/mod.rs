//! Platform base: the monotonic clock, address resolution, and the raw
//! non-blocking socket primitives every other module builds on.
//!
//! Nothing above this module talks to `libc` or `socket2` directly; it
//! all goes through the small surface exposed here, which is where a
//! port to a platform without `poll(2)` would start.

pub mod clock;
pub mod resolve;
pub mod socket;

#[cfg(feature = "tls")]
pub mod tls;

pub use clock::now_micros;
pub use resolve::{resolve, ResolvedAddr};
pub use socket::{wait_readable, wait_writable, Readiness};
