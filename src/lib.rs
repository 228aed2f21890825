//! A lightweight, synchronous IRC client library.
//!
//! The pieces compose roughly bottom-up:
//!
//! - [`proto`] tokenizes one line of the wire grammar into a borrowed
//!   [`proto::Message`], with [`proto::OwnedMessage`] as the deep-copy
//!   escape hatch for callers that need a message to outlive the buffer
//!   it was framed from.
//! - [`conn`] is the transport: resolve, connect (with a dual soft/hard
//!   timeout budget across candidate addresses), optional proxy and TLS
//!   negotiation, and framed line I/O.
//! - [`isupport`] and [`tracker`] turn the raw message stream into typed
//!   005 parameters and an in-memory channel/user model.
//! - [`session`] ties all of the above into the logon state machine and
//!   a per-command handler table, the entry point most callers use.
//!
//! Nothing in this crate spawns a thread or drives an event loop; callers
//! own the read loop and call [`session::Session::read`] themselves.

pub mod casemap;
pub mod cimap;
pub mod conn;
pub mod error;
pub mod isupport;
pub mod platform;
pub mod proto;
pub mod session;
pub mod tracker;

pub use error::{Error, ErrorKind, Result};
pub use session::{Session, SessionConfig};
