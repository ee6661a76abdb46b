//! Network Module
//!
//! TCP server and client engines.
//!
//! ## Architecture
//! - Single-threaded, host-driven: nothing runs until `poll()` is called
//! - Each poll accepts one connection or drains buffered frames
//! - Decoded packets go to the registered handler

mod transport;
mod receiver;
mod session;
mod server;
mod client;

use std::fmt;

pub use transport::{is_disconnect, is_timeout, Readiness, Transport};
pub use receiver::{Drained, FrameReceiver, Received};
pub use session::Session;
pub use server::Server;
pub use client::Client;

/// Identifies one accepted connection; assigned in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What one `poll()` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    /// Session accepted this cycle (server only)
    pub accepted: Option<SessionId>,

    /// Packets handed to the handler
    pub dispatched: usize,

    /// Frames answered with `Negative`
    pub rejected: usize,

    /// Disconnected peers dropped this cycle
    pub reaped: usize,
}

impl Activity {
    /// True if the poll found nothing to do
    pub fn is_idle(&self) -> bool {
        *self == Activity::default()
    }
}
