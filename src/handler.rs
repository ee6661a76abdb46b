//! Handler Module
//!
//! Application hooks for the engines.
//!
//! - [`Handler`] receives every decoded packet together with a [`Responder`]
//!   bound to the connection it arrived on.
//! - [`Observer`] is told about recoverable failures (rejected frames, failed
//!   writes, dropped peers) that the engines otherwise only log.
//!
//! Both are registered explicitly; closures work for either.
//!
//! ```ignore
//! let server = Server::new(ServerConfig::default(), handler_fn(|request, reply| {
//!     let _ = reply.send(&Packet::empty(request.packet.service, Status::Acknowledge));
//! }));
//! ```

use std::io::Write;
use std::net::SocketAddr;

use crossbeam::channel::Sender;

use crate::error::{CorvidError, Result};
use crate::network::SessionId;
use crate::protocol::{write_packet, Packet, Service};

/// Where a packet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A session accepted by a server
    Session(SessionId),

    /// The server a client is connected to
    Server,
}

/// A decoded packet and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub origin: Origin,
    pub peer: SocketAddr,
    pub packet: Packet,
}

/// Writes replies back to the connection a request arrived on
pub struct Responder<'a> {
    origin: Origin,
    stream: &'a mut dyn Write,
}

impl<'a> Responder<'a> {
    pub(crate) fn new(origin: Origin, stream: &'a mut dyn Write) -> Self {
        Self { origin, stream }
    }

    /// Send a packet to the originating peer
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        write_packet(&mut self.stream, packet)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/// Receives decoded packets
pub trait Handler: Send {
    fn handle(&mut self, request: Request, responder: &mut Responder<'_>);
}

impl<F> Handler for F
where
    F: FnMut(Request, &mut Responder<'_>) + Send,
{
    fn handle(&mut self, request: Request, responder: &mut Responder<'_>) {
        self(request, responder)
    }
}

/// Forwards every request into a crossbeam channel
///
/// Replies are then sent through the engine (`Server::send` / `Client::send`).
/// A disconnected receiver drops requests.
pub struct ChannelHandler {
    sender: Sender<Request>,
}

impl ChannelHandler {
    pub fn new(sender: Sender<Request>) -> Self {
        Self { sender }
    }
}

impl Handler for ChannelHandler {
    fn handle(&mut self, request: Request, _responder: &mut Responder<'_>) {
        if self.sender.send(request).is_err() {
            tracing::debug!("Request channel closed, dropping request");
        }
    }
}

/// Fix a closure's argument types to the handler signature
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(Request, &mut Responder<'_>) + Send,
{
    f
}

// =============================================================================
// Observer
// =============================================================================

/// Recoverable events reported by the engines
#[derive(Debug)]
pub enum Event<'a> {
    /// A new session was accepted
    Accepted { session: SessionId, peer: SocketAddr },

    /// A peer went away; for servers the session has been reaped
    Disconnected { origin: Origin },

    /// A frame was rejected and a `Negative` reply was attempted
    Rejected {
        origin: Origin,
        service: Service,
        reason: &'a CorvidError,
    },

    /// A write to the peer failed
    SendFailed {
        origin: Origin,
        error: &'a CorvidError,
    },
}

/// Injected sink for [`Event`]s
pub trait Observer: Send {
    fn observe(&mut self, event: Event<'_>);
}

impl<F> Observer for F
where
    F: FnMut(Event<'_>) + Send,
{
    fn observe(&mut self, event: Event<'_>) {
        self(event)
    }
}

/// Fix a closure's argument types to the observer signature
pub fn observer_fn<F>(f: F) -> F
where
    F: FnMut(Event<'_>) + Send,
{
    f
}
