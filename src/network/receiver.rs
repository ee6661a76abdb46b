//! Frame Receiver
//!
//! Assembles one frame at a time from a [`Transport`].
//!
//! ```text
//! AwaitingHeader ──(7 bytes, valid)──▶ AwaitingPayload ──(Len bytes, valid)──▶ Dispatched
//!       │                                    │
//!       └──(bad header)──▶ Rejected ◀──(deadline / bad payload)
//! ```
//!
//! A rejected frame's bytes are discarded and the peer gets a
//! `{service, Negative, ["-1"]}` reply, including when the peer shuts down its
//! write side mid-frame. Nothing is carried over between calls; after such an
//! EOF the next call reports `Closed`.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use crate::config::{DEFAULT_PAYLOAD_TIMEOUT, DEFAULT_POLL_BUDGET};
use crate::error::{CorvidError, Result};
use crate::protocol::{
    decode_header, decode_packet, write_packet, Packet, Service, HEADER_SIZE, PREAMBLE,
};
use super::transport::{is_disconnect, is_timeout, Readiness, Transport};

/// Result of one receive attempt
#[derive(Debug)]
pub enum Received {
    /// A complete, valid packet
    Packet(Packet),

    /// The frame was rejected; `reply` is the outcome of sending the `Negative`
    Rejected {
        service: Service,
        reason: CorvidError,
        reply: Result<()>,
    },

    /// Fewer than a header's worth of bytes are buffered
    Idle,

    /// The peer closed the connection
    Closed,
}

/// Whether a drained transport is still usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drained {
    Open,
    Closed,
}

/// Per-connection receive state machine
#[derive(Debug, Clone, Copy)]
pub struct FrameReceiver {
    payload_timeout: Duration,
    poll_budget: Duration,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_TIMEOUT, DEFAULT_POLL_BUDGET)
    }
}

impl FrameReceiver {
    pub fn new(payload_timeout: Duration, poll_budget: Duration) -> Self {
        Self {
            payload_timeout,
            poll_budget,
        }
    }

    pub fn payload_timeout(&self) -> Duration {
        self.payload_timeout
    }

    pub fn poll_budget(&self) -> Duration {
        self.poll_budget
    }

    /// Run the state machine once
    ///
    /// Returns `Idle` without reading unless a full header is buffered. Once a
    /// header is read this blocks for up to the payload timeout.
    pub fn receive<T: Transport>(&self, transport: &mut T) -> Received {
        // AwaitingHeader
        match transport.readiness(HEADER_SIZE) {
            Ok(Readiness::Closed) => return Received::Closed,
            Ok(Readiness::Open(n)) if n < HEADER_SIZE => return Received::Idle,
            Ok(Readiness::Open(_)) => {}
            Err(e) => {
                tracing::debug!("Readiness probe failed: {}", e);
                return Received::Closed;
            }
        }

        let mut frame = vec![0u8; HEADER_SIZE];
        let header_deadline = Instant::now() + self.payload_timeout;
        match read_until(transport, &mut frame, header_deadline) {
            Ok(()) => {}
            Err(ReadFailure::Closed) => return Received::Closed,
            Err(ReadFailure::Short { received }) => {
                return self.reject(
                    transport,
                    Service::Default,
                    CorvidError::MalformedHeader(format!(
                        "Incomplete header: expected {} bytes, got {}",
                        HEADER_SIZE, received
                    )),
                );
            }
        }

        let header = match decode_header(&frame) {
            Ok(header) => header,
            Err(reason) => return self.reject(transport, echoed_service(&frame), reason),
        };
        tracing::trace!(
            "Header accepted: service={:?} status={:?} length={}",
            header.service,
            header.status,
            header.length
        );

        // AwaitingPayload
        let deadline = Instant::now() + self.payload_timeout;
        frame.resize(header.frame_len(), 0);
        match read_until(transport, &mut frame[HEADER_SIZE..], deadline) {
            Ok(()) => {}
            Err(ReadFailure::Closed) => return Received::Closed,
            Err(ReadFailure::Short { received }) => {
                return self.reject(
                    transport,
                    header.service,
                    CorvidError::IncompletePayload {
                        expected: header.frame_len(),
                        received: HEADER_SIZE + received,
                    },
                );
            }
        }

        match decode_packet(&frame) {
            Ok(packet) => Received::Packet(packet),
            Err(reason) => self.reject(transport, header.service, reason),
        }
    }

    /// Receive frames until the buffer runs dry or the poll budget is spent
    ///
    /// `on_received` sees every `Packet` and `Rejected` outcome along with the
    /// transport, so it can reply. The budget is checked between frames, so a
    /// single call can overrun it by up to one payload timeout.
    pub fn drain<T, F>(&self, transport: &mut T, mut on_received: F) -> Drained
    where
        T: Transport,
        F: FnMut(&mut T, Received),
    {
        let budget_end = Instant::now() + self.poll_budget;

        loop {
            match self.receive(transport) {
                Received::Idle => return Drained::Open,
                Received::Closed => return Drained::Closed,
                received => on_received(transport, received),
            }

            if Instant::now() >= budget_end {
                return Drained::Open;
            }
        }
    }

    fn reject<T: Transport>(&self, transport: &mut T, service: Service, reason: CorvidError) -> Received {
        tracing::warn!("Rejecting frame (service={:?}): {}", service, reason);

        let reply = write_packet(transport, &Packet::negative(service));
        if let Err(ref e) = reply {
            tracing::warn!("Failed to send negative reply: {}", e);
        }

        Received::Rejected {
            service,
            reason,
            reply,
        }
    }
}

enum ReadFailure {
    /// Reset or otherwise unusable; a reply would not get through
    Closed,

    /// Deadline passed or the peer shut down its write side
    Short { received: usize },
}

/// Service to echo in the reply to a rejected header
///
/// A known service byte behind an intact preamble is kept even when the
/// status byte is unknown.
fn echoed_service(header: &[u8]) -> Service {
    if header.len() < HEADER_SIZE || header[..3] != PREAMBLE {
        return Service::Default;
    }
    Service::try_from(header[3]).unwrap_or(Service::Default)
}

/// Fill `buf` completely or give up at `deadline`
///
/// EOF counts as a short read: a half-closed peer can still take the
/// `Negative` reply.
fn read_until<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
    deadline: Instant,
) -> std::result::Result<(), ReadFailure> {
    let mut filled = 0;

    let outcome = loop {
        if filled == buf.len() {
            break Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            break Err(ReadFailure::Short { received: filled });
        }
        if transport.set_read_deadline(Some(deadline - now)).is_err() {
            break Err(ReadFailure::Closed);
        }

        match transport.read(&mut buf[filled..]) {
            Ok(0) => break Err(ReadFailure::Short { received: filled }),
            Ok(n) => filled += n,
            Err(e) if is_timeout(&e) || e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                break Err(ReadFailure::Short { received: filled })
            }
            Err(e) if is_disconnect(&e) => break Err(ReadFailure::Closed),
            Err(e) => {
                tracing::debug!("Read failed: {}", e);
                break Err(ReadFailure::Closed);
            }
        }
    };

    let _ = transport.set_read_deadline(None);
    outcome
}
