//! Transport abstraction
//!
//! The receive state machine needs two things beyond `Read + Write`: a way to
//! look at how many bytes are buffered without consuming them, and a read
//! deadline. `TcpStream` provides both.

use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::protocol::HEADER_SIZE;

/// What a non-consuming probe saw on the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Connection open with this many bytes buffered (capped at the probe size)
    Open(usize),

    /// Peer closed or reset the connection
    Closed,
}

/// A byte stream the frame receiver can drive
pub trait Transport: Read + Write {
    /// Report up to `limit` buffered bytes without consuming them; never blocks
    ///
    /// The `TcpStream` probe looks at most one header's worth of bytes.
    fn readiness(&mut self, limit: usize) -> io::Result<Readiness>;

    /// Bound subsequent reads; `None` blocks indefinitely
    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn readiness(&mut self, limit: usize) -> io::Result<Readiness> {
        let mut probe = [0u8; HEADER_SIZE];
        let probe = &mut probe[..limit.clamp(1, HEADER_SIZE)];

        self.set_nonblocking(true)?;
        let peeked = self.peek(probe);
        // Restore blocking mode whatever the peek did.
        let restored = self.set_nonblocking(false);

        let readiness = match peeked {
            Ok(0) => Readiness::Closed,
            Ok(n) => Readiness::Open(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Readiness::Open(0),
            Err(e) if is_disconnect(&e) => Readiness::Closed,
            Err(e) => {
                restored?;
                return Err(e);
            }
        };
        restored?;
        Ok(readiness)
    }

    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        // Zero is rejected by the socket layer.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// The peer is gone: reset, aborted, broken pipe or EOF mid-read
pub fn is_disconnect(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
    )
}

/// A read that ran out of time (Windows reports `TimedOut` instead of `WouldBlock`)
pub fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
