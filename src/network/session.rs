//! Server-side session record

use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Instant;

use super::SessionId;

/// One accepted connection and its liveness
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    accepted_at: Instant,
    pub(crate) stream: TcpStream,
    pub(crate) connected: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId, stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            id,
            peer,
            accepted_at: Instant::now(),
            stream,
            connected: true,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn close(&mut self) {
        // Already-closed sockets report NotConnected; nothing to do about it.
        let _ = self.stream.shutdown(Shutdown::Both);
        self.connected = false;
    }
}
