//! Shared helpers for the loopback integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use corvid::protocol::read_packet;
use corvid::{Packet, Server, ServerConfig, SessionId};

/// Generous upper bound for anything that should happen "soon"
pub const SOON: Duration = Duration::from_secs(5);

/// Loopback server config on an ephemeral port
pub fn loopback_config() -> ServerConfig {
    ServerConfig::builder()
        .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .port(0)
        .build()
}

/// Poll `step` until it returns true or `timeout` passes
pub fn poll_until<F: FnMut() -> bool>(timeout: Duration, mut step: F) -> bool {
    let start = Instant::now();
    loop {
        if step() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Connect a raw peer with a read timeout
pub fn raw_peer(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(SOON)).unwrap();
    stream
}

/// Poll the server until it accepts one session
pub fn accept_one(server: &mut Server) -> SessionId {
    let mut accepted = None;
    assert!(poll_until(SOON, || {
        accepted = server.poll().accepted;
        accepted.is_some()
    }));
    accepted.unwrap()
}

/// Read one packet from a raw peer
pub fn read_reply(stream: &mut TcpStream) -> Packet {
    read_packet(stream).unwrap()
}

/// Check that nothing arrives on `stream` within `wait`
pub fn assert_silent(stream: &mut TcpStream, wait: Duration) {
    use std::io::Read;

    stream.set_read_timeout(Some(wait)).unwrap();
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(n) => panic!("expected silence, read {} byte(s)", n),
        Err(e) => assert!(corvid::network::is_timeout(&e), "unexpected error: {}", e),
    }
    stream.set_read_timeout(Some(SOON)).unwrap();
}
