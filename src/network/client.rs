//! TCP Client
//!
//! One outbound connection, drained by `poll()`.

use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::config::ClientConfig;
use crate::error::{CorvidError, Result};
use crate::handler::{Event, Handler, Observer, Origin, Request, Responder};
use crate::protocol::{encode, write_packet, Packet};
use super::receiver::{Drained, FrameReceiver, Received};
use super::server::notify;
use super::transport::is_disconnect;
use super::Activity;

/// Polling TCP client
pub struct Client {
    config: ClientConfig,
    stream: TcpStream,
    peer: SocketAddr,
    receiver: FrameReceiver,
    handler: Box<dyn Handler>,
    observer: Option<Box<dyn Observer>>,
    connected: bool,
}

impl Client {
    /// Connect to `config.host:config.port`
    ///
    /// There is no retry; a failed connect is returned as
    /// [`CorvidError::Connect`].
    pub fn connect<H: Handler + 'static>(config: ClientConfig, handler: H) -> Result<Self> {
        config.validate()?;

        let target = config.target();
        let stream = TcpStream::connect((config.host.as_str(), config.port)).map_err(|source| {
            CorvidError::Connect {
                addr: target.clone(),
                source,
            }
        })?;
        let peer = stream.peer_addr()?;

        if let Err(e) = stream.set_nodelay(config.nodelay) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }
        tracing::debug!("Connected to {} ({})", target, peer);

        Ok(Self {
            receiver: FrameReceiver::new(config.payload_timeout, config.poll_budget),
            config,
            stream,
            peer,
            handler: Box::new(handler),
            observer: None,
            connected: true,
        })
    }

    /// Attach an observer for recoverable failures
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Drain buffered frames, bounded by the poll budget
    ///
    /// With the ping responder enabled, a `{Ping, Query}` packet is answered
    /// with `{Ping, Acknowledge, [name]}` before the handler sees it.
    pub fn poll(&mut self) -> Activity {
        let mut activity = Activity::default();
        if !self.connected {
            return activity;
        }

        let Self {
            config,
            stream,
            peer,
            receiver,
            handler,
            observer,
            ..
        } = self;
        let origin = Origin::Server;
        let peer = *peer;

        let drained = receiver.drain(stream, |stream, received| match received {
            Received::Packet(packet) => {
                if config.ping && packet.is_ping_query() {
                    tracing::trace!("Answering ping from {} as {:?}", peer, config.name);
                    if let Err(error) = write_packet(stream, &Packet::ping_ack(&config.name)) {
                        tracing::warn!("Ping acknowledgment failed: {}", error);
                        notify(observer, Event::SendFailed { origin, error: &error });
                    }
                }

                activity.dispatched += 1;
                let mut responder = Responder::new(origin, stream);
                handler.handle(Request { origin, peer, packet }, &mut responder);
            }
            Received::Rejected {
                service,
                reason,
                reply,
            } => {
                activity.rejected += 1;
                notify(observer, Event::Rejected { origin, service, reason: &reason });
                if let Err(error) = reply {
                    notify(observer, Event::SendFailed { origin, error: &error });
                }
            }
            Received::Idle | Received::Closed => {}
        });

        if drained == Drained::Closed {
            tracing::debug!("Server {} closed the connection", peer);
            self.connected = false;
            activity.reaped = 1;
            notify(&mut self.observer, Event::Disconnected { origin });
        }

        activity
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a packet to the server
    ///
    /// Best effort: no retry. Failures are logged, reported to the observer
    /// and returned.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let bytes = encode(packet)?;
        self.send_raw(&bytes)
    }

    /// Send raw bytes; slice the buffer to send part of it
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(CorvidError::Disconnected);
        }

        let written = self
            .stream
            .write_all(bytes)
            .and_then(|()| self.stream.flush());

        if let Err(e) = written {
            if is_disconnect(&e) {
                self.connected = false;
            }
            let error = CorvidError::Io(e);
            tracing::warn!("Send to {} failed: {}", self.peer, error);
            notify(
                &mut self.observer,
                Event::SendFailed {
                    origin: Origin::Server,
                    error: &error,
                },
            );
            return Err(error);
        }

        Ok(())
    }

    /// Shut the connection down
    pub fn close(&mut self) {
        if self.connected {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.connected = false;
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    /// Toggle the ping auto-responder
    pub fn set_ping(&mut self, enabled: bool) {
        self.config.ping = enabled;
    }

    /// Change the name sent in ping acknowledgments
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.config.name = name.into();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
