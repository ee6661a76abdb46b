//! TCP Server
//!
//! Accepts connections and drains their frames, one bounded step per `poll()`.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::{CorvidError, Result};
use crate::handler::{Event, Handler, Observer, Origin, Request, Responder};
use crate::protocol::{encode, Packet};
use super::receiver::{Drained, FrameReceiver, Received};
use super::transport::is_disconnect;
use super::{Activity, Session, SessionId};

/// Polling TCP server
///
/// The host calls [`Server::poll`] in a loop; no threads are spawned. All
/// session state is touched only from `poll`, `send` and `stop`, so the
/// server needs `&mut self` and no locking.
pub struct Server {
    config: ServerConfig,
    listener: Option<TcpListener>,
    sessions: Vec<Session>,
    next_id: u64,
    receiver: FrameReceiver,
    handler: Box<dyn Handler>,
    observer: Option<Box<dyn Observer>>,
    active: bool,
}

impl Server {
    /// Bind and start listening
    ///
    /// A bind failure is logged and yields an inactive server whose `poll`
    /// does nothing. Use [`Server::try_new`] to get the error instead.
    pub fn new<H: Handler + 'static>(config: ServerConfig, handler: H) -> Self {
        let listener = match config.validate().and_then(|()| bind(&config)) {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::error!("Server inactive: {}", e);
                None
            }
        };
        Self::with_listener(config, listener, Box::new(handler))
    }

    /// Bind and start listening, failing on bind errors
    pub fn try_new<H: Handler + 'static>(config: ServerConfig, handler: H) -> Result<Self> {
        config.validate()?;
        let listener = bind(&config)?;
        Ok(Self::with_listener(config, Some(listener), Box::new(handler)))
    }

    fn with_listener(
        config: ServerConfig,
        listener: Option<TcpListener>,
        handler: Box<dyn Handler>,
    ) -> Self {
        let active = listener.is_some();
        if let Some(addr) = listener.as_ref().and_then(|l| l.local_addr().ok()) {
            tracing::info!("Listening on {}", addr);
        }

        Self {
            receiver: FrameReceiver::new(config.payload_timeout, config.poll_budget),
            config,
            listener,
            sessions: Vec::new(),
            next_id: 0,
            handler,
            observer: None,
            active,
        }
    }

    /// Attach an observer for recoverable failures
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    // =========================================================================
    // Polling
    // =========================================================================

    /// Run one bounded step
    ///
    /// 1. If a connection is pending, accept exactly one and return.
    /// 2. Otherwise drain every connected session in arrival order, then drop
    ///    every session found disconnected.
    ///
    /// Each session gets the poll budget (500 ms by default), checked between
    /// frames, and a frame may wait up to the payload timeout (2500 ms by
    /// default) for its payload. A single call can therefore block for about
    /// `sessions × (poll_budget + payload_timeout)` under hostile input.
    pub fn poll(&mut self) -> Activity {
        let mut activity = Activity::default();
        if !self.active {
            return activity;
        }

        if let Some(listener) = self.listener.as_ref() {
            match listener.accept() {
                Ok((stream, peer)) => {
                    activity.accepted = self.register(stream, peer);
                    return activity;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => tracing::warn!("Accept failed: {}", e),
            }
        }

        self.process_sessions(&mut activity);
        self.reap(&mut activity);
        activity
    }

    fn register(&mut self, stream: TcpStream, peer: SocketAddr) -> Option<SessionId> {
        // Accepted sockets may inherit the listener's non-blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            tracing::warn!("Dropping connection from {}: {}", peer, e);
            return None;
        }
        if let Err(e) = stream.set_nodelay(self.config.nodelay) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
        }

        self.next_id += 1;
        let id = SessionId(self.next_id);
        tracing::debug!("Session {} accepted from {}", id, peer);

        self.sessions.push(Session::new(id, stream, peer));
        notify(&mut self.observer, Event::Accepted { session: id, peer });
        Some(id)
    }

    fn process_sessions(&mut self, activity: &mut Activity) {
        let Self {
            sessions,
            receiver,
            handler,
            observer,
            ..
        } = self;

        for session in sessions.iter_mut().filter(|s| s.connected) {
            let origin = Origin::Session(session.id());
            let peer = session.peer_addr();

            let drained = receiver.drain(&mut session.stream, |stream, received| match received {
                Received::Packet(packet) => {
                    activity.dispatched += 1;
                    tracing::trace!("Dispatching {:?} from {:?}", packet, origin);
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
                session.connected = false;
            }
        }
    }

    /// Drop every disconnected session
    fn reap(&mut self, activity: &mut Activity) {
        let (live, stale): (Vec<Session>, Vec<Session>) = std::mem::take(&mut self.sessions)
            .into_iter()
            .partition(|s| s.connected);
        self.sessions = live;

        activity.reaped = stale.len();
        for session in stale {
            tracing::debug!("Session {} from {} disconnected", session.id(), session.peer_addr());
            notify(
                &mut self.observer,
                Event::Disconnected {
                    origin: Origin::Session(session.id()),
                },
            );
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Send a packet to one session
    ///
    /// Best effort: no retry. Failures are logged, reported to the observer
    /// and returned; a write that finds the peer gone marks the session
    /// disconnected.
    pub fn send(&mut self, session: SessionId, packet: &Packet) -> Result<()> {
        let bytes = encode(packet)?;
        self.send_raw(session, &bytes)
    }

    /// Send pre-encoded bytes to one session
    pub fn send_raw(&mut self, session: SessionId, bytes: &[u8]) -> Result<()> {
        if !self.active {
            return Err(CorvidError::Inactive);
        }

        let target = self
            .sessions
            .iter_mut()
            .find(|s| s.id() == session)
            .ok_or(CorvidError::UnknownSession(session))?;

        if !target.connected {
            return Err(CorvidError::SessionClosed(session));
        }

        let written = target
            .stream
            .write_all(bytes)
            .and_then(|()| target.stream.flush());

        if let Err(e) = written {
            if is_disconnect(&e) {
                target.connected = false;
            }
            let error = CorvidError::Io(e);
            tracing::warn!("Send to session {} failed: {}", session, error);
            notify(
                &mut self.observer,
                Event::SendFailed {
                    origin: Origin::Session(session),
                    error: &error,
                },
            );
            return Err(error);
        }

        Ok(())
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Close the listener and every session; calling again is a no-op
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }

        self.active = false;
        self.listener = None;
        for session in &mut self.sessions {
            session.close();
        }
        self.sessions.clear();

        tracing::info!("Server stopped");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Address the listener is bound to, if active
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Tracked sessions in arrival order
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).map_err(|source| CorvidError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

pub(super) fn notify(observer: &mut Option<Box<dyn Observer>>, event: Event<'_>) {
    if let Some(observer) = observer.as_mut() {
        observer.observe(event);
    }
}
