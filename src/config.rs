//! Configuration for Corvid
//!
//! Server and client settings with sensible defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{CorvidError, Result};

/// Default server port
pub const DEFAULT_PORT: u16 = 9001;

/// How long a frame may wait for its payload after the header is accepted
pub const DEFAULT_PAYLOAD_TIMEOUT: Duration = Duration::from_millis(2500);

/// How long one poll may spend processing a single connection
pub const DEFAULT_POLL_BUDGET: Duration = Duration::from_millis(500);

/// Server engine configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // -------------------------------------------------------------------------
    // Listener Configuration
    // -------------------------------------------------------------------------
    /// Local address to bind (any address by default)
    pub bind_addr: IpAddr,

    /// TCP listen port
    pub port: u16,

    /// Disable Nagle's algorithm on accepted connections
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Receive Configuration
    // -------------------------------------------------------------------------
    /// Deadline for a frame's payload, measured from header acceptance
    pub payload_timeout: Duration,

    /// Processing cap per connection per poll
    pub poll_budget: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            nodelay: true,
            payload_timeout: DEFAULT_PAYLOAD_TIMEOUT,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Socket address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Reject settings the receive loop cannot work with
    pub fn validate(&self) -> Result<()> {
        validate_timings(self.payload_timeout, self.poll_budget)
    }
}

/// Builder for ServerConfig
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the local bind address
    pub fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the listen port (0 picks an ephemeral port)
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable or disable TCP_NODELAY on accepted connections
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the payload deadline
    pub fn payload_timeout(mut self, timeout: Duration) -> Self {
        self.config.payload_timeout = timeout;
        self
    }

    /// Set the per-connection poll budget
    pub fn poll_budget(mut self, budget: Duration) -> Self {
        self.config.poll_budget = budget;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// Client engine configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Server hostname or IP address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Disable Nagle's algorithm on the connection
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Ping Auto-Responder
    // -------------------------------------------------------------------------
    /// Answer `Ping`/`Query` packets before they reach the handler
    pub ping: bool,

    /// Name carried in ping acknowledgments
    pub name: String,

    // -------------------------------------------------------------------------
    // Receive Configuration
    // -------------------------------------------------------------------------
    /// Deadline for a frame's payload, measured from header acceptance
    pub payload_timeout: Duration,

    /// Processing cap per poll
    pub poll_budget: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            nodelay: true,
            ping: false,
            name: String::new(),
            payload_timeout: DEFAULT_PAYLOAD_TIMEOUT,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// `host:port` string used for connecting and in error messages
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject settings the receive loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CorvidError::Config("host must not be empty".to_string()));
        }
        validate_timings(self.payload_timeout, self.poll_budget)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Enable or disable the ping auto-responder
    pub fn ping(mut self, enabled: bool) -> Self {
        self.config.ping = enabled;
        self
    }

    /// Set the name used in ping acknowledgments
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the payload deadline
    pub fn payload_timeout(mut self, timeout: Duration) -> Self {
        self.config.payload_timeout = timeout;
        self
    }

    /// Set the poll budget
    pub fn poll_budget(mut self, budget: Duration) -> Self {
        self.config.poll_budget = budget;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

fn validate_timings(payload_timeout: Duration, poll_budget: Duration) -> Result<()> {
    if payload_timeout.is_zero() {
        return Err(CorvidError::Config(
            "payload_timeout must be greater than zero".to_string(),
        ));
    }
    if poll_budget.is_zero() {
        return Err(CorvidError::Config(
            "poll_budget must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
