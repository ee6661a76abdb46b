//! # Corvid
//!
//! A small framed request/response protocol over TCP:
//! - Fixed 7-byte header with preamble, service, status and payload length
//! - Text fields separated by unit-separator bytes, closed by an end-marker
//! - Polling server that accepts many peers, and a single-connection client
//! - Malformed or stalled frames answered with a `Negative` reply
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Host loop: poll() repeatedly                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Server (sessions) / Client (one peer)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      FrameReceiver                           │
//! │      AwaitingHeader → AwaitingPayload → Packet | Rejected    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │      Codec      │                │     Handler     │
//!   │ (encode/decode) │                │  (application)  │
//!   └─────────────────┘                └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod handler;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CorvidError, Result};
pub use config::{ClientConfig, ServerConfig};
pub use handler::{handler_fn, observer_fn, ChannelHandler, Event, Handler, Observer, Origin, Request, Responder};
pub use network::{Activity, Client, Server, SessionId};
pub use protocol::{Packet, Service, Status};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Corvid
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
