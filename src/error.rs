//! Error types for Corvid
//!
//! Provides a unified error type for codec, receive and engine operations.

use thiserror::Error;

use crate::network::SessionId;

/// Result type alias using CorvidError
pub type Result<T> = std::result::Result<T, CorvidError>;

/// Unified error type for Corvid operations
#[derive(Debug, Error)]
pub enum CorvidError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Frame Errors
    // -------------------------------------------------------------------------
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Incomplete payload: expected {expected} bytes, got {received}")]
    IncompletePayload { expected: usize, received: usize },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload too large: {0} bytes (max 65535)")]
    PayloadTooLarge(usize),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection closed by peer")]
    Disconnected,

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Unknown session {0}")]
    UnknownSession(SessionId),

    #[error("Session {0} is no longer connected")]
    SessionClosed(SessionId),

    #[error("Engine is not active")]
    Inactive,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
