//! Error types for apnslink
//!
//! Provides a unified error type for codec, transport and gateway operations.

use thiserror::Error;

use crate::protocol::ErrorResponse;

/// Result type alias using ApnsError
pub type Result<T> = std::result::Result<T, ApnsError>;

/// Unified error type for apnslink operations
#[derive(Debug, Error)]
pub enum ApnsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    /// A declared length disagrees with the bytes actually available
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Leading tag byte outside the known command set
    #[error("Unknown command: 0x{0:02x}")]
    UnknownCommand(u8),

    /// A notification cannot be represented on the wire
    #[error("Validation error: {0}")]
    Validation(String),

    // -------------------------------------------------------------------------
    // Gateway Errors
    // -------------------------------------------------------------------------
    /// The gateway answered with an error-response packet.
    /// The connection that produced it must not be written to again.
    #[error("Gateway rejected notification: {0}")]
    Rejected(ErrorResponse),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    // -------------------------------------------------------------------------
    // Payload / Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApnsError {
    /// Whether the connection that produced this error can still be used.
    ///
    /// Validation, payload and config errors are raised before any byte
    /// reaches the stream. Anything else leaves the connection unusable.
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(
            self,
            ApnsError::Validation(_) | ApnsError::Payload(_) | ApnsError::Config(_)
        )
    }
}
