//! Gateway-side connection handler
//!
//! Serves a single client of the mock gateway.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::GatewayRules;
use crate::error::{ApnsError, Result};
use crate::protocol::{read_command, write_error_response, ErrorResponse, Notification, Packet, Status};

/// Handles a single client connection
pub struct Connection<S> {
    /// Plain or TLS stream to the client
    stream: S,

    /// Rejection rules shared by all connections
    rules: Arc<GatewayRules>,

    /// Every notification the gateway has read, in arrival order
    received: Arc<Mutex<Vec<Notification>>>,

    /// Peer address for logging
    peer_addr: String,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(
        stream: S,
        peer_addr: String,
        rules: Arc<GatewayRules>,
        received: Arc<Mutex<Vec<Notification>>>,
    ) -> Self {
        Self {
            stream,
            rules,
            received,
            peer_addr,
        }
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads notifications until the client disconnects. The first
    /// notification that breaks a rule is answered with an error response,
    /// after which the connection is closed like the real gateway does.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let packet = match read_command(&mut self.stream) {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(ApnsError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(ApnsError::Io(ref e))
                    if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    // Windows reports TimedOut where unix reports WouldBlock
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    if let Err(reject_error) =
                        self.reject(ErrorResponse::new(Status::ProcessingError, 0))
                    {
                        tracing::trace!(
                            "Could not report error to {}: {}",
                            self.peer_addr,
                            reject_error
                        );
                    }
                    return Err(e);
                }
            };

            let notification = match packet {
                Packet::Notification(n) => n,
                Packet::ErrorResponse(response) => {
                    tracing::warn!(
                        "Client {} sent an error response ({}), closing",
                        self.peer_addr,
                        response
                    );
                    return self.reject(ErrorResponse::new(Status::ProcessingError, 0));
                }
            };

            tracing::trace!("Received from {}: {}", self.peer_addr, notification);
            let verdict = self.rules.check(&notification);
            let identifier = notification.identifier().unwrap_or(0);
            self.received.lock().push(notification);

            if let Some(status) = verdict {
                return self.reject(ErrorResponse::new(status, identifier));
            }
        }
    }

    fn reject(&mut self, response: ErrorResponse) -> Result<()> {
        tracing::debug!("Responding to {}: {}", self.peer_addr, response);
        write_error_response(&mut self.stream, &response)
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
