//! Push session
//!
//! Drives one gateway connection the way a sender should: notifications are
//! written from the caller's thread while a background reader waits for the
//! gateway's error response.
//!
//! ```text
//!   send() ──► GatewayWriter ────────────► gateway
//!                                              │
//!   events ◄── reader thread ◄── GatewayReader ◄┘
//! ```
//!
//! Once the gateway rejects a notification it closes the connection, so the
//! rejection is what callers see from then on, even if a later write failed
//! first on the closed socket.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::{GatewayReader, GatewayStream, GatewayWriter};
use crate::error::{ApnsError, Result};
use crate::protocol::{write_notification, CommandReader, ErrorResponse, Notification, Packet};

/// A push connection with its error channel being read in the background
pub struct PushSession {
    writer: GatewayWriter,
    events: Receiver<Result<ErrorResponse>>,
    reader: Option<JoinHandle<()>>,
    rejection: Option<ErrorResponse>,
    wait: Duration,
}

impl PushSession {
    /// Take over `stream` and start the error reader.
    ///
    /// `wait` bounds how long a failed write and [`PushSession::finish`]
    /// wait for an error response.
    pub fn start(stream: GatewayStream, wait: Duration) -> Result<Self> {
        // The reader waits for as long as the connection lives
        stream.set_read_timeout(None)?;
        let (writer, reader) = stream.split()?;
        let (sender, events) = channel::bounded(1);

        let reader = thread::Builder::new()
            .name("apns-error-reader".to_string())
            .spawn(move || read_errors(reader, sender))?;

        Ok(Self {
            writer,
            events,
            reader: Some(reader),
            rejection: None,
            wait,
        })
    }

    /// Write one notification.
    ///
    /// Fails with [`ApnsError::Rejected`] once the gateway has rejected an
    /// earlier notification. Nothing written after the rejected identifier
    /// was delivered.
    pub fn send(&mut self, notification: &Notification) -> Result<()> {
        self.poll_events()?;

        if let Err(write_error) = write_notification(&mut self.writer, notification) {
            tracing::debug!("Write failed ({}), checking for an error response", write_error);
            return match self.events.recv_timeout(self.wait) {
                Ok(event) => self.settle(event),
                Err(_) => Err(write_error),
            };
        }
        Ok(())
    }

    /// Wait for a late error response after the last write.
    ///
    /// Silence for the whole wait means every notification was accepted.
    pub fn finish(mut self) -> Result<()> {
        if let Some(response) = self.rejection {
            return Err(response.into_error());
        }
        match self.events.recv_timeout(self.wait) {
            Ok(event) => self.settle(event),
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(closed()),
        }
    }

    /// The error response received so far, if any
    pub fn rejection(&self) -> Option<ErrorResponse> {
        self.rejection
    }

    fn poll_events(&mut self) -> Result<()> {
        if let Some(response) = self.rejection {
            return Err(response.into_error());
        }
        match self.events.try_recv() {
            Ok(event) => self.settle(event),
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Disconnected) => Err(closed()),
        }
    }

    fn settle(&mut self, event: Result<ErrorResponse>) -> Result<()> {
        let response = event?;
        self.rejection = Some(response);
        Err(response.into_error())
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        if let Err(e) = self.writer.shutdown() {
            tracing::trace!("Shutdown of push connection failed: {}", e);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("Error reader thread panicked");
            }
        }
    }
}

/// Forward the first packet (or read failure) from the gateway
fn read_errors(reader: GatewayReader, events: Sender<Result<ErrorResponse>>) {
    let event = match CommandReader::new(reader).next() {
        Some(Ok(Packet::ErrorResponse(response))) => {
            tracing::debug!("Gateway error response: {}", response);
            Ok(response)
        }
        Some(Ok(Packet::Notification(n))) => Err(ApnsError::MalformedInput(format!(
            "gateway sent a notification: {}",
            n
        ))),
        Some(Err(e)) => Err(e),
        None => {
            tracing::debug!("Gateway closed the connection");
            return;
        }
    };

    if events.send(event).is_err() {
        tracing::trace!("Push session ended before the gateway reply was seen");
    }
}

fn closed() -> ApnsError {
    ApnsError::Transport("gateway closed the connection".to_string())
}
