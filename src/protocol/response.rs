//! Error response definitions
//!
//! The gateway sends an error-response packet before it disconnects a
//! client whose notification it could not accept. Successful notifications
//! get no answer at all.

use std::fmt;

use crate::error::ApnsError;

/// Error response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    NoError = 0,
    ProcessingError = 1,
    MissingToken = 2,
    MissingTopic = 3,
    MissingPayload = 4,
    InvalidTokenSize = 5,
    InvalidTopicSize = 6,
    InvalidPayloadSize = 7,
    InvalidToken = 8,
    /// Also sent when the gateway shuts the connection down for maintenance
    Unknown = 255,
}

impl Status {
    /// Human readable description of the status
    pub fn description(&self) -> &'static str {
        match self {
            Status::NoError => "No errors encountered",
            Status::ProcessingError => "Processing error",
            Status::MissingToken => "Missing device token",
            Status::MissingTopic => "Missing topic",
            Status::MissingPayload => "Missing payload",
            Status::InvalidTokenSize => "Invalid token size",
            Status::InvalidTopicSize => "Invalid topic size",
            Status::InvalidPayloadSize => "Invalid payload size",
            Status::InvalidToken => "Invalid token",
            Status::Unknown => "None (unknown)",
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = ApnsError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let status = match byte {
            0 => Status::NoError,
            1 => Status::ProcessingError,
            2 => Status::MissingToken,
            3 => Status::MissingTopic,
            4 => Status::MissingPayload,
            5 => Status::InvalidTokenSize,
            6 => Status::InvalidTopicSize,
            7 => Status::InvalidPayloadSize,
            8 => Status::InvalidToken,
            255 => Status::Unknown,
            _ => {
                return Err(ApnsError::MalformedInput(format!(
                    "Unknown error response status: {}",
                    byte
                )))
            }
        };
        Ok(status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", *self as u8, self.description())
    }
}

/// An error-response packet received from the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Why the notification was rejected
    pub status: Status,

    /// Identifier of the offending notification. Everything written after
    /// it on the same connection was dropped and must be resent.
    pub identifier: u32,
}

impl ErrorResponse {
    pub fn new(status: Status, identifier: u32) -> Self {
        Self { status, identifier }
    }

    /// Turn this response into the corresponding error value
    pub fn into_error(self) -> ApnsError {
        ApnsError::Rejected(self)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={} identifier={}", self.status, self.identifier)
    }
}
