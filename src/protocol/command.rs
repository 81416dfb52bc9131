//! Command dispatch
//!
//! Classifies an inbound stream by its leading command byte and hands the
//! rest of the record to the matching decoder.

use std::io::Read;

use super::codec::{decode_error_response, decode_notification, read_leading_byte};
use super::{ErrorResponse, Notification};
use crate::error::{ApnsError, Result};

/// Command types (leading tag byte of every record)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Simple = 0,
    Enhanced = 1,
    Framed = 2,
    ErrorResponse = 8,
}

impl TryFrom<u8> for CommandType {
    type Error = ApnsError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(CommandType::Simple),
            1 => Ok(CommandType::Enhanced),
            2 => Ok(CommandType::Framed),
            8 => Ok(CommandType::ErrorResponse),
            other => Err(ApnsError::UnknownCommand(other)),
        }
    }
}

/// A decoded inbound record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Notification(Notification),
    ErrorResponse(ErrorResponse),
}

impl Packet {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Packet::Notification(n) => n.command_type(),
            Packet::ErrorResponse(_) => CommandType::ErrorResponse,
        }
    }

    /// Convert an error response into [`ApnsError::Rejected`]
    pub fn into_notification(self) -> Result<Notification> {
        match self {
            Packet::Notification(n) => Ok(n),
            Packet::ErrorResponse(r) => Err(r.into_error()),
        }
    }
}

/// Read one complete record from a stream
///
/// Returns `Ok(None)` when the stream ends cleanly before the command byte.
/// An unknown command byte fails without consuming anything past it. Decoder
/// failures are passed through unchanged and leave the stream position
/// undefined, so the connection must be dropped.
pub fn read_command<R: Read>(reader: &mut R) -> Result<Option<Packet>> {
    let Some(tag) = read_leading_byte(reader)? else {
        return Ok(None);
    };

    let packet = match CommandType::try_from(tag)? {
        CommandType::ErrorResponse => Packet::ErrorResponse(decode_error_response(reader)?),
        CommandType::Simple | CommandType::Enhanced | CommandType::Framed => {
            Packet::Notification(decode_notification(tag, reader)?)
        }
    };

    Ok(Some(packet))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    AwaitingTag,
    Done,
}

/// Iterator over the records of one connection
///
/// Stops for good after the end of the stream or the first error.
pub struct CommandReader<R> {
    reader: R,
    state: DispatchState,
}

impl<R: Read> CommandReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: DispatchState::AwaitingTag,
        }
    }

    /// Whether the underlying stream has ended or failed
    pub fn is_done(&self) -> bool {
        self.state == DispatchState::Done
    }

    /// Read the next record, `Ok(None)` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.state == DispatchState::Done {
            return Ok(None);
        }

        let result = read_command(&mut self.reader);
        if !matches!(result, Ok(Some(_))) {
            self.state = DispatchState::Done;
        }
        result
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for CommandReader<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}
