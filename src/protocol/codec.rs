//! Protocol codec
//!
//! Encoding and decoding functions for the gateway wire formats.
//! All multi-byte integers are big-endian.
//!
//! ## Wire Format
//!
//! ### Simple notification (command 0)
//! ```text
//! ┌────────┬──────────────┬─────────┬────────────────┬─────────┐
//! │ Cmd(1) │ TokenLen (2) │  Token  │ PayloadLen (2) │ Payload │
//! └────────┴──────────────┴─────────┴────────────────┴─────────┘
//! ```
//!
//! ### Enhanced notification (command 1)
//! ```text
//! ┌────────┬────────┬────────────┬──────────────┬───────┬────────────────┬─────────┐
//! │ Cmd(1) │ Id (4) │ Expiry (4) │ TokenLen (2) │ Token │ PayloadLen (2) │ Payload │
//! └────────┴────────┴────────────┴──────────────┴───────┴────────────────┴─────────┘
//! ```
//!
//! ### Framed notification (command 2)
//! ```text
//! ┌────────┬─────────────┬──────────────────────────────────────┐
//! │ Cmd(1) │ FrameLen(4) │ Item | Item | ...                    │
//! └────────┴─────────────┴──────────────────────────────────────┘
//!
//! Item: ┌─────────┬─────────┬──────┐
//!       │ Tag (1) │ Len (2) │ Data │
//!       └─────────┴─────────┴──────┘
//! ```
//!
//! ### Error response (command 8)
//! ```text
//! ┌────────┬───────────┬────────┐
//! │ Cmd(1) │ Status(1) │ Id (4) │
//! └────────┴───────────┴────────┘
//! ```

use std::io::{Cursor, ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{
    CommandType, EnhancedNotification, ErrorResponse, FramedNotification, Notification, Priority,
    SimpleNotification, Status,
};
use crate::error::{ApnsError, Result};

/// Payload ceiling of the simple and enhanced formats
pub const MAX_LEGACY_PAYLOAD_SIZE: usize = 256;

/// Size of an error-response packet including its command byte
pub const ERROR_RESPONSE_SIZE: usize = 6;

/// Item header: tag (1) + data length (2)
pub const ITEM_HEADER_SIZE: usize = 3;

/// Framed item tags
pub const TOKEN_ITEM: u8 = 1;
pub const PAYLOAD_ITEM: u8 = 2;
pub const IDENTIFIER_ITEM: u8 = 3;
pub const EXPIRY_ITEM: u8 = 4;
pub const PRIORITY_ITEM: u8 = 5;

/// Largest frame a well-formed framed notification can declare: two
/// maximal variable items plus the three fixed-size ones.
pub const MAX_FRAME_SIZE: usize =
    2 * (ITEM_HEADER_SIZE + u16::MAX as usize) + 2 * (ITEM_HEADER_SIZE + 4) + ITEM_HEADER_SIZE + 1;

// =============================================================================
// Notification Encoding
// =============================================================================

/// Encode a notification to bytes
///
/// Fails when the token or payload does not fit its length field, or when a
/// simple/enhanced payload exceeds [`MAX_LEGACY_PAYLOAD_SIZE`].
pub fn encode_notification(notification: &Notification) -> Result<Bytes> {
    match notification {
        Notification::Simple(n) => encode_simple(n),
        Notification::Enhanced(n) => encode_enhanced(n),
        Notification::Framed(n) => encode_framed(n),
    }
}

fn encode_simple(n: &SimpleNotification) -> Result<Bytes> {
    let token_len = field_len(n.token.len(), u16::MAX as usize, "token")?;
    let payload_len = field_len(n.payload.len(), MAX_LEGACY_PAYLOAD_SIZE, "payload")?;

    let mut buf = BytesMut::with_capacity(1 + 2 + n.token.len() + 2 + n.payload.len());
    buf.put_u8(CommandType::Simple as u8);
    buf.put_u16(token_len);
    buf.put_slice(&n.token);
    buf.put_u16(payload_len);
    buf.put_slice(&n.payload);

    Ok(buf.freeze())
}

fn encode_enhanced(n: &EnhancedNotification) -> Result<Bytes> {
    let token_len = field_len(n.token.len(), u16::MAX as usize, "token")?;
    let payload_len = field_len(n.payload.len(), MAX_LEGACY_PAYLOAD_SIZE, "payload")?;

    let mut buf = BytesMut::with_capacity(1 + 4 + 4 + 2 + n.token.len() + 2 + n.payload.len());
    buf.put_u8(CommandType::Enhanced as u8);
    buf.put_u32(n.identifier);
    buf.put_i32(n.expiry);
    buf.put_u16(token_len);
    buf.put_slice(&n.token);
    buf.put_u16(payload_len);
    buf.put_slice(&n.payload);

    Ok(buf.freeze())
}

/// Items are always written token, payload, identifier, expiry, priority
/// so the same notification encodes to the same bytes.
fn encode_framed(n: &FramedNotification) -> Result<Bytes> {
    let token_len = field_len(n.token.len(), u16::MAX as usize, "token")?;
    let payload_len = field_len(n.payload.len(), u16::MAX as usize, "payload")?;

    let frame_len = framed_length(n);

    let mut buf = BytesMut::with_capacity(1 + 4 + frame_len);
    buf.put_u8(CommandType::Framed as u8);
    buf.put_u32(frame_len as u32);

    buf.put_u8(TOKEN_ITEM);
    buf.put_u16(token_len);
    buf.put_slice(&n.token);

    buf.put_u8(PAYLOAD_ITEM);
    buf.put_u16(payload_len);
    buf.put_slice(&n.payload);

    if let Some(identifier) = n.identifier {
        buf.put_u8(IDENTIFIER_ITEM);
        buf.put_u16(4);
        buf.put_u32(identifier);
    }
    if let Some(expiry) = n.expiry {
        buf.put_u8(EXPIRY_ITEM);
        buf.put_u16(4);
        buf.put_i32(expiry);
    }
    if let Some(priority) = n.priority {
        buf.put_u8(PRIORITY_ITEM);
        buf.put_u16(1);
        buf.put_u8(priority.0);
    }

    debug_assert_eq!(buf.len(), 1 + 4 + frame_len);
    Ok(buf.freeze())
}

/// Sum of tag + length + data over every item the notification includes
pub fn framed_length(n: &FramedNotification) -> usize {
    let mut len = ITEM_HEADER_SIZE + n.token.len() + ITEM_HEADER_SIZE + n.payload.len();
    if n.identifier.is_some() {
        len += ITEM_HEADER_SIZE + 4;
    }
    if n.expiry.is_some() {
        len += ITEM_HEADER_SIZE + 4;
    }
    if n.priority.is_some() {
        len += ITEM_HEADER_SIZE + 1;
    }
    len
}

fn field_len(len: usize, max: usize, field: &str) -> Result<u16> {
    if len > max {
        return Err(ApnsError::Validation(format!(
            "{} too large: {} bytes (max {})",
            field, len, max
        )));
    }
    Ok(len as u16)
}

// =============================================================================
// Notification Decoding
// =============================================================================

/// Decode a notification whose command byte has already been consumed
///
/// Reads exactly the remaining bytes of the layout selected by `command`.
pub fn decode_notification<R: Read>(command: u8, reader: &mut R) -> Result<Notification> {
    match CommandType::try_from(command)? {
        CommandType::Simple => decode_simple(reader),
        CommandType::Enhanced => decode_enhanced(reader),
        CommandType::Framed => decode_framed(reader),
        CommandType::ErrorResponse => Err(ApnsError::UnknownCommand(command)),
    }
}

fn decode_simple<R: Read>(reader: &mut R) -> Result<Notification> {
    let token_len = u16::from_be_bytes(read_array(reader, "simple: token length")?);
    let token = read_vec(reader, token_len as usize, "simple: token")?;
    let payload_len = u16::from_be_bytes(read_array(reader, "simple: payload length")?);
    let payload = read_vec(reader, payload_len as usize, "simple: payload")?;

    Ok(Notification::Simple(SimpleNotification { token, payload }))
}

fn decode_enhanced<R: Read>(reader: &mut R) -> Result<Notification> {
    let identifier = u32::from_be_bytes(read_array(reader, "enhanced: identifier")?);
    let expiry = i32::from_be_bytes(read_array(reader, "enhanced: expiry")?);
    let token_len = u16::from_be_bytes(read_array(reader, "enhanced: token length")?);
    let token = read_vec(reader, token_len as usize, "enhanced: token")?;
    let payload_len = u16::from_be_bytes(read_array(reader, "enhanced: payload length")?);
    let payload = read_vec(reader, payload_len as usize, "enhanced: payload")?;

    Ok(Notification::Enhanced(EnhancedNotification {
        identifier,
        expiry,
        token,
        payload,
    }))
}

fn decode_framed<R: Read>(reader: &mut R) -> Result<Notification> {
    let frame_len = u32::from_be_bytes(read_array(reader, "framed: frame length")?) as usize;

    if frame_len > MAX_FRAME_SIZE {
        return Err(ApnsError::MalformedInput(format!(
            "framed: frame too large: {} bytes (max {})",
            frame_len, MAX_FRAME_SIZE
        )));
    }

    let frame = read_vec(reader, frame_len, "framed: frame data")?;
    decode_frame_items(&frame).map(Notification::Framed)
}

/// Parse the items of a frame. Item order is not assumed.
fn decode_frame_items(mut frame: &[u8]) -> Result<FramedNotification> {
    let mut token = None;
    let mut payload = None;
    let mut identifier = None;
    let mut expiry = None;
    let mut priority = None;

    while frame.has_remaining() {
        if frame.remaining() < ITEM_HEADER_SIZE {
            return Err(ApnsError::MalformedInput(format!(
                "framed: truncated item header ({} bytes left in frame)",
                frame.remaining()
            )));
        }

        let item = frame.get_u8();
        let len = frame.get_u16() as usize;

        if frame.remaining() < len {
            return Err(ApnsError::MalformedInput(format!(
                "framed: item {} declares {} bytes, only {} left in frame",
                item,
                len,
                frame.remaining()
            )));
        }

        let (data, rest) = frame.split_at(len);
        frame = rest;

        match item {
            TOKEN_ITEM => set_once(&mut token, data.to_vec(), "token")?,
            PAYLOAD_ITEM => set_once(&mut payload, data.to_vec(), "payload")?,
            IDENTIFIER_ITEM => {
                let value = u32::from_be_bytes(fixed_item(data, "identifier")?);
                set_once(&mut identifier, value, "identifier")?
            }
            EXPIRY_ITEM => {
                let value = i32::from_be_bytes(fixed_item(data, "expiry")?);
                set_once(&mut expiry, value, "expiry")?
            }
            PRIORITY_ITEM => {
                let [value] = fixed_item::<1>(data, "priority")?;
                set_once(&mut priority, Priority(value), "priority")?
            }
            other => {
                return Err(ApnsError::MalformedInput(format!(
                    "framed: unknown item tag {}",
                    other
                )))
            }
        }
    }

    let token = token
        .ok_or_else(|| ApnsError::MalformedInput("framed: missing token item".to_string()))?;
    let payload = payload
        .ok_or_else(|| ApnsError::MalformedInput("framed: missing payload item".to_string()))?;

    Ok(FramedNotification {
        token,
        payload,
        identifier,
        expiry,
        priority,
    })
}

fn set_once<T>(slot: &mut Option<T>, value: T, item: &str) -> Result<()> {
    if slot.is_some() {
        return Err(ApnsError::MalformedInput(format!(
            "framed: duplicate {} item",
            item
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn fixed_item<const N: usize>(data: &[u8], item: &str) -> Result<[u8; N]> {
    data.try_into().map_err(|_| {
        ApnsError::MalformedInput(format!(
            "framed: {} item must be {} bytes, got {}",
            item,
            N,
            data.len()
        ))
    })
}

// =============================================================================
// Error Response Encoding/Decoding
// =============================================================================

/// Encode an error response to its fixed 6-byte form
pub fn encode_error_response(response: &ErrorResponse) -> [u8; ERROR_RESPONSE_SIZE] {
    let mut bytes = [0u8; ERROR_RESPONSE_SIZE];
    bytes[0] = CommandType::ErrorResponse as u8;
    bytes[1] = response.status as u8;
    bytes[2..].copy_from_slice(&response.identifier.to_be_bytes());
    bytes
}

/// Decode an error response whose command byte has already been consumed
///
/// Consumes exactly 5 bytes.
pub fn decode_error_response<R: Read>(reader: &mut R) -> Result<ErrorResponse> {
    let [status, id @ ..] = read_array::<5, _>(reader, "error response")?;
    Ok(ErrorResponse {
        status: Status::try_from(status)?,
        identifier: u32::from_be_bytes(id),
    })
}

// =============================================================================
// Validation
// =============================================================================

/// Check an already-encoded notification record
///
/// The declared length fields must account for every byte of `bytes`, no
/// more and no less, and legacy payloads must respect the size ceiling.
/// Returns the decoded notification.
pub fn validate_frame(bytes: &[u8]) -> Result<Notification> {
    let (&command, body) = bytes
        .split_first()
        .ok_or_else(|| ApnsError::Validation("empty notification record".to_string()))?;

    let mut cursor = Cursor::new(body);
    let notification = decode_notification(command, &mut cursor).map_err(|e| match e {
        ApnsError::MalformedInput(msg) => ApnsError::Validation(msg),
        other => other,
    })?;

    let consumed = cursor.position() as usize;
    if consumed != body.len() {
        return Err(ApnsError::Validation(format!(
            "declared lengths cover {} bytes but record carries {}",
            consumed,
            body.len()
        )));
    }

    if !matches!(notification, Notification::Framed(_))
        && notification.payload().len() > MAX_LEGACY_PAYLOAD_SIZE
    {
        return Err(ApnsError::Validation(format!(
            "payload too large: {} bytes (max {})",
            notification.payload().len(),
            MAX_LEGACY_PAYLOAD_SIZE
        )));
    }

    Ok(notification)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a notification to a stream
///
/// The whole record goes out in a single `write_all` so that notifications
/// from one writer never interleave.
pub fn write_notification<W: Write>(writer: &mut W, notification: &Notification) -> Result<()> {
    let bytes = encode_notification(notification)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Write an error response to a stream
pub fn write_error_response<W: Write>(writer: &mut W, response: &ErrorResponse) -> Result<()> {
    writer.write_all(&encode_error_response(response))?;
    writer.flush()?;
    Ok(())
}

/// Read one byte, or `None` when the stream has ended
///
/// A TLS peer that closes without close_notify surfaces as `UnexpectedEof`;
/// at a record boundary that is still the end of the stream.
pub(crate) fn read_leading_byte<R: Read>(reader: &mut R) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn read_array<const N: usize, R: Read>(reader: &mut R, what: &str) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    read_exact_or_malformed(reader, &mut buf, what)?;
    Ok(buf)
}

pub(crate) fn read_vec<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact_or_malformed(reader, &mut buf, what)?;
    Ok(buf)
}

/// A stream that ends before a declared length is satisfied is malformed
/// input, not an I/O failure.
fn read_exact_or_malformed<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    let len = buf.len();
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            ApnsError::MalformedInput(format!(
                "{}: stream ended before {} bytes were available",
                what, len
            ))
        } else {
            ApnsError::Io(e)
        }
    })
}
