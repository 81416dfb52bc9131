//! Feedback service records
//!
//! The feedback service streams one tuple per device that stopped accepting
//! notifications, then closes the connection.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};

use super::codec::{read_array, read_leading_byte, read_vec};
use crate::error::{ApnsError, Result};

/// A device reported by the feedback service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackTuple {
    /// UNIX seconds at which the gateway determined the app was gone
    pub timestamp: u32,

    pub token: Vec<u8>,
}

/// Encode a tuple: time (4) + token_len (2) + token
pub fn encode_feedback(tuple: &FeedbackTuple) -> Result<Bytes> {
    if tuple.token.len() > u16::MAX as usize {
        return Err(ApnsError::Validation(format!(
            "token too large: {} bytes (max {})",
            tuple.token.len(),
            u16::MAX
        )));
    }

    let mut buf = BytesMut::with_capacity(4 + 2 + tuple.token.len());
    buf.put_u32(tuple.timestamp);
    buf.put_u16(tuple.token.len() as u16);
    buf.put_slice(&tuple.token);
    Ok(buf.freeze())
}

/// Read the next tuple, `Ok(None)` once the service closes the stream
pub fn read_feedback<R: Read>(reader: &mut R) -> Result<Option<FeedbackTuple>> {
    let Some(first) = read_leading_byte(reader)? else {
        return Ok(None);
    };

    let rest: [u8; 3] = read_array(reader, "feedback: timestamp")?;
    let timestamp = u32::from_be_bytes([first, rest[0], rest[1], rest[2]]);
    let token_len = u16::from_be_bytes(read_array(reader, "feedback: token length")?);
    let token = read_vec(reader, token_len as usize, "feedback: token")?;

    Ok(Some(FeedbackTuple { timestamp, token }))
}
