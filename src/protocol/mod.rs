//! Protocol Module
//!
//! Defines the binary gateway protocol.
//!
//! ## Records
//! Every record starts with a one byte command:
//! - 0x00: Simple notification   - token_len (2) + token + payload_len (2) + payload
//! - 0x01: Enhanced notification - id (4) + expiry (4) + simple body
//! - 0x02: Framed notification   - frame_len (4) + TLV items
//! - 0x08: Error response        - status (1) + id (4)
//!
//! Notifications only travel to the gateway. The only record a client
//! expects to read is the error response, which arrives unsolicited and
//! ends the connection.
//!
//! ## Status Codes
//! - 0: no error, 1: processing error, 2: missing token, 3: missing topic,
//!   4: missing payload, 5: invalid token size, 6: invalid topic size,
//!   7: invalid payload size, 8: invalid token, 255: unknown / shutdown

mod command;
mod notification;
mod response;
mod codec;
mod feedback;

pub use command::{read_command, CommandReader, CommandType, Packet};
pub use notification::{
    EnhancedNotification, FramedNotification, Notification, Priority, SimpleNotification,
};
pub use response::{ErrorResponse, Status};
pub use codec::{
    decode_error_response, decode_notification, encode_error_response, encode_notification,
    framed_length, validate_frame, write_error_response, write_notification,
    ERROR_RESPONSE_SIZE, EXPIRY_ITEM, IDENTIFIER_ITEM, ITEM_HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_LEGACY_PAYLOAD_SIZE, PAYLOAD_ITEM, PRIORITY_ITEM, TOKEN_ITEM,
};
pub use feedback::{encode_feedback, read_feedback, FeedbackTuple};
