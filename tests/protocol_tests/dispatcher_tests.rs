//! Tests for command dispatch
//!
//! These tests verify:
//! - Classification by leading command byte
//! - End of stream handling
//! - Unknown commands consume nothing further
//! - CommandReader stops after the stream ends or fails

use std::io::{self, Cursor, Read};

use apnslink::protocol::{
    encode_error_response, encode_notification, read_command, CommandReader, CommandType,
    ErrorResponse, FramedNotification, Notification, Packet, Status,
};
use apnslink::ApnsError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Reader that fails with a fixed error kind after its data runs out
struct FailingReader {
    data: Cursor<Vec<u8>>,
    kind: io::ErrorKind,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(self.kind, "stream failed"));
        }
        Ok(n)
    }
}

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_empty_stream_is_end_of_stream() {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    assert!(read_command(&mut cursor).unwrap().is_none());
}

#[test]
fn test_error_response_packet() {
    let mut cursor = Cursor::new(vec![8u8, 8, 0, 0, 0, 1]);
    let packet = read_command(&mut cursor).unwrap().unwrap();

    assert_eq!(
        packet,
        Packet::ErrorResponse(ErrorResponse {
            status: Status::InvalidToken,
            identifier: 1,
        })
    );
    assert_eq!(packet.command_type(), CommandType::ErrorResponse);
    assert_eq!(cursor.position(), 6);
}

#[test]
fn test_unknown_command_consumes_one_byte() {
    let mut cursor = Cursor::new(vec![99u8, 8, 8, 0, 0, 0, 1]);
    let err = read_command(&mut cursor).unwrap_err();

    assert!(matches!(err, ApnsError::UnknownCommand(99)));
    assert_eq!(cursor.position(), 1);
}

#[test]
fn test_every_notification_tag() {
    let notifications = vec![
        Notification::simple(vec![1, 2], b"{}".to_vec()),
        Notification::enhanced(5, 0, vec![3, 4], b"{}".to_vec()),
        FramedNotification::new(vec![5, 6], b"{}".to_vec())
            .with_identifier(6)
            .into(),
    ];

    for n in notifications {
        let mut cursor = Cursor::new(encode_notification(&n).unwrap().to_vec());
        let packet = read_command(&mut cursor).unwrap().unwrap();
        assert_eq!(packet.command_type(), n.command_type());
        assert_eq!(packet, Packet::Notification(n));
    }
}

#[test]
fn test_truncated_error_response_is_malformed() {
    let mut cursor = Cursor::new(vec![8u8, 8, 0]);
    let err = read_command(&mut cursor).unwrap_err();
    assert!(matches!(err, ApnsError::MalformedInput(_)));
}

#[test]
fn test_unclean_close_at_record_boundary_is_end_of_stream() {
    let mut reader = FailingReader {
        data: Cursor::new(Vec::new()),
        kind: io::ErrorKind::UnexpectedEof,
    };
    assert!(read_command(&mut reader).unwrap().is_none());
}

#[test]
fn test_io_failure_is_propagated() {
    let mut reader = FailingReader {
        data: Cursor::new(Vec::new()),
        kind: io::ErrorKind::ConnectionReset,
    };
    let err = read_command(&mut reader).unwrap_err();
    assert!(matches!(err, ApnsError::Io(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
}

#[test]
fn test_packet_into_notification() {
    let rejected = Packet::ErrorResponse(ErrorResponse::new(Status::MissingPayload, 3));
    match rejected.into_notification() {
        Err(ApnsError::Rejected(response)) => {
            assert_eq!(response.status, Status::MissingPayload);
            assert_eq!(response.identifier, 3);
        }
        other => panic!("Expected rejection, got {:?}", other),
    }
}

// =============================================================================
// CommandReader Tests
// =============================================================================

#[test]
fn test_command_reader_iterates_until_end() {
    let mut bytes = encode_notification(&Notification::simple(vec![1], b"{}".to_vec()))
        .unwrap()
        .to_vec();
    bytes.extend_from_slice(&encode_error_response(&ErrorResponse::new(Status::Unknown, 77)));

    let mut reader = CommandReader::new(Cursor::new(bytes));
    let packets: Vec<Packet> = reader.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(packets.len(), 2);
    assert!(matches!(packets[0], Packet::Notification(_)));
    assert_eq!(
        packets[1],
        Packet::ErrorResponse(ErrorResponse::new(Status::Unknown, 77))
    );
    assert!(reader.is_done());
}

#[test]
fn test_command_reader_stops_after_error() {
    let mut reader = CommandReader::new(Cursor::new(vec![42u8, 8, 8, 0, 0, 0, 1]));

    assert!(matches!(reader.next(), Some(Err(ApnsError::UnknownCommand(42)))));
    assert!(reader.is_done());
    assert!(reader.next().is_none());
    assert!(reader.next_packet().unwrap().is_none());
    assert_eq!(reader.get_ref().position(), 1);
}
