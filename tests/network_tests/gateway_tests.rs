//! Tests for the mock gateway
//!
//! These tests verify:
//! - Rejection rules map to the right status codes
//! - Accepted notifications are recorded silently
//! - A rejected notification ends the connection with an error response

#[path = "../common/mod.rs"]
mod common;

use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

use apnslink::network::GatewayRules;
use apnslink::protocol::{
    read_command, write_notification, FramedNotification, Notification, Packet, Status,
};

// =============================================================================
// Rule Tests
// =============================================================================

#[test]
fn test_rules_accept_well_formed() {
    let rules = GatewayRules::default().expected_token_len(32);
    let n = Notification::simple(vec![0; 32], b"{\"aps\":{}}".to_vec());
    assert_eq!(rules.check(&n), None);
}

#[test]
fn test_rules_missing_token() {
    let n = Notification::simple(Vec::new(), b"{}".to_vec());
    assert_eq!(GatewayRules::default().check(&n), Some(Status::MissingToken));
}

#[test]
fn test_rules_missing_payload() {
    let n = Notification::simple(vec![1], Vec::new());
    assert_eq!(GatewayRules::default().check(&n), Some(Status::MissingPayload));
}

#[test]
fn test_rules_payload_size() {
    let rules = GatewayRules::default();

    let legacy = Notification::enhanced(1, 0, vec![1], vec![b'x'; 300]);
    assert_eq!(rules.check(&legacy), Some(Status::InvalidPayloadSize));

    let framed: Notification = FramedNotification::new(vec![1], vec![b'x'; 300]).into();
    assert_eq!(rules.check(&framed), None);

    let framed: Notification = FramedNotification::new(vec![1], vec![b'x'; 3000]).into();
    assert_eq!(rules.check(&framed), Some(Status::InvalidPayloadSize));
}

#[test]
fn test_rules_token_size() {
    let rules = GatewayRules::default().expected_token_len(32);
    let n = Notification::simple(vec![1; 4], b"{}".to_vec());
    assert_eq!(rules.check(&n), Some(Status::InvalidTokenSize));
}

#[test]
fn test_rules_rejected_token() {
    let rules = GatewayRules::default().reject_token(vec![0xbe, 0xef]);
    let n = Notification::simple(vec![0xbe, 0xef], b"{}".to_vec());
    assert_eq!(rules.check(&n), Some(Status::InvalidToken));
}

// =============================================================================
// Server Tests
// =============================================================================

#[test]
fn test_gateway_records_accepted_notifications() {
    let gateway = common::spawn_gateway(GatewayRules::default());
    let mut stream = TcpStream::connect(gateway.local_addr()).unwrap();

    let sent: Vec<Notification> = (0..5u32)
        .map(|i| {
            FramedNotification::new(vec![i as u8; 32], b"{\"aps\":{}}".to_vec())
                .with_identifier(i)
                .into()
        })
        .collect();
    for n in &sent {
        write_notification(&mut stream, n).unwrap();
    }

    assert!(common::wait_until(Duration::from_secs(5), || gateway.received().len() == 5));
    assert_eq!(gateway.received(), sent);

    // Nothing comes back for accepted notifications
    stream
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();
    assert!(read_command(&mut stream).is_err());
}

#[test]
fn test_gateway_rejects_with_identifier() {
    let gateway = common::spawn_gateway(GatewayRules::default().expected_token_len(32));
    let mut stream = TcpStream::connect(gateway.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    write_notification(&mut stream, &Notification::enhanced(10, 0, vec![1; 32], b"{}".to_vec()))
        .unwrap();
    write_notification(&mut stream, &Notification::enhanced(11, 0, vec![1; 8], b"{}".to_vec()))
        .unwrap();

    let packet = read_command(&mut stream).unwrap().unwrap();
    assert_eq!(
        packet,
        Packet::ErrorResponse(apnslink::ErrorResponse::new(Status::InvalidTokenSize, 11))
    );
    assert!(read_command(&mut stream).unwrap().is_none());
}

#[test]
fn test_gateway_answers_garbage_with_processing_error() {
    let gateway = common::spawn_gateway(GatewayRules::default());
    let mut stream = TcpStream::connect(gateway.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    stream.write_all(&[77]).unwrap();

    let packet = read_command(&mut stream).unwrap().unwrap();
    assert_eq!(
        packet,
        Packet::ErrorResponse(apnslink::ErrorResponse::new(Status::ProcessingError, 0))
    );
    assert!(gateway.received().is_empty());
}

#[test]
fn test_gateway_shutdown() {
    let gateway = common::spawn_gateway(GatewayRules::default());
    let addr = gateway.local_addr();
    gateway.shutdown().unwrap();

    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err());
}
