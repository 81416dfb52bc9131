//! Tests for the gateway transport
//!
//! These tests verify:
//! - Environment / destination resolution and overrides
//! - Plain TCP connections and Nagle configuration
//! - TLS handshakes against a local TLS gateway
//! - Transport failures are reported as such

#[path = "../common/mod.rs"]
mod common;

use std::io::Write;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use apnslink::network::GatewayRules;
use apnslink::protocol::{read_command, write_notification, Notification, Packet, Status};
use apnslink::{ApnsError, Config, Destination, Environment, GatewayTable, TransportFactory};

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_resolve_sandbox_push() {
    let config = Config::builder().environment(Environment::Sandbox).build();
    let factory = TransportFactory::new(config, None).unwrap();

    assert_eq!(
        factory.resolve(Destination::Push),
        "gateway.sandbox.push.apple.com:2195"
    );
    assert_eq!(
        factory.resolve(Destination::Feedback),
        "feedback.sandbox.push.apple.com:2196"
    );
}

#[test]
fn test_resolve_production_push() {
    let factory = TransportFactory::new(Config::default(), None).unwrap();

    assert_eq!(factory.resolve(Destination::Push), "gateway.push.apple.com:2195");
    assert_eq!(factory.resolve(Destination::Feedback), "feedback.push.apple.com:2196");
}

#[test]
fn test_resolve_override() {
    let config = Config::builder()
        .sandbox(true)
        .push_addr("localhost:8080")
        .build();
    let factory = TransportFactory::new(config, None).unwrap();

    assert_eq!(factory.resolve(Destination::Push), "localhost:8080");
    assert_eq!(
        factory.resolve(Destination::Feedback),
        "feedback.sandbox.push.apple.com:2196"
    );
}

#[test]
fn test_resolve_custom_table() {
    let table = GatewayTable::new("p:1", "s:2", "pf:3", "sf:4");
    let config = Config::builder().environment(Environment::Sandbox).build();
    let factory = TransportFactory::new(config, None).unwrap().with_table(table);

    assert_eq!(factory.resolve(Destination::Push), "s:2");
    assert_eq!(factory.resolve(Destination::Feedback), "sf:4");
}

// =============================================================================
// Plain TCP Tests
// =============================================================================

#[test]
fn test_plain_connection_coalesces_by_default() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let factory = common::factory_for(addr, None);
    let stream = factory.connect_push().unwrap();

    assert!(!stream.is_tls());
    assert!(!stream.nodelay().unwrap());
    assert_eq!(stream.peer_addr().unwrap(), addr);
}

#[test]
fn test_plain_connection_without_coalescing() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config::builder()
        .push_addr(addr.to_string())
        .coalesce_writes(false)
        .build();
    let factory = TransportFactory::new(config, None).unwrap();
    let stream = factory.connect(Destination::Push).unwrap();

    assert!(stream.nodelay().unwrap());
}

#[test]
fn test_connection_refused_is_transport_error() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let factory = common::factory_for(addr, None);
    let err = factory.connect_push().unwrap_err();
    assert!(matches!(err, ApnsError::Transport(_)));
}

#[test]
fn test_unresolvable_host_is_transport_error() {
    let factory = TransportFactory::new(Config::default(), None).unwrap();
    let err = factory.connect_addr("no-such-host.invalid:2195").unwrap_err();
    assert!(matches!(err, ApnsError::Transport(_)));
}

#[test]
fn test_address_without_port_is_transport_error() {
    let factory = TransportFactory::new(Config::default(), None).unwrap();
    let err = factory.connect_addr("localhost").unwrap_err();
    assert!(matches!(err, ApnsError::Transport(_)));
}

// =============================================================================
// TLS Tests
// =============================================================================

#[test]
fn test_tls_handshake_and_rejection() {
    let gateway = common::spawn_tls_gateway(GatewayRules::default().reject_token(vec![0xde, 0xad]));
    let identity = common::test_identity();
    let factory = common::factory_for(gateway.local_addr(), Some(&identity));

    let mut stream = factory.connect_push().unwrap();
    assert!(stream.is_tls());

    write_notification(
        &mut stream,
        &Notification::enhanced(1, 0, vec![0xbe, 0xef], b"{\"aps\":{}}".to_vec()),
    )
    .unwrap();
    write_notification(
        &mut stream,
        &Notification::enhanced(2, 0, vec![0xde, 0xad], b"{\"aps\":{}}".to_vec()),
    )
    .unwrap();

    match read_command(&mut stream).unwrap() {
        Some(Packet::ErrorResponse(response)) => {
            assert_eq!(response.status, Status::InvalidToken);
            assert_eq!(response.identifier, 2);
        }
        other => panic!("Expected error response, got {:?}", other),
    }

    // The gateway hangs up after an error response
    assert!(read_command(&mut stream).unwrap().is_none());
    assert_eq!(gateway.received().len(), 2);
}

#[test]
fn test_tls_handshake_failure_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let _ = sock.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n");
        thread::sleep(Duration::from_millis(100));
    });

    let identity = common::test_identity();
    let factory = common::factory_for(addr, Some(&identity));
    let err = factory.connect_push().unwrap_err();

    assert!(matches!(err, ApnsError::Transport(_)));
    server.join().unwrap();
}

#[test]
fn test_verified_connection_rejects_self_signed_gateway() {
    let gateway = common::spawn_tls_gateway(GatewayRules::default());
    let identity = common::test_identity();

    let config = Config::builder()
        .push_addr(gateway.local_addr().to_string())
        .verify_peer(true)
        .build();
    let factory = TransportFactory::new(config, Some(&identity)).unwrap();

    let err = factory.connect_push().unwrap_err();
    assert!(matches!(err, ApnsError::Transport(_)));
}

#[test]
fn test_read_deadline_unblocks_reader() {
    let gateway = common::spawn_gateway(GatewayRules::default());
    let factory = common::factory_for(gateway.local_addr(), None);
    let mut stream = factory.connect_push().unwrap();

    stream
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    let err = read_command(&mut stream).unwrap_err();
    assert!(matches!(
        err,
        ApnsError::Io(ref e)
            if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
    ));
}

// =============================================================================
// Split Tests
// =============================================================================

fn is_timeout(err: &ApnsError) -> bool {
    matches!(
        err,
        ApnsError::Io(ref e)
            if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
    )
}

#[test]
fn test_split_reader_keeps_read_deadline() {
    let gateway = common::spawn_gateway(GatewayRules::default());
    let factory = common::factory_for(gateway.local_addr(), None);
    let stream = factory.connect_push().unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();

    let (_writer, mut reader) = stream.split().unwrap();
    assert!(is_timeout(&read_command(&mut reader).unwrap_err()));
}

#[test]
fn test_split_tls_reader_keeps_read_deadline() {
    let gateway = common::spawn_tls_gateway(GatewayRules::default());
    let identity = common::test_identity();
    let factory = common::factory_for(gateway.local_addr(), Some(&identity));
    let stream = factory.connect_push().unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(100)))
        .unwrap();

    let (_writer, mut reader) = stream.split().unwrap();
    let started = std::time::Instant::now();
    assert!(is_timeout(&read_command(&mut reader).unwrap_err()));
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_split_tls_halves_across_threads() {
    let gateway = common::spawn_tls_gateway(GatewayRules::default().expected_token_len(32));
    let identity = common::test_identity();
    let factory = common::factory_for(gateway.local_addr(), Some(&identity));
    let (mut writer, mut reader) = factory.connect_push().unwrap().split().unwrap();

    let reader = thread::spawn(move || read_command(&mut reader));

    write_notification(&mut writer, &Notification::enhanced(9, 0, vec![1; 4], b"{}".to_vec()))
        .unwrap();

    let packet = reader.join().unwrap().unwrap().unwrap();
    assert_eq!(
        packet,
        Packet::ErrorResponse(apnslink::ErrorResponse::new(Status::InvalidTokenSize, 9))
    );
}
