//! Shared test fixtures

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use apnslink::network::{GatewayHandle, GatewayRules, MockGateway};
use apnslink::{Config, Identity, TransportFactory};

/// Self-signed certificate and key, PEM encoded
pub fn self_signed_pem() -> (String, String) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (certified.cert.pem(), certified.key_pair.serialize_pem())
}

pub fn test_identity() -> Identity {
    let (cert, key) = self_signed_pem();
    Identity::from_pem(format!("{}{}", cert, key).as_bytes()).unwrap()
}

pub fn spawn_gateway(rules: GatewayRules) -> GatewayHandle {
    MockGateway::bind("127.0.0.1:0", rules)
        .unwrap()
        .with_workers(2)
        .spawn()
        .unwrap()
}

pub fn spawn_tls_gateway(rules: GatewayRules) -> GatewayHandle {
    MockGateway::bind("127.0.0.1:0", rules)
        .unwrap()
        .with_identity(&test_identity())
        .unwrap()
        .with_workers(2)
        .spawn()
        .unwrap()
}

/// Factory whose push destination is the given address
pub fn factory_for(addr: SocketAddr, identity: Option<&Identity>) -> TransportFactory {
    let config = Config::builder()
        .push_addr(addr.to_string())
        .read_timeout_ms(5_000)
        .build();
    TransportFactory::new(config, identity).unwrap()
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
