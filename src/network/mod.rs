//! Network Module
//!
//! Gateway transport and the mock gateway server.
//!
//! ## Architecture
//! - `TransportFactory` dials the push/feedback gateways (TCP, then TLS)
//! - `MockGateway`: single acceptor thread, worker thread pool for connections
//! - Workers read records through the protocol dispatcher
//! - `PushSession` writes from the caller's thread while a reader thread
//!   waits for the gateway's error response

mod credentials;
mod tls;
mod transport;
mod server;
mod connection;
mod session;

pub use credentials::Identity;
pub use tls::{client_config, server_config};
pub use transport::{GatewayReader, GatewayStream, GatewayWriter, TransportFactory, TLS_READ_POLL};
pub use server::{GatewayHandle, GatewayRules, MockGateway};
pub use connection::Connection;
pub use session::PushSession;
