//! # apnslink
//!
//! Client for the binary push notification gateway protocol:
//! - Simple, enhanced and framed notification codecs
//! - Error-response decoding and command dispatch
//! - TLS transport authenticated by a provider certificate
//! - A mock gateway for testing senders
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐   encode    ┌───────────────────┐
//! │ Notification ├────────────►│                   │
//! └──────────────┘             │   GatewayStream   │◄──── TransportFactory
//! ┌──────────────┐  dispatch   │   (TCP / TLS)     │      (env, Nagle, TLS)
//! │ErrorResponse │◄────────────┤                   │
//! └──────────────┘             └───────────────────┘
//! ```
//!
//! The codecs and the transport are synchronous. The gateway answers only
//! failures, asynchronously, and then closes the connection, so a sender
//! runs one writer and one reader per stream: split a [`GatewayStream`]
//! into its halves, or let a [`PushSession`] run the reader thread.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod payload;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ApnsError, Result};
pub use config::{Config, Destination, Environment, GatewayTable};
pub use network::{GatewayStream, Identity, PushSession, TransportFactory};
pub use protocol::{ErrorResponse, Notification, Packet, Status};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of apnslink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
