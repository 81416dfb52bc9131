//! Configuration for apnslink
//!
//! Centralized configuration with sensible defaults, plus the fixed
//! gateway address table.

use std::fmt;
use std::str::FromStr;

use crate::error::ApnsError;

/// Production push gateway
pub const PRODUCTION_PUSH_ADDR: &str = "gateway.push.apple.com:2195";
/// Sandbox (development) push gateway
pub const SANDBOX_PUSH_ADDR: &str = "gateway.sandbox.push.apple.com:2195";
/// Production feedback service
pub const PRODUCTION_FEEDBACK_ADDR: &str = "feedback.push.apple.com:2196";
/// Sandbox (development) feedback service
pub const SANDBOX_FEEDBACK_ADDR: &str = "feedback.sandbox.push.apple.com:2196";

/// Gateway environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Sandbox => write!(f, "sandbox"),
        }
    }
}

impl FromStr for Environment {
    type Err = ApnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "sandbox" | "development" | "dev" => Ok(Environment::Sandbox),
            other => Err(ApnsError::Config(format!("unknown environment: {}", other))),
        }
    }
}

/// Which gateway service a connection talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Notification sending (and the asynchronous error channel)
    Push,
    /// Feedback service listing devices that no longer accept notifications
    Feedback,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Push => write!(f, "push"),
            Destination::Feedback => write!(f, "feedback"),
        }
    }
}

/// Immutable Environment x Destination -> host:port map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTable {
    production_push: String,
    sandbox_push: String,
    production_feedback: String,
    sandbox_feedback: String,
}

impl Default for GatewayTable {
    fn default() -> Self {
        Self {
            production_push: PRODUCTION_PUSH_ADDR.to_string(),
            sandbox_push: SANDBOX_PUSH_ADDR.to_string(),
            production_feedback: PRODUCTION_FEEDBACK_ADDR.to_string(),
            sandbox_feedback: SANDBOX_FEEDBACK_ADDR.to_string(),
        }
    }
}

impl GatewayTable {
    /// Build a table from explicit addresses
    pub fn new(
        production_push: impl Into<String>,
        sandbox_push: impl Into<String>,
        production_feedback: impl Into<String>,
        sandbox_feedback: impl Into<String>,
    ) -> Self {
        Self {
            production_push: production_push.into(),
            sandbox_push: sandbox_push.into(),
            production_feedback: production_feedback.into(),
            sandbox_feedback: sandbox_feedback.into(),
        }
    }

    /// Look up the host:port for an environment and destination
    pub fn resolve(&self, environment: Environment, destination: Destination) -> &str {
        match (destination, environment) {
            (Destination::Push, Environment::Production) => &self.production_push,
            (Destination::Push, Environment::Sandbox) => &self.sandbox_push,
            (Destination::Feedback, Environment::Production) => &self.production_feedback,
            (Destination::Feedback, Environment::Sandbox) => &self.sandbox_feedback,
        }
    }
}

/// Main configuration for a gateway client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Gateway Selection
    // -------------------------------------------------------------------------
    /// Production or sandbox gateways
    pub environment: Environment,

    /// Overrides the table address for push connections (mock servers, proxies)
    pub push_addr: Option<String>,

    /// Overrides the table address for feedback connections
    pub feedback_addr: Option<String>,

    // -------------------------------------------------------------------------
    // Socket Configuration
    // -------------------------------------------------------------------------
    /// Batch small writes with Nagle's algorithm.
    /// On favors throughput for bursts; off favors per-write latency.
    pub coalesce_writes: bool,

    /// TCP connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Read deadline (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Write deadline (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // TLS Configuration
    // -------------------------------------------------------------------------
    /// Verify the gateway's certificate against the webpki root store
    pub verify_peer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            push_addr: None,
            feedback_addr: None,
            coalesce_writes: true,
            connect_timeout_ms: 10_000,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            verify_peer: false,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The address override for a destination, if any
    pub fn address_override(&self, destination: Destination) -> Option<&str> {
        match destination {
            Destination::Push => self.push_addr.as_deref(),
            Destination::Feedback => self.feedback_addr.as_deref(),
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Select production or sandbox gateways
    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    /// Shorthand for `environment(Environment::Sandbox)` when `sandbox` is set
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.environment = if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        };
        self
    }

    /// Send push connections to a custom host:port
    pub fn push_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.push_addr = Some(addr.into());
        self
    }

    /// Send feedback connections to a custom host:port
    pub fn feedback_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.feedback_addr = Some(addr.into());
        self
    }

    /// Enable or disable Nagle's algorithm
    pub fn coalesce_writes(mut self, enabled: bool) -> Self {
        self.config.coalesce_writes = enabled;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Verify the gateway's certificate chain
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.config.verify_peer = verify;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
