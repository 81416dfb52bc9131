//! Notification definitions
//!
//! The three outbound notification layouts accepted by the gateway.

use std::fmt;

use super::CommandType;

/// Delivery priority carried by the framed format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Priority(pub u8);

impl Priority {
    /// Deliver immediately. Must accompany an alert, sound or badge.
    pub const IMMEDIATE: Priority = Priority(10);

    /// Deliver when convenient for the device's power budget.
    /// Required when the payload only carries content-available.
    pub const CONSERVE_POWER: Priority = Priority(5);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::IMMEDIATE
    }
}

/// Legacy format: token and payload only
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimpleNotification {
    pub token: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Enhanced format: adds a correlation identifier and an expiry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnhancedNotification {
    /// Opaque value echoed back in error responses
    pub identifier: u32,

    /// UNIX seconds; zero or negative asks the gateway not to store it
    pub expiry: i32,

    pub token: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Framed format: every field is an independent TLV item.
///
/// Token and payload are mandatory, the rest are only put on the wire
/// when set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FramedNotification {
    pub token: Vec<u8>,
    pub payload: Vec<u8>,
    pub identifier: Option<u32>,
    pub expiry: Option<i32>,
    pub priority: Option<Priority>,
}

impl FramedNotification {
    /// Create a framed notification with only the mandatory items
    pub fn new(token: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            token: token.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_expiry(mut self, expiry: i32) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A push notification in one of the three wire layouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Simple(SimpleNotification),
    Enhanced(EnhancedNotification),
    Framed(FramedNotification),
}

impl Notification {
    /// Build a legacy notification
    pub fn simple(token: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Notification::Simple(SimpleNotification {
            token: token.into(),
            payload: payload.into(),
        })
    }

    /// Build an enhanced notification
    pub fn enhanced(
        identifier: u32,
        expiry: i32,
        token: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Notification::Enhanced(EnhancedNotification {
            identifier,
            expiry,
            token: token.into(),
            payload: payload.into(),
        })
    }

    /// Get the command type (leading tag byte)
    pub fn command_type(&self) -> CommandType {
        match self {
            Notification::Simple(_) => CommandType::Simple,
            Notification::Enhanced(_) => CommandType::Enhanced,
            Notification::Framed(_) => CommandType::Framed,
        }
    }

    pub fn token(&self) -> &[u8] {
        match self {
            Notification::Simple(n) => &n.token,
            Notification::Enhanced(n) => &n.token,
            Notification::Framed(n) => &n.token,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Notification::Simple(n) => &n.payload,
            Notification::Enhanced(n) => &n.payload,
            Notification::Framed(n) => &n.payload,
        }
    }

    /// The correlation identifier, if this layout carries one
    pub fn identifier(&self) -> Option<u32> {
        match self {
            Notification::Simple(_) => None,
            Notification::Enhanced(n) => Some(n.identifier),
            Notification::Framed(n) => n.identifier,
        }
    }

    pub fn expiry(&self) -> Option<i32> {
        match self {
            Notification::Simple(_) => None,
            Notification::Enhanced(n) => Some(n.expiry),
            Notification::Framed(n) => n.expiry,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            Notification::Framed(n) => n.priority,
            _ => None,
        }
    }
}

impl From<SimpleNotification> for Notification {
    fn from(n: SimpleNotification) -> Self {
        Notification::Simple(n)
    }
}

impl From<EnhancedNotification> for Notification {
    fn from(n: EnhancedNotification) -> Self {
        Notification::Enhanced(n)
    }
}

impl From<FramedNotification> for Notification {
    fn from(n: FramedNotification) -> Self {
        Notification::Framed(n)
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?} notification] token={}", self.command_type(), hex::encode(self.token()))?;
        if let Some(identifier) = self.identifier() {
            write!(f, " identifier={}", identifier)?;
        }
        if let Some(expiry) = self.expiry() {
            write!(f, " expiry={}", expiry)?;
        }
        if let Some(priority) = self.priority() {
            write!(f, " priority={}", priority.0)?;
        }
        write!(f, " payload={}", String::from_utf8_lossy(self.payload()))
    }
}
