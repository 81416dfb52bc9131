//! Notification payloads
//!
//! The wire codec treats payloads as opaque bytes. This module builds the
//! JSON dictionary the gateway expects and checks caller supplied payloads
//! before they are encoded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApnsError, Result};
use crate::protocol::Priority;

/// The reserved `aps` dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,

    /// Set to 1 to signal new content for background download
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
}

/// A complete payload: `aps` plus any custom top-level keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub aps: Aps,

    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Payload {
    /// Payload with just an alert text
    pub fn alert(text: impl Into<String>) -> Self {
        let mut payload = Payload::default();
        payload.aps.alert = Some(text.into());
        payload
    }

    pub fn with_badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    pub fn with_content_available(mut self) -> Self {
        self.aps.content_available = Some(1);
        self
    }

    /// Add a custom top-level key. `aps` is reserved.
    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Result<Self> {
        let key = key.into();
        if key == "aps" {
            return Err(ApnsError::Payload("\"aps\" is a reserved key".to_string()));
        }
        self.custom.insert(key, value);
        Ok(self)
    }

    /// True when the payload only asks for a background content fetch
    pub fn is_background_only(&self) -> bool {
        self.aps.content_available.is_some()
            && self.aps.alert.is_none()
            && self.aps.badge.is_none()
            && self.aps.sound.is_none()
    }

    /// Background-only pushes must use the power-conserving priority
    pub fn recommended_priority(&self) -> Priority {
        if self.is_background_only() {
            Priority::CONSERVE_POWER
        } else {
            Priority::IMMEDIATE
        }
    }

    /// Serialize to the compact JSON sent on the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ApnsError::Payload(e.to_string()))
    }
}

/// Check a raw payload: a JSON object with an `aps` object, at most
/// `max_size` bytes
pub fn validate_payload(bytes: &[u8], max_size: usize) -> Result<()> {
    if bytes.len() > max_size {
        return Err(ApnsError::Payload(format!(
            "payload too large: {} bytes (max {})",
            bytes.len(),
            max_size
        )));
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApnsError::Payload(format!("payload is not valid JSON: {}", e)))?;

    match value.get("aps") {
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(ApnsError::Payload("\"aps\" must be an object".to_string())),
        None if value.is_object() => Err(ApnsError::Payload("missing \"aps\" object".to_string())),
        None => Err(ApnsError::Payload("payload must be a JSON object".to_string())),
    }
}
