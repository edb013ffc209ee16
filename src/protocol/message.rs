//! Session messages.
//!
//! Messages are sent from the bridge to the WebSocket client whenever the
//! IRC connection produces an event listed in the translation table.
//!
//! # Format
//!
//! ```json
//! { "event": "join", "data": { "channel": "#rust", "nick": "alice" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

use super::translation::ERROR_MESSAGE;

// ============================================================================
// SessionMessage
// ============================================================================

/// A message delivered to a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMessage {
    /// Message name, identical to the IRC event name it was translated from.
    pub event: &'static str,

    /// Message payload.
    pub data: Value,
}

impl SessionMessage {
    /// Creates a message with an object payload.
    #[inline]
    #[must_use]
    pub fn new(event: &'static str, data: Map<String, Value>) -> Self {
        Self {
            event,
            data: Value::Object(data),
        }
    }

    /// Creates an `irc_error` message carrying the backend's error detail.
    #[inline]
    #[must_use]
    pub fn irc_error(detail: Value) -> Self {
        Self {
            event: ERROR_MESSAGE,
            data: detail,
        }
    }

    /// Returns a payload field by name.
    #[inline]
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Serializes the message into a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
