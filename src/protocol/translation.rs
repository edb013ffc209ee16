//! IRC event translation table.
//!
//! Declares which IRC events are forwarded to sessions and how their
//! positional callback arguments are named in the session payload. This
//! table is the wire contract exposed to WebSocket clients; changing it is
//! a breaking change for them.
//!
//! | Event | Fields |
//! |-------|--------|
//! | `registered` | none |
//! | `motd` | `motd` |
//! | `join` | `channel`, `nick` |
//! | `part` | `channel`, `nick` |
//! | `message` | `from`, `to`, `text` |
//! | `pm` | `from`, `text` |
//! | `nick` | `oldNick`, `newNick`, `channels` |
//! | `notice` | `from`, `to`, `text` |
//! | `topic` | `channel`, `topic`, `nick` |
//! | `names` | `channel`, `users` |
//!
//! The IRC `error` event is not in the table. The bridge forwards it
//! separately as [`ERROR_MESSAGE`].

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use super::SessionMessage;

// ============================================================================
// Constants
// ============================================================================

/// IRC event carrying a server or connection error.
pub const ERROR_EVENT: &str = "error";

/// Session message used to forward [`ERROR_EVENT`].
pub const ERROR_MESSAGE: &str = "irc_error";

/// IRC event fired once registration with the server completes.
pub const REGISTERED_EVENT: &str = "registered";

/// IRC event fired when any user, including us, changes nickname.
pub const NICK_EVENT: &str = "nick";

/// Every forwarded IRC event, in declaration order.
pub const TRANSLATIONS: &[Translation] = &[
    Translation::new(REGISTERED_EVENT, &[]),
    Translation::new("motd", &["motd"]),
    Translation::new("join", &["channel", "nick"]),
    Translation::new("part", &["channel", "nick"]),
    Translation::new("message", &["from", "to", "text"]),
    Translation::new("pm", &["from", "text"]),
    Translation::new(NICK_EVENT, &["oldNick", "newNick", "channels"]),
    Translation::new("notice", &["from", "to", "text"]),
    Translation::new("topic", &["channel", "topic", "nick"]),
    Translation::new("names", &["channel", "users"]),
];

// ============================================================================
// Translation
// ============================================================================

/// One row of the translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// IRC event name, also used as the session message name.
    pub event: &'static str,

    /// Payload field names, assigned to callback arguments by position.
    pub fields: &'static [&'static str],
}

impl Translation {
    const fn new(event: &'static str, fields: &'static [&'static str]) -> Self {
        Self { event, fields }
    }

    /// Builds the session message for one firing of this event.
    ///
    /// Arguments past the declared fields are dropped. Fields without a
    /// matching argument are left out of the payload.
    #[must_use]
    pub fn translate(&self, args: &[Value]) -> SessionMessage {
        let data: Map<String, Value> = self
            .fields
            .iter()
            .zip(args)
            .map(|(field, arg)| ((*field).to_owned(), arg.clone()))
            .collect();

        SessionMessage::new(self.event, data)
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Returns the table row for an IRC event, if it is forwarded.
#[must_use]
pub fn lookup(event: &str) -> Option<&'static Translation> {
    TRANSLATIONS.iter().find(|t| t.event == event)
}

/// Translates an IRC event into a session message.
///
/// Returns `None` for events absent from the table.
#[inline]
#[must_use]
pub fn translate(event: &str, args: &[Value]) -> Option<SessionMessage> {
    lookup(event).map(|t| t.translate(args))
}

// ============================================================================
// Tests
// ============================================================================
