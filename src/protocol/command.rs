//! Session commands.
//!
//! Commands are sent by the WebSocket client to drive its IRC connection.
//!
//! # Format
//!
//! ```json
//! { "command": "register", "nickname": "alice" }
//! { "command": "part", "channel": "#rust", "message": "bye" }
//! { "command": "quit" }
//! ```
//!
//! | Command | Payload | Effect |
//! |---------|---------|--------|
//! | `register` | `nickname` | connect (or reconnect) with that nickname |
//! | `nick` | `nickname` | ask the IRC server for a nickname change |
//! | `join` | `channel` | join a channel |
//! | `part` | `channel`, `message?` | leave a channel |
//! | `say` | `target`, `message` | send a message to a channel or user |
//! | `quit` | none | disconnect from IRC |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

use crate::error::{Error, Result};

// ============================================================================
// SessionCommand
// ============================================================================

/// A command received from a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Connect to IRC with the given nickname.
    Register {
        /// Requested nickname.
        nickname: String,
    },

    /// Request a nickname change.
    Nick {
        /// New nickname.
        nickname: String,
    },

    /// Join a channel.
    Join {
        /// Channel name.
        channel: String,
    },

    /// Leave a channel.
    Part {
        /// Channel name.
        channel: String,
        /// Part message, a default farewell is used when absent.
        #[serde(default)]
        message: Option<String>,
    },

    /// Send a message.
    Say {
        /// Channel or nickname.
        target: String,
        /// Message text.
        message: String,
    },

    /// Disconnect from IRC.
    Quit,
}

impl SessionCommand {
    /// Parses a command from a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] if the frame is not a known command
    /// with a well-formed payload.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::invalid_command(e.to_string()))
    }

    /// Returns the wire name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Nick { .. } => "nick",
            Self::Join { .. } => "join",
            Self::Part { .. } => "part",
            Self::Say { .. } => "say",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
