//! Session protocol message types.
//!
//! This module defines the JSON frames exchanged between the bridge and
//! WebSocket clients, and the table mapping IRC events onto them.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `SessionCommand` | Client → Bridge | Drive the IRC connection |
//! | `SessionMessage` | Bridge → Client | Forwarded IRC event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Inbound command frames |
//! | `message` | Outbound message frames |
//! | `translation` | IRC event to session message table |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound session commands.
pub mod command;

/// Outbound session messages.
pub mod message;

/// IRC event translation table.
pub mod translation;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::SessionCommand;
pub use message::SessionMessage;
pub use translation::{Translation, TRANSLATIONS};
