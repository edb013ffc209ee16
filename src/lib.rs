//! ircbridge - IRC to WebSocket bridge.
//!
//! This library lets browser clients use IRC over a WebSocket. Every
//! WebSocket session drives its own IRC connection through a small JSON
//! command set and receives the IRC events it cares about as JSON messages.
//!
//! # Architecture
//!
//! The bridge sits between two connection-oriented protocols:
//!
//! - **Session side (WebSocket)**: JSON commands in, JSON messages out
//! - **IRC side (TCP/TLS)**: one client connection per registered session
//!
//! Key design principles:
//!
//! - Each [`Bridge`] owns one session and at most one IRC connection
//! - One event loop per bridge, so per-direction ordering is preserved
//! - Reconnects never overlap: the old connection closes before the new opens
//! - The [`Registry`] observes bridges but never drives them
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ircbridge::{BridgeServer, Config, Result, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::parse_from_env()?;
//!
//!     let server = BridgeServer::bind(
//!         config.listen_addr(),
//!         Arc::new(TcpConnector::new()),
//!         config.backend_settings(),
//!     )
//!     .await?;
//!
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Per-session bridge and the bridge [`Registry`] |
//! | [`config`] | Environment and CLI configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`irc`] | IRC client and backend capability traits |
//! | [`protocol`] | Session commands, messages and event translation |
//! | [`transport`] | WebSocket server and session pump |

// ============================================================================
// Modules
// ============================================================================

/// Per-session bridge state machine and registry.
pub mod bridge;

/// Startup configuration from CLI flags and environment.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// IRC client.
///
/// [`Connector`] and [`IrcHandle`] are the seams the bridge talks through;
/// [`TcpConnector`] is the real network implementation.
pub mod irc;

/// Session protocol message types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, BridgeHandle, BridgeInfo, BridgeState, QuitSignal, Registry, Session};

// Configuration
pub use config::Config;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;

// IRC types
pub use irc::{BackendSettings, Connector, IrcEvent, IrcHandle, TcpConnector};

// Protocol types
pub use protocol::{SessionCommand, SessionMessage};

// Transport types
pub use transport::{BridgeServer, SessionConnection};
