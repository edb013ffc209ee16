//! IRC backend.
//!
//! The bridge talks to IRC through a small capability interface so it can
//! run against the real network client or against a scripted fake:
//!
//! - [`Connector`] opens a connection and hands back an [`IrcHandle`] plus
//!   the stream of [`IrcEvent`]s it produces.
//! - [`IrcHandle`] exposes the imperative actions (nick, join, part, say,
//!   disconnect). Actions never block; `disconnect` returns a completion
//!   signal that resolves once the server has closed the connection.
//!
//! # Events
//!
//! Events carry positional JSON arguments in the order the translation
//! table expects them, e.g. `join` is `[channel, nick, raw]`. Events may
//! carry more arguments than the table names.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Network client over TCP or TLS |
//! | `line` | IRC line parsing and formatting |
//! | `roster` | Channel membership tracking |
//! | `tls` | TLS client configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Network IRC client.
pub mod client;

/// IRC line parsing and formatting.
pub mod line;

/// Channel membership tracking.
pub mod roster;

/// TLS client configuration.
pub mod tls;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::protocol::translation::ERROR_EVENT;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{IrcClientHandle, TcpConnector};
pub use line::Message;

// ============================================================================
// Types
// ============================================================================

/// Stream of events produced by one IRC connection.
///
/// Ends when the connection task terminates.
pub type EventStream = mpsc::UnboundedReceiver<IrcEvent>;

/// Completion signal returned by [`IrcHandle::disconnect`].
///
/// Resolves with `Ok(())` when the server closed the connection, or with an
/// error if the connection task is already gone. Both mean "disconnected".
pub type Disconnected = oneshot::Receiver<()>;

// ============================================================================
// IrcEvent
// ============================================================================

/// A named event with positional arguments, emitted by an IRC connection.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcEvent {
    /// Event name, e.g. `join` or `error`.
    pub name: String,

    /// Positional callback arguments.
    pub args: Vec<Value>,
}

impl IrcEvent {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Creates an `error` event carrying a detail value.
    #[inline]
    #[must_use]
    pub fn error(detail: Value) -> Self {
        Self::new(ERROR_EVENT, vec![detail])
    }

    /// Returns a string argument by position.
    #[inline]
    #[must_use]
    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }

    /// Returns `true` if this is an `error` event.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.name == ERROR_EVENT
    }
}

// ============================================================================
// BackendSettings
// ============================================================================

/// Connection settings shared by every bridge in the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    /// IRC server hostname.
    pub host: String,
    /// IRC server port.
    pub port: u16,
    /// Channels joined after registration.
    pub channels: Vec<String>,
    /// Use TLS.
    pub tls: bool,
    /// Skip certificate verification (self-signed or expired certificates).
    pub insecure: bool,
    /// Username for `USER`.
    pub username: String,
    /// Real name for `USER`.
    pub realname: String,
}

impl BackendSettings {
    /// Creates plaintext settings with no channels.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            channels: Vec::new(),
            tls: false,
            insecure: false,
            username: "ircbridge".to_owned(),
            realname: "IRC WebSocket bridge".to_owned(),
        }
    }

    /// Sets the auto-join channels.
    #[inline]
    #[must_use]
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Enables TLS.
    #[inline]
    #[must_use]
    pub fn with_tls(mut self, insecure: bool) -> Self {
        self.tls = true;
        self.insecure = insecure;
        self
    }

    /// Returns `host:port`.
    #[inline]
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ============================================================================
// ConnectOptions
// ============================================================================

/// Everything needed to open one IRC connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Shared server settings.
    pub settings: Arc<BackendSettings>,
    /// Nickname to register with.
    pub nickname: String,
}

impl ConnectOptions {
    /// Creates connect options for a nickname.
    #[inline]
    #[must_use]
    pub fn new(settings: Arc<BackendSettings>, nickname: impl Into<String>) -> Self {
        Self {
            settings,
            nickname: nickname.into(),
        }
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Opens IRC connections.
pub trait Connector: Send + Sync + 'static {
    /// Handle type for connections opened by this connector.
    type Handle: IrcHandle;

    /// Starts connecting and returns immediately.
    ///
    /// Registration completes asynchronously and is announced by a
    /// `registered` event; failures are announced by `error` events.
    fn connect(&self, options: ConnectOptions) -> (Self::Handle, EventStream);
}

/// Imperative actions on one IRC connection.
pub trait IrcHandle: Send + Sync + 'static {
    /// Returns the nickname the server currently knows us by.
    fn nickname(&self) -> String;

    /// Requests a nickname change.
    fn change_nick(&self, nickname: &str);

    /// Joins a channel.
    fn join(&self, channel: &str);

    /// Leaves a channel.
    fn part(&self, channel: &str, message: &str);

    /// Sends a message to a channel or user.
    fn say(&self, target: &str, message: &str);

    /// Quits with a message and returns the disconnect completion signal.
    fn disconnect(&self, message: &str) -> Disconnected;
}

// ============================================================================
// Tests
// ============================================================================
