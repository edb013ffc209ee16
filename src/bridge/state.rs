//! Bridge lifecycle state and its shared view.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::identifiers::SessionId;

// ============================================================================
// BridgeState
// ============================================================================

/// Lifecycle state of a bridge.
///
/// ```text
/// Unbound ──connect──► Connecting ──registered──► Connected
///    ▲                     │                          │
///    └──── teardown done ──┴──── Disconnecting ◄──quit┘
///                                      │
///                           session gone ▼
///                                  Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BridgeState {
    /// Session attached, no IRC connection.
    #[default]
    Unbound,
    /// IRC connection opened, waiting for registration.
    Connecting,
    /// Registered with the IRC server.
    Connected,
    /// Quit requested, waiting for the server to close the connection.
    Disconnecting,
    /// Session gone and IRC connection torn down.
    Destroyed,
}

impl BridgeState {
    /// Returns the state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BridgeInfo
// ============================================================================

/// Point-in-time view of a bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeInfo {
    /// Lifecycle state.
    pub state: BridgeState,
    /// Current IRC nickname, once one has been requested.
    pub nickname: Option<String>,
}

// ============================================================================
// BridgeHandle
// ============================================================================

/// Read-only reference to a running bridge.
///
/// The bridge publishes its state through this handle; holders can observe
/// but never drive it.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    session: SessionId,
    info: Arc<RwLock<BridgeInfo>>,
}

impl BridgeHandle {
    pub(crate) fn new(session: SessionId) -> Self {
        Self {
            session,
            info: Arc::new(RwLock::new(BridgeInfo::default())),
        }
    }

    /// Returns the session this bridge owns.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns a snapshot of the bridge's state.
    #[must_use]
    pub fn info(&self) -> BridgeInfo {
        self.info.read().clone()
    }

    /// Returns the bridge's lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.info.read().state
    }

    pub(crate) fn set_state(&self, state: BridgeState) {
        self.info.write().state = state;
    }

    pub(crate) fn set_nickname(&self, nickname: Option<String>) {
        self.info.write().nickname = nickname;
    }
}

// ============================================================================
// Tests
// ============================================================================
