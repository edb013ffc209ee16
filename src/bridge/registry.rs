//! Registry of live bridges.
//!
//! A passive, ordered ledger: bridges are appended when their session
//! connects and removed by session identity when it disconnects. Nothing
//! routes through the registry and it has no authority over a bridge.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::identifiers::SessionId;

use super::state::{BridgeHandle, BridgeInfo};

// ============================================================================
// Registry
// ============================================================================

/// Ordered collection of live bridges, safe to share across tasks.
#[derive(Debug, Default)]
pub struct Registry {
    bridges: Mutex<Vec<BridgeHandle>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a bridge.
    ///
    /// Returns `false` without modifying the registry if a bridge for the
    /// same session is already registered.
    pub fn register(&self, bridge: BridgeHandle) -> bool {
        let mut bridges = self.bridges.lock();
        if bridges.iter().any(|b| b.session() == bridge.session()) {
            warn!(session = %bridge.session(), "Bridge already registered");
            return false;
        }

        debug!(session = %bridge.session(), live = bridges.len() + 1, "Bridge registered");
        bridges.push(bridge);
        true
    }

    /// Removes the bridge owning `session`.
    ///
    /// Returns `false` if no such bridge is registered; that is not an error.
    pub fn unregister(&self, session: &SessionId) -> bool {
        let mut bridges = self.bridges.lock();
        match bridges.iter().position(|b| b.session() == *session) {
            Some(index) => {
                bridges.remove(index);
                debug!(session = %session, live = bridges.len(), "Bridge unregistered");
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a bridge for `session` is registered.
    #[must_use]
    pub fn contains(&self, session: &SessionId) -> bool {
        self.bridges.lock().iter().any(|b| b.session() == *session)
    }

    /// Returns the number of registered bridges.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bridges.lock().len()
    }

    /// Returns `true` if no bridge is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bridges.lock().is_empty()
    }

    /// Returns every bridge's session and state, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SessionId, BridgeInfo)> {
        self.bridges
            .lock()
            .iter()
            .map(|b| (b.session(), b.info()))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
