//! Session-to-IRC bridging.
//!
//! Each WebSocket session gets one [`Bridge`] that owns the session and at
//! most one IRC connection at a time. The [`Registry`] lists every live
//! bridge for the whole process.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Bridge state machine and event loop |
//! | `registry` | Process-wide list of live bridges |
//! | `state` | Lifecycle state and shared read-only handle |

// ============================================================================
// Submodules
// ============================================================================

/// Bridge state machine and event loop.
pub mod core;

/// Process-wide list of live bridges.
pub mod registry;

/// Lifecycle state and shared read-only handle.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Bridge, DEFAULT_FAREWELL, QuitSignal, RECONNECT_FAREWELL, Session};
pub use registry::Registry;
pub use state::{BridgeHandle, BridgeInfo, BridgeState};
