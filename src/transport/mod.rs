//! WebSocket transport layer.
//!
//! This module carries bridge sessions over WebSocket: one accepted
//! connection is one session.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Browser client │         WebSocket            │  BridgeServer   │
//! │                 │◄────────────────────────────►│  → Connection   │
//! │                 │      JSON text frames        │  → Bridge       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `BridgeServer::bind` - Bind the listening socket
//! 2. `BridgeServer::run_until` - Accept and upgrade connections
//! 3. `SessionConnection::open` - Pump frames to and from the bridge
//! 4. WebSocket closes - Session is unregistered, bridge tears down IRC
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket session pump |
//! | `server` | WebSocket server binding and acceptance |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket session pump.
pub mod connection;

/// WebSocket server accepting bridge sessions.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::SessionConnection;
pub use server::BridgeServer;
