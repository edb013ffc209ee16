//! WebSocket server accepting bridge sessions.
//!
//! # Connection Flow
//!
//! 1. [`BridgeServer::bind`] binds the listening socket
//! 2. [`BridgeServer::run_until`] accepts TCP connections until shutdown
//! 3. Each connection is upgraded to WebSocket and given a fresh session ID
//! 4. A [`Bridge`] is bound to the session, registered and spawned
//! 5. When the WebSocket goes away the session is unregistered; the bridge
//!    finishes its IRC teardown on its own

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, Registry};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::irc::{BackendSettings, Connector};

use super::SessionConnection;

// ============================================================================
// BridgeServer
// ============================================================================

/// WebSocket server that binds one bridge to every session.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use ircbridge::irc::{BackendSettings, TcpConnector};
/// use ircbridge::transport::BridgeServer;
///
/// let settings = Arc::new(BackendSettings::new("irc.libera.chat", 6667));
/// let server = BridgeServer::bind(
///     "0.0.0.0:8080".parse()?,
///     Arc::new(TcpConnector::new()),
///     settings,
/// ).await?;
///
/// server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
/// ```
pub struct BridgeServer<C: Connector> {
    /// TCP listener for incoming sessions.
    listener: TcpListener,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    connector: Arc<C>,
    settings: Arc<BackendSettings>,
    registry: Arc<Registry>,
}

impl<C: Connector> BridgeServer<C> {
    /// Binds the server to `addr`.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(
        addr: SocketAddr,
        connector: Arc<C>,
        settings: Arc<BackendSettings>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, irc = %settings.server_addr(), "WebSocket server listening");

        Ok(Self {
            listener,
            local_addr,
            connector,
            settings,
            registry: Arc::new(Registry::new()),
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the registry of live bridges.
    #[must_use]
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accepts sessions until `shutdown` resolves.
    ///
    /// Failed accepts and failed WebSocket upgrades are logged and do not
    /// stop the server.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!(live = self.registry.len(), "Shutting down WebSocket server");
                    return;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "TCP connection accepted");

        let connector = Arc::clone(&self.connector);
        let settings = Arc::clone(&self.settings);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            match serve_session(stream, peer, connector, settings, registry).await {
                Ok(()) => {}
                Err(e) if e.is_connection_error() => {
                    debug!(%peer, error = %e, "Session dropped before upgrade");
                }
                Err(e) => warn!(%peer, error = %e, "Session failed"),
            }
        });
    }
}

/// Serves one WebSocket session for as long as it stays connected.
async fn serve_session<C: Connector>(
    stream: TcpStream,
    peer: SocketAddr,
    connector: Arc<C>,
    settings: Arc<BackendSettings>,
    registry: Arc<Registry>,
) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    let id = SessionId::generate();
    info!(session = %id, %peer, "Session connected");

    let (session, pump) = SessionConnection::open(id, ws_stream);
    let bridge = Bridge::new(session, connector, settings);
    registry.register(bridge.handle());
    tokio::spawn(bridge.run());

    if let Err(e) = pump.await {
        warn!(session = %id, error = %e, "Session pump failed");
    }

    registry.unregister(&id);
    info!(session = %id, live = registry.len(), "Session disconnected");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
