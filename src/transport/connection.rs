//! WebSocket session connection and pump.
//!
//! This module adapts one accepted WebSocket into a [`Session`]: inbound
//! text frames become [`SessionCommand`]s and outbound
//! [`SessionMessage`]s become text frames.
//!
//! # Pump
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming text frames, parsed into commands
//! - Outgoing messages from the bridge, serialized as JSON
//!
//! Frames that do not parse are logged and dropped; the session stays up.
//! When the socket closes or fails the pump ends and drops its command
//! sender, which the bridge sees as session loss.

// ============================================================================
// Imports
// ============================================================================

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::bridge::Session;
use crate::identifiers::SessionId;
use crate::protocol::{SessionCommand, SessionMessage};

// ============================================================================
// SessionConnection
// ============================================================================

/// Entry point for turning a WebSocket into a bridge session.
pub struct SessionConnection;

impl SessionConnection {
    /// Spawns the pump for `ws_stream` and returns the session it feeds.
    ///
    /// The returned task finishes when the WebSocket is gone.
    pub fn open<S>(id: SessionId, ws_stream: WebSocketStream<S>) -> (Session, JoinHandle<()>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(Self::run_pump(id, ws_stream, command_tx, outbound_rx));
        let session = Session::new(id, command_rx, outbound_tx);

        (session, pump)
    }

    /// Moves frames between the WebSocket and the session channels.
    async fn run_pump<S>(
        id: SessionId,
        ws_stream: WebSocketStream<S>,
        commands: mpsc::UnboundedSender<SessionCommand>,
        mut outbound: mpsc::UnboundedReceiver<SessionMessage>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut bridge_open = true;

        loop {
            tokio::select! {
                // Incoming frames from the client
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_frame(id, &text, &commands);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(session = %id, "WebSocket closed by client");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(session = %id, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(session = %id, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Messages from the bridge
                message = outbound.recv(), if bridge_open => {
                    match message {
                        Some(message) => {
                            if let Err(e) = Self::send_message(id, &mut ws_write, &message).await {
                                warn!(session = %id, error = %e, "Failed to send message");
                                break;
                            }
                        }

                        None => {
                            debug!(session = %id, "Bridge stopped sending");
                            bridge_open = false;
                        }
                    }
                }
            }
        }

        let _ = ws_write.close().await;
        debug!(session = %id, "Session pump terminated");
    }

    /// Parses one inbound text frame and hands it to the bridge.
    fn handle_incoming_frame(
        id: SessionId,
        text: &str,
        commands: &mpsc::UnboundedSender<SessionCommand>,
    ) {
        match SessionCommand::parse(text) {
            Ok(command) => {
                trace!(session = %id, command = command.name(), "Command received");
                if commands.send(command).is_err() {
                    debug!(session = %id, "Bridge gone, command dropped");
                }
            }
            Err(e) => {
                warn!(session = %id, error = %e, text = %text, "Failed to parse incoming frame");
            }
        }
    }

    async fn send_message<S>(
        id: SessionId,
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        message: &SessionMessage,
    ) -> crate::error::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let json = message.to_json()?;
        ws_write.send(Message::Text(json.into())).await?;
        trace!(session = %id, event = message.event, "Message sent");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
