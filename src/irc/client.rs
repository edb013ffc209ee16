//! Network IRC client.
//!
//! [`TcpConnector`] opens one IRC connection per call and drives it from a
//! spawned tokio task. The task owns the socket; the returned
//! [`IrcClientHandle`] only queues commands to it.
//!
//! # Connection Task
//!
//! 1. Connect over TCP, optionally wrapping the stream in TLS
//! 2. Register with `NICK` and `USER`, retrying taken nicknames before `001`
//! 3. On `001`, emit `registered` and join the configured channels
//! 4. Translate server lines into events and queued commands into lines
//! 5. On disconnect, send `QUIT`, half-close, and wait for the server to
//!    close the connection before firing the completion signals

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

use super::line::Message;
use super::roster::Roster;
use super::{ConnectOptions, Connector, Disconnected, EventStream, IrcEvent, IrcHandle, tls};

// ============================================================================
// Constants
// ============================================================================

/// Longest server line accepted, IRCv3 tags included. Longer lines are
/// discarded up to their terminating newline.
const MAX_LINE_LEN: usize = 8191;

// ============================================================================
// ClientCommand
// ============================================================================

/// Commands queued from the handle to the connection task.
#[derive(Debug)]
enum ClientCommand {
    /// Write a line to the server.
    Send(Message),
    /// Quit and report completion once the server closes the connection.
    Disconnect {
        message: String,
        done: oneshot::Sender<()>,
    },
}

// ============================================================================
// TcpConnector
// ============================================================================

/// Opens IRC connections over TCP or TLS.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// Creates a new connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for TcpConnector {
    type Handle = IrcClientHandle;

    fn connect(&self, options: ConnectOptions) -> (IrcClientHandle, EventStream) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let nickname = Arc::new(RwLock::new(options.nickname.clone()));

        tokio::spawn(run_connection(
            options,
            command_rx,
            event_tx,
            Arc::clone(&nickname),
        ));

        let handle = IrcClientHandle {
            commands: command_tx,
            nickname,
        };
        (handle, event_rx)
    }
}

// ============================================================================
// IrcClientHandle
// ============================================================================

/// Handle to a connection opened by [`TcpConnector`].
#[derive(Debug, Clone)]
pub struct IrcClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    nickname: Arc<RwLock<String>>,
}

impl IrcClientHandle {
    fn send(&self, message: Message) {
        if self.commands.send(ClientCommand::Send(message)).is_err() {
            debug!("IRC connection task gone, dropping command");
        }
    }
}

impl IrcHandle for IrcClientHandle {
    fn nickname(&self) -> String {
        self.nickname.read().clone()
    }

    fn change_nick(&self, nickname: &str) {
        self.send(Message::new("NICK", vec![nickname.to_owned()]));
    }

    fn join(&self, channel: &str) {
        self.send(Message::new("JOIN", vec![channel.to_owned()]));
    }

    fn part(&self, channel: &str, message: &str) {
        self.send(Message::new(
            "PART",
            vec![channel.to_owned(), message.to_owned()],
        ));
    }

    fn say(&self, target: &str, message: &str) {
        for line in message.lines().filter(|l| !l.is_empty()) {
            self.send(Message::new(
                "PRIVMSG",
                vec![target.to_owned(), line.to_owned()],
            ));
        }
    }

    fn disconnect(&self, message: &str) -> Disconnected {
        let (done, signal) = oneshot::channel();
        let command = ClientCommand::Disconnect {
            message: message.to_owned(),
            done,
        };
        // A failed send drops `done`, which resolves the signal immediately.
        let _ = self.commands.send(command);
        signal
    }
}

// ============================================================================
// Connection Task
// ============================================================================

/// Entry point of the spawned connection task.
async fn run_connection(
    options: ConnectOptions,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<IrcEvent>,
    nickname: Arc<RwLock<String>>,
) {
    let settings = Arc::clone(&options.settings);
    let mut client = ClientState::new(options, events, nickname);

    info!(
        server = %settings.server_addr(),
        nick = %client.options.nickname,
        tls = settings.tls,
        "Connecting to IRC"
    );

    let result = match TcpStream::connect(settings.server_addr()).await {
        Ok(tcp) if settings.tls => match tls::connect(&settings.host, tcp, settings.insecure).await
        {
            Ok(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                client.run(BufReader::new(reader), writer, &mut commands).await
            }
            Err(e) => Err(e),
        },
        Ok(tcp) => {
            let _ = tcp.set_nodelay(true);
            let (reader, writer) = tokio::io::split(tcp);
            client.run(BufReader::new(reader), writer, &mut commands).await
        }
        Err(e) => Err(Error::connection(format!(
            "connect to {} failed: {e}",
            settings.server_addr()
        ))),
    };

    client.finish(result);

    // Disconnect requests that arrived after the socket closed.
    commands.close();
    while let Some(command) = commands.recv().await {
        if let ClientCommand::Disconnect { done, .. } = command {
            let _ = done.send(());
        }
    }
}

// ============================================================================
// ClientState
// ============================================================================

/// Protocol state of one connection.
struct ClientState {
    options: ConnectOptions,
    events: mpsc::UnboundedSender<IrcEvent>,
    nickname: Arc<RwLock<String>>,
    registered: bool,
    nick_retries: u32,
    motd: String,
    /// `332` topics waiting for their `333`, keyed by lowercased channel.
    topics: FxHashMap<String, String>,
    roster: Roster,
    quit_sent: bool,
    quitting: Vec<oneshot::Sender<()>>,
}

impl ClientState {
    fn new(
        options: ConnectOptions,
        events: mpsc::UnboundedSender<IrcEvent>,
        nickname: Arc<RwLock<String>>,
    ) -> Self {
        Self {
            options,
            events,
            nickname,
            registered: false,
            nick_retries: 0,
            motd: String::new(),
            topics: FxHashMap::default(),
            roster: Roster::new(),
            quit_sent: false,
            quitting: Vec::new(),
        }
    }

    fn me(&self) -> String {
        self.nickname.read().clone()
    }

    fn set_me(&self, nick: &str) {
        *self.nickname.write() = nick.to_owned();
    }

    fn emit(&self, name: &str, args: Vec<Value>) {
        let _ = self.events.send(IrcEvent::new(name, args));
    }

    /// Runs the read/write loop until the server closes the connection.
    ///
    /// A close that was not preceded by our `QUIT` is
    /// [`Error::ConnectionClosed`].
    async fn run<R, W>(
        &mut self,
        mut reader: R,
        mut writer: W,
        commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let settings = Arc::clone(&self.options.settings);
        write_line(
            &mut writer,
            &Message::new("NICK", vec![self.options.nickname.clone()]),
        )
        .await?;
        write_line(
            &mut writer,
            &Message::new(
                "USER",
                vec![
                    settings.username.clone(),
                    "8".to_owned(),
                    "*".to_owned(),
                    settings.realname.clone(),
                ],
            ),
        )
        .await?;

        let mut buf = Vec::with_capacity(512);
        let mut discarding = false;
        let mut commands_open = true;

        loop {
            // `buf` never holds a full MAX_LINE_LEN bytes here, so the limit is positive.
            let limit = (MAX_LINE_LEN - buf.len()) as u64;
            let mut limited = (&mut reader).take(limit);

            tokio::select! {
                read = limited.read_until(b'\n', &mut buf) => {
                    if read? == 0 {
                        if !self.quit_sent {
                            return Err(Error::ConnectionClosed);
                        }
                        debug!(nick = %self.me(), "IRC server closed the connection");
                        return Ok(());
                    }

                    if buf.last() != Some(&b'\n') {
                        if buf.len() >= MAX_LINE_LEN {
                            if !discarding {
                                warn!(limit = MAX_LINE_LEN, "Discarding oversized IRC line");
                            }
                            discarding = true;
                            buf.clear();
                        }
                        continue;
                    }

                    if discarding {
                        discarding = false;
                        buf.clear();
                        continue;
                    }

                    let line = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    trace!(line = %line.trim_end(), "<<");

                    let message = match Message::parse(&line) {
                        Ok(message) => message,
                        Err(e) if e.is_protocol_error() => {
                            debug!(error = %e, "Ignoring unparsable IRC line");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    for reply in self.handle_message(&message) {
                        if !self.quit_sent {
                            write_line(&mut writer, &reply).await?;
                        }
                    }
                }

                command = commands.recv(), if commands_open => {
                    match command {
                        Some(ClientCommand::Send(message)) if !self.quit_sent => {
                            write_line(&mut writer, &message).await?;
                        }
                        Some(ClientCommand::Send(message)) => {
                            debug!(command = %message.command, "Dropping command after QUIT");
                        }
                        Some(ClientCommand::Disconnect { message, done }) => {
                            self.quitting.push(done);
                            self.quit(&mut writer, message).await?;
                        }
                        None => {
                            commands_open = false;
                            self.quit(&mut writer, "Leaving.".to_owned()).await?;
                        }
                    }
                }
            }
        }
    }

    /// Sends `QUIT` once and half-closes the write side.
    async fn quit<W>(&mut self, writer: &mut W, message: String) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.quit_sent {
            return Ok(());
        }
        self.quit_sent = true;

        debug!(nick = %self.me(), %message, "Sending QUIT");
        write_line(writer, &Message::new("QUIT", vec![message])).await?;
        writer.shutdown().await?;
        Ok(())
    }

    /// Reports how the connection ended and fires pending completions.
    fn finish(&mut self, result: Result<()>) {
        let requested = self.quit_sent;

        match result {
            Ok(()) => {
                info!(nick = %self.me(), "Disconnected from IRC");
            }
            Err(e) if requested => {
                debug!(nick = %self.me(), error = %e, "Error while disconnecting");
            }
            Err(e) => {
                warn!(nick = %self.me(), error = %e, "IRC connection failed");
                self.emit(
                    "error",
                    vec![json!({ "command": "connection", "message": e.to_string() })],
                );
            }
        }

        for done in self.quitting.drain(..) {
            let _ = done.send(());
        }
    }

    /// Applies one server message, emitting events and returning replies.
    fn handle_message(&mut self, message: &Message) -> Vec<Message> {
        let raw = message.to_value();
        let from = message.nick().map_or(Value::Null, |n| json!(n));
        let me = self.me();
        let mut replies = Vec::new();

        match message.command.as_str() {
            "PING" => {
                replies.push(Message::new("PONG", message.params.clone()));
            }

            "001" => {
                if let Some(nick) = message.param(0) {
                    self.set_me(nick);
                }
                self.registered = true;
                info!(nick = %self.me(), "Registered with IRC server");
                self.emit("registered", vec![json!(self.me()), raw]);

                replies.extend(
                    self.options
                        .settings
                        .channels
                        .iter()
                        .map(|c| Message::new("JOIN", vec![c.clone()])),
                );
            }

            "375" => {
                self.motd = format!("{}\n", last_param(message));
            }

            "372" => {
                self.motd.push_str(last_param(message));
                self.motd.push('\n');
            }

            "376" => {
                self.motd.push_str(last_param(message));
                self.motd.push('\n');
                self.emit("motd", vec![json!(self.motd)]);
            }

            "422" => {
                self.emit("motd", vec![json!(last_param(message))]);
            }

            "332" => {
                if let (Some(channel), Some(topic)) = (message.param(1), message.param(2)) {
                    self.topics
                        .insert(channel.to_ascii_lowercase(), topic.to_owned());
                }
            }

            "333" => {
                if let Some(channel) = message.param(1) {
                    let topic = self
                        .topics
                        .remove(&channel.to_ascii_lowercase())
                        .unwrap_or_default();
                    let setter = message
                        .param(2)
                        .map(|s| s.split('!').next().unwrap_or(s))
                        .unwrap_or_default();
                    self.emit("topic", vec![json!(channel), json!(topic), json!(setter), raw]);
                }
            }

            "TOPIC" => {
                let channel = message.param(0).unwrap_or_default();
                let topic = message.param(1).unwrap_or_default();
                self.emit("topic", vec![json!(channel), json!(topic), from, raw]);
            }

            "353" => {
                if let (Some(channel), Some(names)) = (message.param(2), message.param(3)) {
                    self.roster.add_names(channel, names);
                }
            }

            "366" => {
                if let Some(channel) = message.param(1) {
                    let users = self.roster.finish_names(channel);
                    self.emit("names", vec![json!(channel), Value::Object(users)]);
                }
            }

            "JOIN" => {
                let channel = message.param(0).unwrap_or_default();
                if let Some(nick) = message.nick() {
                    self.roster.join(channel, nick);
                }
                self.emit("join", vec![json!(channel), from, raw]);
            }

            "PART" => {
                let channel = message.param(0).unwrap_or_default();
                if let Some(nick) = message.nick() {
                    self.roster.part(channel, nick, &me);
                }
                let reason = message.param(1).unwrap_or_default();
                self.emit("part", vec![json!(channel), from, json!(reason), raw]);
            }

            "KICK" => {
                let channel = message.param(0).unwrap_or_default();
                let kicked = message.param(1).unwrap_or_default();
                self.roster.part(channel, kicked, &me);
                let reason = message.param(2).unwrap_or_default();
                self.emit(
                    "kick",
                    vec![json!(channel), json!(kicked), from, json!(reason), raw],
                );
            }

            "QUIT" => {
                let channels = message
                    .nick()
                    .map(|n| self.roster.quit(n))
                    .unwrap_or_default();
                let reason = message.param(0).unwrap_or_default();
                self.emit("quit", vec![from, json!(reason), json!(channels), raw]);
            }

            "NICK" => {
                let new = message.param(0).unwrap_or_default();
                if let Some(old) = message.nick() {
                    if old.eq_ignore_ascii_case(&me) {
                        self.set_me(new);
                    }
                    let channels = self.roster.rename(old, new);
                    self.emit("nick", vec![from, json!(new), json!(channels), raw]);
                }
            }

            "PRIVMSG" => {
                let to = message.param(0).unwrap_or_default();
                let text = message.param(1).unwrap_or_default();
                if text.starts_with('\u{1}') {
                    self.emit("ctcp", vec![from, json!(to), json!(text), raw]);
                } else {
                    self.emit(
                        "message",
                        vec![from.clone(), json!(to), json!(text), raw.clone()],
                    );
                    if to.eq_ignore_ascii_case(&me) {
                        self.emit("pm", vec![from, json!(text), raw]);
                    }
                }
            }

            "NOTICE" => {
                let to = message.param(0).unwrap_or_default();
                let text = message.param(1).unwrap_or_default();
                self.emit("notice", vec![from, json!(to), json!(text), raw]);
            }

            "ERROR" => {
                warn!(nick = %me, reason = %last_param(message), "IRC server sent ERROR");
                self.emit("error", vec![raw]);
            }

            "433" if !self.registered => {
                self.nick_retries += 1;
                let retry = format!("{}{}", self.options.nickname, self.nick_retries);
                debug!(taken = %me, %retry, "Nickname in use, retrying");
                self.set_me(&retry);
                replies.push(Message::new("NICK", vec![retry]));
            }

            _ if message.is_error_reply() => {
                debug!(nick = %me, command = %message.command, "IRC error reply");
                self.emit("error", vec![raw]);
            }

            _ => {}
        }

        replies
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn last_param(message: &Message) -> &str {
    message.params.last().map_or("", String::as_str)
}

async fn write_line<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = format!("{message}\r\n");
    trace!(line = %line.trim_end(), ">>");
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
