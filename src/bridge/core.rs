//! Per-session bridge between one WebSocket session and one IRC connection.
//!
//! A [`Bridge`] is created as soon as a session connects and waits for a
//! `register` command before opening anything on IRC. From then on session
//! commands drive IRC actions and IRC events become session messages.
//!
//! # Event Loop
//!
//! [`Bridge::run`] is a single cooperative loop over:
//!
//! - Session commands, in the order the transport delivers them
//! - IRC events, in the order the connection emits them
//! - The teardown completion signal of the current connection
//!
//! Every handler runs to completion before the next input is taken, so the
//! bridge needs no locking of its own.
//!
//! # Reconnecting
//!
//! `register` on a bridge that already has an IRC connection quits that
//! connection first and only opens the new one after the server has
//! confirmed the disconnect. Two connections are never live at once. If
//! more `register` commands arrive while the old connection is closing, the
//! last requested nickname is used.

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::identifiers::SessionId;
use crate::irc::{BackendSettings, ConnectOptions, Connector, EventStream, IrcEvent, IrcHandle};
use crate::protocol::translation::{self, NICK_EVENT, REGISTERED_EVENT};
use crate::protocol::{SessionCommand, SessionMessage};

use super::state::{BridgeHandle, BridgeState};

// ============================================================================
// Constants
// ============================================================================

/// Quit and part message used when the session does not supply one.
pub const DEFAULT_FAREWELL: &str = "Leaving.";

/// Quit message used when tearing down a connection to reconnect.
pub const RECONNECT_FAREWELL: &str = "Reconnecting.";

// ============================================================================
// Types
// ============================================================================

/// Completion signal of a quit.
///
/// Clones resolve together once the IRC server has closed the connection.
pub type QuitSignal = Shared<BoxFuture<'static, ()>>;

// ============================================================================
// Session
// ============================================================================

/// The session side of a bridge.
///
/// The bridge owns its session exclusively. The command channel closing is
/// the session-loss notification.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    pub(crate) commands: mpsc::UnboundedReceiver<SessionCommand>,
    pub(crate) outbound: mpsc::UnboundedSender<SessionMessage>,
}

impl Session {
    /// Creates a session from its command and message channels.
    #[must_use]
    pub fn new(
        id: SessionId,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        outbound: mpsc::UnboundedSender<SessionMessage>,
    ) -> Self {
        Self {
            id,
            commands,
            outbound,
        }
    }

    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }
}

// ============================================================================
// Link
// ============================================================================

/// The current IRC connection of a bridge.
struct Link<H> {
    handle: H,
    /// `None` once the connection's event stream has ended.
    events: Option<EventStream>,
    /// Set once a quit has been sent on this connection.
    teardown: Option<QuitSignal>,
}

/// What the IRC side of the loop produced.
enum LinkStep {
    Event(IrcEvent),
    TornDown,
}

// ============================================================================
// Bridge
// ============================================================================

/// State machine binding one session to at most one IRC connection.
pub struct Bridge<C: Connector> {
    session: Session,
    connector: Arc<C>,
    settings: Arc<BackendSettings>,
    nickname: Option<String>,
    link: Option<Link<C::Handle>>,
    /// Nickname to connect with once the current teardown completes.
    pending_nickname: Option<String>,
    handle: BridgeHandle,
}

// ============================================================================
// Bridge - Constructor
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Binds a session. No IRC connection is opened until `register`.
    #[must_use]
    pub fn new(session: Session, connector: Arc<C>, settings: Arc<BackendSettings>) -> Self {
        let handle = BridgeHandle::new(session.id());
        debug!(session = %session.id(), "Bridge bound to session");

        Self {
            session,
            connector,
            settings,
            nickname: None,
            link: None,
            pending_nickname: None,
            handle,
        }
    }
}

// ============================================================================
// Bridge - Accessors
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Returns a handle for observing this bridge.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Returns the owned session's ID.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Returns the current nickname.
    #[inline]
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.handle.state()
    }

    /// Returns `true` while an IRC connection exists, including while it closes.
    #[inline]
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }
}

// ============================================================================
// Bridge - Lifecycle
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Connects with `nickname`, reconnecting if a connection already exists.
    pub fn connect(&mut self, nickname: impl Into<String>) {
        let nickname = nickname.into();

        if self.link.is_some() {
            info!(
                session = %self.session.id,
                from = ?self.nickname,
                to = %nickname,
                "Reconnecting with new nickname"
            );
            self.pending_nickname = Some(nickname);
            let _ = self.begin_teardown(RECONNECT_FAREWELL);
            return;
        }

        self.open(nickname);
    }

    /// Quits the IRC connection.
    ///
    /// The returned signal resolves once the server has closed the
    /// connection, or immediately when there is none. Calls made while a
    /// quit is in flight share its signal and send nothing to the server.
    /// A reconnect waiting on that quit is cancelled.
    pub fn quit(&mut self, message: Option<&str>) -> QuitSignal {
        if let Some(nickname) = self.pending_nickname.take() {
            debug!(session = %self.session.id, %nickname, "Pending reconnect cancelled");
        }
        self.begin_teardown(message.unwrap_or(DEFAULT_FAREWELL))
    }

    fn open(&mut self, nickname: String) {
        let options = ConnectOptions::new(Arc::clone(&self.settings), nickname.clone());
        let (handle, events) = self.connector.connect(options);

        info!(session = %self.session.id, nick = %nickname, "Opening IRC connection");

        self.link = Some(Link {
            handle,
            events: Some(events),
            teardown: None,
        });
        self.set_nickname(nickname);
        self.handle.set_state(BridgeState::Connecting);
    }

    fn begin_teardown(&mut self, message: &str) -> QuitSignal {
        let Some(link) = self.link.as_mut() else {
            return future::ready(()).boxed().shared();
        };

        if let Some(signal) = &link.teardown {
            trace!(session = %self.session.id, "Quit already in flight");
            return signal.clone();
        }

        debug!(session = %self.session.id, %message, "Disconnecting from IRC");
        let signal = link.handle.disconnect(message).map(|_| ()).boxed().shared();
        link.teardown = Some(signal.clone());
        self.handle.set_state(BridgeState::Disconnecting);
        signal
    }

    /// Drops the closed connection and opens the pending one, if any.
    fn teardown_complete(&mut self) {
        self.link = None;
        self.handle.set_state(BridgeState::Unbound);
        debug!(session = %self.session.id, "IRC connection closed");

        if let Some(nickname) = self.pending_nickname.take() {
            self.open(nickname);
        }
    }

    fn set_nickname(&mut self, nickname: String) {
        self.handle.set_nickname(Some(nickname.clone()));
        self.nickname = Some(nickname);
    }
}

// ============================================================================
// Bridge - Session Commands
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Applies one session command.
    pub fn handle_command(&mut self, command: SessionCommand) {
        trace!(session = %self.session.id, command = command.name(), "Session command");

        match command {
            SessionCommand::Register { nickname } => self.connect(nickname),
            SessionCommand::Nick { nickname } => self.change_nick(&nickname),
            SessionCommand::Join { channel } => self.join(&channel),
            SessionCommand::Part { channel, message } => self.part(&channel, message.as_deref()),
            SessionCommand::Say { target, message } => self.say(&target, &message),
            SessionCommand::Quit => {
                let _ = self.quit(None);
            }
        }
    }

    /// Asks the server for a new nickname.
    ///
    /// The bridge's nickname changes only when the server confirms.
    pub fn change_nick(&self, nickname: &str) {
        if let Some(irc) = self.irc("nick") {
            irc.change_nick(nickname);
        }
    }

    /// Joins a channel.
    pub fn join(&self, channel: &str) {
        if let Some(irc) = self.irc("join") {
            irc.join(channel);
        }
    }

    /// Leaves a channel with the given farewell, or the default one when
    /// the message is missing or empty.
    pub fn part(&self, channel: &str, message: Option<&str>) {
        if let Some(irc) = self.irc("part") {
            let message = message.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_FAREWELL);
            irc.part(channel, message);
        }
    }

    /// Sends a message to a channel or user.
    pub fn say(&self, target: &str, message: &str) {
        if let Some(irc) = self.irc("say") {
            irc.say(target, message);
        }
    }

    fn irc(&self, action: &str) -> Option<&C::Handle> {
        let link = self.link.as_ref();
        if link.is_none() {
            warn!(session = %self.session.id, action, "No IRC connection, dropping command");
        }
        link.map(|l| &l.handle)
    }
}

// ============================================================================
// Bridge - IRC Events
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Applies one IRC event, forwarding it to the session if it is listed
    /// in the translation table.
    pub fn handle_event(&mut self, event: IrcEvent) {
        if event.is_error() {
            let detail = event.args.into_iter().next().unwrap_or(Value::Null);
            error!(
                session = %self.session.id,
                nick = ?self.nickname,
                error = %detail,
                "IRC error"
            );
            self.emit(SessionMessage::irc_error(detail));
            return;
        }

        if let Some(message) = translation::translate(&event.name, &event.args) {
            self.emit(message);
        }

        match event.name.as_str() {
            REGISTERED_EVENT => {
                let Some(link) = &self.link else { return };
                let nickname = link.handle.nickname();
                let closing = link.teardown.is_some();

                info!(session = %self.session.id, nick = %nickname, "Registered with IRC");
                self.set_nickname(nickname);
                if !closing {
                    self.handle.set_state(BridgeState::Connected);
                }
            }

            NICK_EVENT => {
                if let (Some(old), Some(new)) = (event.arg_str(0), event.arg_str(1))
                    && self
                        .nickname
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(old))
                {
                    debug!(session = %self.session.id, %old, %new, "Nickname changed");
                    self.set_nickname(new.to_owned());
                }
            }

            _ => {}
        }
    }

    fn emit(&self, message: SessionMessage) {
        if self.session.outbound.send(message).is_err() {
            trace!(session = %self.session.id, "Session gone, message dropped");
        }
    }
}

// ============================================================================
// Bridge - Event Loop
// ============================================================================

impl<C: Connector> Bridge<C> {
    /// Runs the bridge until its session is gone and its IRC connection,
    /// if any, has been torn down.
    pub async fn run(mut self) {
        let mut session_open = true;

        loop {
            tokio::select! {
                command = self.session.commands.recv(), if session_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!(session = %self.session.id, "Session closed");
                        session_open = false;
                        let _ = self.quit(None);
                        if self.link.is_none() {
                            break;
                        }
                    }
                },

                step = next_step(&mut self.link) => match step {
                    LinkStep::Event(event) => self.handle_event(event),
                    LinkStep::TornDown => {
                        self.teardown_complete();
                        if !session_open && self.link.is_none() {
                            break;
                        }
                    }
                },
            }
        }

        self.handle.set_state(BridgeState::Destroyed);
        debug!(session = %self.session.id, "Bridge destroyed");
    }
}

// ============================================================================
// Link Helpers
// ============================================================================

/// Waits for the next event or the teardown completion of the current link.
///
/// Queued events win over completion so nothing emitted before the close
/// is lost. Pends forever when there is no link.
async fn next_step<H>(link: &mut Option<Link<H>>) -> LinkStep {
    let Some(link) = link.as_mut() else {
        return future::pending().await;
    };
    let teardown = link.teardown.clone();

    tokio::select! {
        biased;
        event = recv_event(&mut link.events) => LinkStep::Event(event),
        () = wait_teardown(teardown) => LinkStep::TornDown,
    }
}

async fn recv_event(events: &mut Option<EventStream>) -> IrcEvent {
    let Some(stream) = events.as_mut() else {
        return future::pending().await;
    };
    if let Some(event) = stream.recv().await {
        return event;
    }
    *events = None;
    future::pending().await
}

async fn wait_teardown(teardown: Option<QuitSignal>) {
    match teardown {
        Some(signal) => signal.await,
        None => future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use tokio_test::{assert_pending, assert_ready, task};

    use crate::irc::Disconnected;

    // ------------------------------------------------------------------------
    // Fake IRC backend
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Action {
        Connect(String),
        Nick(String),
        Join(String),
        Part(String, String),
        Say(String, String),
        Disconnect(String),
    }

    /// Test-side controls of one fake connection.
    #[derive(Clone)]
    struct Control {
        events: mpsc::UnboundedSender<IrcEvent>,
        nickname: Arc<Mutex<String>>,
        disconnects: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    }

    impl Control {
        fn fire(&self, name: &str, args: Vec<Value>) {
            self.events.send(IrcEvent::new(name, args)).unwrap();
        }

        fn confirm_disconnect(&self) {
            for done in self.disconnects.lock().drain(..) {
                let _ = done.send(());
            }
        }
    }

    struct FakeConnector {
        actions: mpsc::UnboundedSender<Action>,
        controls: Mutex<Vec<Control>>,
    }

    impl FakeConnector {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Action>) {
            let (actions, rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                actions,
                controls: Mutex::new(Vec::new()),
            });
            (connector, rx)
        }

        fn control(&self, index: usize) -> Control {
            self.controls.lock()[index].clone()
        }

        fn connection_count(&self) -> usize {
            self.controls.lock().len()
        }
    }

    struct FakeHandle {
        actions: mpsc::UnboundedSender<Action>,
        nickname: Arc<Mutex<String>>,
        disconnects: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    }

    impl Connector for FakeConnector {
        type Handle = FakeHandle;

        fn connect(&self, options: ConnectOptions) -> (FakeHandle, EventStream) {
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let nickname = Arc::new(Mutex::new(options.nickname.clone()));
            let disconnects = Arc::new(Mutex::new(Vec::new()));

            self.controls.lock().push(Control {
                events: events_tx,
                nickname: Arc::clone(&nickname),
                disconnects: Arc::clone(&disconnects),
            });
            let _ = self.actions.send(Action::Connect(options.nickname));

            let handle = FakeHandle {
                actions: self.actions.clone(),
                nickname,
                disconnects,
            };
            (handle, events_rx)
        }
    }

    impl IrcHandle for FakeHandle {
        fn nickname(&self) -> String {
            self.nickname.lock().clone()
        }

        fn change_nick(&self, nickname: &str) {
            let _ = self.actions.send(Action::Nick(nickname.into()));
        }

        fn join(&self, channel: &str) {
            let _ = self.actions.send(Action::Join(channel.into()));
        }

        fn part(&self, channel: &str, message: &str) {
            let _ = self.actions.send(Action::Part(channel.into(), message.into()));
        }

        fn say(&self, target: &str, message: &str) {
            let _ = self.actions.send(Action::Say(target.into(), message.into()));
        }

        fn disconnect(&self, message: &str) -> Disconnected {
            let (done, signal) = oneshot::channel();
            self.disconnects.lock().push(done);
            let _ = self.actions.send(Action::Disconnect(message.into()));
            signal
        }
    }

    // ------------------------------------------------------------------------
    // Harness
    // ------------------------------------------------------------------------

    struct Harness {
        bridge: Bridge<FakeConnector>,
        connector: Arc<FakeConnector>,
        actions: mpsc::UnboundedReceiver<Action>,
        commands: mpsc::UnboundedSender<SessionCommand>,
        messages: mpsc::UnboundedReceiver<SessionMessage>,
    }

    fn harness() -> Harness {
        let (connector, actions) = FakeConnector::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (message_tx, messages) = mpsc::unbounded_channel();
        let session = Session::new(SessionId::generate(), command_rx, message_tx);
        let settings = Arc::new(BackendSettings::new("irc.test", 6667).with_channels(["#test"]));
        let bridge = Bridge::new(session, Arc::clone(&connector), settings);

        Harness {
            bridge,
            connector,
            actions,
            commands,
            messages,
        }
    }

    fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // ------------------------------------------------------------------------
    // Direct state machine tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_bind_opens_nothing() {
        let mut h = harness();
        assert_eq!(h.bridge.state(), BridgeState::Unbound);
        assert!(!h.bridge.is_linked());
        assert!(drain(&mut h.actions).is_empty());
    }

    #[test]
    fn test_connect_opens_link() {
        let mut h = harness();
        h.bridge.connect("alice");

        assert_eq!(drain(&mut h.actions), vec![Action::Connect("alice".into())]);
        assert_eq!(h.bridge.nickname(), Some("alice"));
        assert_eq!(h.bridge.state(), BridgeState::Connecting);
    }

    #[test]
    fn test_quit_without_link_resolves_immediately() {
        let mut h = harness();
        let signal = h.bridge.quit(None);

        assert_eq!(signal.now_or_never(), Some(()));
        assert!(drain(&mut h.actions).is_empty());
    }

    #[test]
    fn test_concurrent_quits_send_one_disconnect() {
        let mut h = harness();
        h.bridge.connect("alice");
        drain(&mut h.actions);

        let mut first = task::spawn(h.bridge.quit(None));
        let mut second = task::spawn(h.bridge.quit(Some("other")));

        assert_eq!(drain(&mut h.actions), vec![Action::Disconnect("Leaving.".into())]);
        assert_eq!(h.bridge.state(), BridgeState::Disconnecting);
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        h.connector.control(0).confirm_disconnect();
        assert_ready!(first.poll());
        assert_ready!(second.poll());

        h.bridge.teardown_complete();
        assert!(!h.bridge.is_linked());
        assert_eq!(h.bridge.state(), BridgeState::Unbound);
    }

    #[test]
    fn test_reconnect_waits_for_teardown() {
        let mut h = harness();
        h.bridge.connect("alice");
        h.bridge.connect("bob");

        assert_eq!(
            drain(&mut h.actions),
            vec![
                Action::Connect("alice".into()),
                Action::Disconnect(RECONNECT_FAREWELL.into()),
            ]
        );
        assert_eq!(h.connector.connection_count(), 1);

        h.connector.control(0).confirm_disconnect();
        h.bridge.teardown_complete();

        assert_eq!(drain(&mut h.actions), vec![Action::Connect("bob".into())]);
        assert_eq!(h.bridge.nickname(), Some("bob"));
        assert_eq!(h.bridge.state(), BridgeState::Connecting);
    }

    #[test]
    fn test_latest_nickname_wins_during_teardown() {
        let mut h = harness();
        h.bridge.connect("alice");
        h.bridge.connect("bob");
        h.bridge.connect("carol");

        h.connector.control(0).confirm_disconnect();
        h.bridge.teardown_complete();

        assert_eq!(
            drain(&mut h.actions),
            vec![
                Action::Connect("alice".into()),
                Action::Disconnect(RECONNECT_FAREWELL.into()),
                Action::Connect("carol".into()),
            ]
        );
    }

    #[test]
    fn test_quit_cancels_pending_reconnect() {
        let mut h = harness();
        h.bridge.connect("alice");
        h.bridge.connect("bob");
        let _ = h.bridge.quit(None);

        h.connector.control(0).confirm_disconnect();
        h.bridge.teardown_complete();

        assert_eq!(drain(&mut h.actions).len(), 2);
        assert!(!h.bridge.is_linked());
    }

    #[test]
    fn test_commands_without_link_are_dropped() {
        let mut h = harness();
        h.bridge.handle_command(SessionCommand::Join {
            channel: "#rust".into(),
        });
        h.bridge.handle_command(SessionCommand::Say {
            target: "#rust".into(),
            message: "hi".into(),
        });
        assert!(drain(&mut h.actions).is_empty());
    }

    #[test]
    fn test_commands_forwarded() {
        let mut h = harness();
        h.bridge.connect("alice");
        h.bridge.handle_command(SessionCommand::Join {
            channel: "#rust".into(),
        });
        h.bridge.handle_command(SessionCommand::Say {
            target: "#rust".into(),
            message: "hello".into(),
        });
        h.bridge.handle_command(SessionCommand::Part {
            channel: "#rust".into(),
            message: Some("later".into()),
        });

        assert_eq!(
            drain(&mut h.actions)[1..],
            [
                Action::Join("#rust".into()),
                Action::Say("#rust".into(), "hello".into()),
                Action::Part("#rust".into(), "later".into()),
            ]
        );
    }

    #[test]
    fn test_empty_part_message_uses_default_farewell() {
        let mut h = harness();
        h.bridge.connect("alice");
        let command =
            SessionCommand::parse(r##"{"command":"part","channel":"#test","message":""}"##)
                .unwrap();
        h.bridge.handle_command(command);

        assert_eq!(
            drain(&mut h.actions)[1..],
            [Action::Part("#test".into(), DEFAULT_FAREWELL.into())]
        );
    }

    #[test]
    fn test_nick_request_is_not_optimistic() {
        let mut h = harness();
        h.bridge.connect("alice");
        h.bridge.handle_command(SessionCommand::Nick {
            nickname: "alicia".into(),
        });
        assert_eq!(h.bridge.nickname(), Some("alice"));

        h.bridge.handle_event(IrcEvent::new(
            NICK_EVENT,
            vec![json!("alice"), json!("alicia"), json!(["#test"])],
        ));
        assert_eq!(h.bridge.nickname(), Some("alicia"));
        assert_eq!(h.bridge.handle().info().nickname.as_deref(), Some("alicia"));

        h.bridge.handle_event(IrcEvent::new(
            NICK_EVENT,
            vec![json!("bob"), json!("robert"), json!([])],
        ));
        assert_eq!(h.bridge.nickname(), Some("alicia"));
    }

    #[test]
    fn test_registered_adopts_server_nickname() {
        let mut h = harness();
        h.bridge.connect("alice");
        *h.connector.control(0).nickname.lock() = "alice1".into();

        h.bridge.handle_event(IrcEvent::new(REGISTERED_EVENT, vec![json!("alice1")]));

        assert_eq!(h.bridge.nickname(), Some("alice1"));
        assert_eq!(h.bridge.state(), BridgeState::Connected);
        let messages = drain(&mut h.messages);
        assert_eq!(messages[0].event, "registered");
        assert_eq!(messages[0].data, json!({}));
    }

    #[test]
    fn test_table_events_forwarded_and_others_dropped() {
        let mut h = harness();
        h.bridge.connect("alice");

        h.bridge.handle_event(IrcEvent::new(
            "message",
            vec![json!("bob"), json!("#test"), json!("hi"), json!({ "raw": true })],
        ));
        h.bridge.handle_event(IrcEvent::new("kick", vec![json!("#test"), json!("alice")]));
        h.bridge.handle_event(IrcEvent::new("ctcp", vec![json!("bob")]));

        let messages = drain(&mut h.messages);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].event, "message");
        assert_eq!(
            messages[0].data,
            json!({ "from": "bob", "to": "#test", "text": "hi" })
        );
    }

    #[test]
    fn test_error_forwarded_without_teardown() {
        let mut h = harness();
        h.bridge.connect("alice");
        let detail = json!({ "command": "connection", "message": "refused" });

        h.bridge.handle_event(IrcEvent::error(detail.clone()));

        let messages = drain(&mut h.messages);
        assert_eq!(messages, vec![SessionMessage::irc_error(detail)]);
        assert!(h.bridge.is_linked());
        assert_eq!(drain(&mut h.actions), vec![Action::Connect("alice".into())]);
    }

    // ------------------------------------------------------------------------
    // Event loop tests
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_end_to_end_register_join_part() {
        let Harness {
            bridge,
            connector,
            mut actions,
            commands,
            mut messages,
        } = harness();
        let task = tokio::spawn(bridge.run());

        commands
            .send(SessionCommand::Register {
                nickname: "alice".into(),
            })
            .unwrap();
        assert_eq!(next(&mut actions).await, Action::Connect("alice".into()));

        connector
            .control(0)
            .fire("join", vec![json!("#test"), json!("alice"), json!({})]);
        let message = next(&mut messages).await;
        assert_eq!(message.event, "join");
        assert_eq!(message.data, json!({ "channel": "#test", "nick": "alice" }));

        commands
            .send(SessionCommand::Part {
                channel: "#test".into(),
                message: None,
            })
            .unwrap();
        assert_eq!(
            next(&mut actions).await,
            Action::Part("#test".into(), DEFAULT_FAREWELL.into())
        );

        drop(commands);
        assert_eq!(
            next(&mut actions).await,
            Action::Disconnect(DEFAULT_FAREWELL.into())
        );
        connector.control(0).confirm_disconnect();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_loop_reconnect_ordering() {
        let Harness {
            bridge,
            connector,
            mut actions,
            commands,
            ..
        } = harness();
        let handle = bridge.handle();
        let task = tokio::spawn(bridge.run());

        commands
            .send(SessionCommand::Register {
                nickname: "n1".into(),
            })
            .unwrap();
        assert_eq!(next(&mut actions).await, Action::Connect("n1".into()));

        commands
            .send(SessionCommand::Register {
                nickname: "n2".into(),
            })
            .unwrap();
        assert_eq!(
            next(&mut actions).await,
            Action::Disconnect(RECONNECT_FAREWELL.into())
        );

        settle().await;
        assert!(actions.try_recv().is_err());
        assert_eq!(handle.state(), BridgeState::Disconnecting);

        connector.control(0).confirm_disconnect();
        assert_eq!(next(&mut actions).await, Action::Connect("n2".into()));
        assert_eq!(connector.connection_count(), 2);

        drop(commands);
        assert_eq!(
            next(&mut actions).await,
            Action::Disconnect(DEFAULT_FAREWELL.into())
        );
        connector.control(1).confirm_disconnect();
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(handle.state(), BridgeState::Destroyed);
    }

    #[tokio::test]
    async fn test_events_before_close_are_delivered() {
        let Harness {
            bridge,
            connector,
            mut actions,
            commands,
            mut messages,
        } = harness();
        let task = tokio::spawn(bridge.run());

        commands
            .send(SessionCommand::Register {
                nickname: "alice".into(),
            })
            .unwrap();
        next(&mut actions).await;
        commands.send(SessionCommand::Quit).unwrap();
        next(&mut actions).await;

        let control = connector.control(0);
        control.fire("part", vec![json!("#test"), json!("alice")]);
        control.confirm_disconnect();

        let message = next(&mut messages).await;
        assert_eq!(message.event, "part");

        drop(commands);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_session_loss_without_link_ends_immediately() {
        let Harness {
            bridge,
            mut actions,
            commands,
            ..
        } = harness();
        let handle = bridge.handle();
        let task = tokio::spawn(bridge.run());

        drop(commands);
        timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(drain(&mut actions).is_empty());
        assert_eq!(handle.state(), BridgeState::Destroyed);
    }

    #[tokio::test]
    async fn test_stuck_teardown_keeps_bridge_disconnecting() {
        let Harness {
            bridge,
            mut actions,
            commands,
            ..
        } = harness();
        let handle = bridge.handle();
        let task = tokio::spawn(bridge.run());

        commands
            .send(SessionCommand::Register {
                nickname: "alice".into(),
            })
            .unwrap();
        next(&mut actions).await;
        drop(commands);
        next(&mut actions).await;

        settle().await;
        assert!(!task.is_finished());
        assert_eq!(handle.state(), BridgeState::Disconnecting);
        task.abort();
    }
}
