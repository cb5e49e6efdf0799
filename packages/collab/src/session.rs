//! Room session lifecycle.
//!
//! ```text
//! Disconnected ──join_room──▶ Connecting ──connect ack──▶ Joined
//!       ▲                         │                         │
//!       └───── failure/timeout ───┘                         │
//!       └──────────── leave_room / transport closed ────────┘
//! ```
//!
//! Joining while already joined tears the previous link down first, so at
//! most one transport and one store subscription exist per session.

use crate::config::RelayConfig;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::relay::{ChangeRelay, RelayEvent};
use crate::shared::{lock, SharedStore};
use crate::transport::{Connection, ConnectionGuard, Connector, Inbound, TransportError};
use reactype_editor::Action;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Joined,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Room code cannot be blank")]
    BlankRoomCode,

    #[error("Relay did not acknowledge the connection in time")]
    ConnectTimeout,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Session state plus the generation of the link allowed to change it.
/// Every join and leave starts a new generation, so a link being torn down
/// can no longer overwrite the state of the link that replaced it.
#[derive(Debug)]
pub(crate) struct SessionStatus {
    generation: u64,
    state: SessionState,
}

impl SessionStatus {
    fn new() -> Self {
        Self {
            generation: 0,
            state: SessionState::Disconnected,
        }
    }

    /// Start a new generation in `state`
    fn advance(&mut self, state: SessionState) -> u64 {
        self.generation += 1;
        self.state = state;
        self.generation
    }

    /// Set the state on behalf of link `generation`. Returns false, leaving
    /// the state alone, when that link has been superseded.
    pub(crate) fn set(&mut self, generation: u64, state: SessionState) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state = state;
        true
    }
}

struct RoomLink {
    relay: ChangeRelay,
    guard: ConnectionGuard,
    client_id: Uuid,
}

pub struct RoomSession<C: Connector> {
    connector: C,
    store: SharedStore,
    config: RelayConfig,
    status: Arc<Mutex<SessionStatus>>,
    room_code: Option<String>,
    link: Option<RoomLink>,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<RelayEvent>>,
}

impl<C: Connector> RoomSession<C> {
    pub fn new(connector: C, store: SharedStore, config: RelayConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            store,
            config,
            status: Arc::new(Mutex::new(SessionStatus::new())),
            room_code: None,
            link: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<RelayEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> SessionState {
        lock(&self.status).state
    }

    pub fn is_joined(&self) -> bool {
        self.state() == SessionState::Joined
    }

    /// Code of the joined room; None once the link is gone
    pub fn room_code(&self) -> Option<&str> {
        if self.is_joined() {
            self.room_code.as_deref()
        } else {
            None
        }
    }

    /// Id the relay assigned to the current connection
    pub fn client_id(&self) -> Option<Uuid> {
        self.link.as_ref().map(|link| link.client_id)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Join a room, replacing any existing link
    pub async fn join_room(&mut self, code: impl Into<String>) -> Result<(), SessionError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(SessionError::BlankRoomCode);
        }

        self.leave_room();
        let generation = lock(&self.status).advance(SessionState::Connecting);
        info!(room = %code, "joining room");

        match self.open(&code, generation).await {
            Ok(link) => {
                let _ = self.events_tx.send(RelayEvent::Joined {
                    room: code.clone(),
                    client_id: link.client_id,
                });
                self.link = Some(link);
                self.room_code = Some(code);
                Ok(())
            }
            Err(e) => {
                warn!(room = %code, error = %e, "join failed");
                lock(&self.status).set(generation, SessionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Leave the current room. Synchronous and idempotent: any pending
    /// broadcast is cancelled and the transport is closed before returning.
    pub fn leave_room(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.relay.stop();
            link.guard.close();
            info!(room = %link.relay.room(), "left room");
        }
        self.room_code = None;
        lock(&self.status).advance(SessionState::Disconnected);
    }

    /// Announce a named intent to the room. Fire-and-forget: returns false
    /// when not joined or when the action has no named event.
    pub fn emit_action(&self, action: &Action) -> Result<bool, SessionError> {
        match &self.link {
            Some(link) if self.is_joined() => Ok(link.relay.emit_action(action)?),
            _ => Ok(false),
        }
    }

    async fn open(&self, code: &str, generation: u64) -> Result<RoomLink, SessionError> {
        let Connection {
            sender,
            mut incoming,
            guard,
        } = self.connector.connect().await?;

        let client_id = match timeout(self.config.connect_timeout(), wait_for_connect(&mut incoming)).await {
            Ok(Some(client_id)) => client_id,
            Ok(None) => return Err(TransportError::Closed.into()),
            Err(_) => return Err(SessionError::ConnectTimeout),
        };

        sender.send(ClientFrame::JoinRoom {
            room: code.to_string(),
        })?;
        lock(&self.status).set(generation, SessionState::Joined);
        info!(room = %code, %client_id, "joined room");

        let relay = ChangeRelay::start(
            self.store.clone(),
            code.to_string(),
            sender,
            incoming,
            self.config.debounce(),
            self.events_tx.clone(),
            self.status.clone(),
            generation,
        );

        Ok(RoomLink {
            relay,
            guard,
            client_id,
        })
    }
}

impl<C: Connector> Drop for RoomSession<C> {
    fn drop(&mut self) {
        self.leave_room();
    }
}

async fn wait_for_connect(incoming: &mut mpsc::UnboundedReceiver<Inbound>) -> Option<Uuid> {
    while let Some(item) = incoming.recv().await {
        match item {
            Inbound::Frame(ServerFrame::Connect { client_id }) => return Some(client_id),
            other => debug!(?other, "frame before connect acknowledgment ignored"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{lock_store, shared_store};
    use crate::transport::FrameSender;
    use async_trait::async_trait;
    use reactype_editor::{SharedState, Store};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const DEBOUNCE: Duration = Duration::from_millis(20);

    #[derive(Default)]
    struct Recorded {
        outbound: Vec<mpsc::UnboundedReceiver<ClientFrame>>,
        inbound: Vec<Option<mpsc::UnboundedSender<Inbound>>>,
    }

    /// Connector that records every frame and counts open connections
    #[derive(Clone)]
    struct RecordingConnector {
        recorded: Arc<Mutex<Recorded>>,
        open: Arc<AtomicUsize>,
        acknowledge: bool,
    }

    impl RecordingConnector {
        fn new() -> Self {
            Self {
                recorded: Arc::default(),
                open: Arc::default(),
                acknowledge: true,
            }
        }

        fn silent() -> Self {
            Self {
                acknowledge: false,
                ..Self::new()
            }
        }

        fn connections(&self) -> usize {
            self.recorded.lock().unwrap().outbound.len()
        }

        fn open_connections(&self) -> usize {
            self.open.load(Ordering::SeqCst)
        }

        fn frames(&self, index: usize) -> Vec<ClientFrame> {
            let mut recorded = self.recorded.lock().unwrap();
            let mut frames = Vec::new();
            while let Ok(frame) = recorded.outbound[index].try_recv() {
                frames.push(frame);
            }
            frames
        }

        fn push(&self, index: usize, frame: ServerFrame) {
            let recorded = self.recorded.lock().unwrap();
            recorded.inbound[index]
                .as_ref()
                .unwrap()
                .send(Inbound::Frame(frame))
                .unwrap();
        }

        fn hang_up(&self, index: usize) {
            self.recorded.lock().unwrap().inbound[index] = None;
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        async fn connect(&self) -> Result<Connection, TransportError> {
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            if self.acknowledge {
                in_tx
                    .send(Inbound::Frame(ServerFrame::Connect {
                        client_id: Uuid::new_v4(),
                    }))
                    .unwrap();
            }

            let mut recorded = self.recorded.lock().unwrap();
            recorded.outbound.push(out_rx);
            recorded.inbound.push(Some(in_tx));
            self.open.fetch_add(1, Ordering::SeqCst);

            let open = self.open.clone();
            Ok(Connection {
                sender: FrameSender::new(out_tx),
                incoming: in_rx,
                guard: ConnectionGuard::new().on_close(move || {
                    open.fetch_sub(1, Ordering::SeqCst);
                }),
            })
        }
    }

    fn session(connector: &RecordingConnector) -> RoomSession<RecordingConnector> {
        let config = RelayConfig {
            debounce_ms: DEBOUNCE.as_millis() as u64,
            connect_timeout_ms: 200,
            ..RelayConfig::default()
        };
        RoomSession::new(connector.clone(), shared_store(Store::new()), config)
    }

    fn edit_css(session: &RoomSession<RecordingConnector>, css: &str) {
        lock_store(session.store())
            .dispatch(Action::UpdateCss {
                style: css.to_string(),
            })
            .unwrap();
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<RelayEvent>) -> RelayEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for relay event")
            .expect("event channel closed")
    }

    fn join_frame(room: &str) -> ClientFrame {
        ClientFrame::JoinRoom {
            room: room.to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_room_emits_join_and_enters_joined() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.join_room("42").await.unwrap();

        assert_eq!(session.state(), SessionState::Joined);
        assert_eq!(session.room_code(), Some("42"));
        assert!(session.client_id().is_some());
        assert_eq!(connector.frames(0), vec![join_frame("42")]);
    }

    #[tokio::test]
    async fn test_double_join_keeps_one_connection() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);

        session.join_room("42").await.unwrap();
        session.join_room("42").await.unwrap();

        assert_eq!(connector.connections(), 2);
        assert_eq!(connector.open_connections(), 1);
        assert_eq!(connector.frames(1), vec![join_frame("42")]);
        assert_eq!(lock_store(session.store()).listener_count(), 1);
    }

    #[tokio::test]
    async fn test_leave_cancels_pending_broadcast() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        session.join_room("42").await.unwrap();

        edit_css(&session, "body { margin: 0 }");
        session.leave_room();

        tokio::time::sleep(DEBOUNCE * 5).await;

        assert_eq!(connector.frames(0), vec![join_frame("42")]);
        assert_eq!(connector.open_connections(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.room_code(), None);
        assert_eq!(lock_store(session.store()).listener_count(), 0);
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        session.leave_room();
        session.join_room("7").await.unwrap();
        session.leave_room();
        session.leave_room();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_burst_of_changes_sends_one_broadcast() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        assert!(matches!(next_event(&mut events).await, RelayEvent::Joined { .. }));

        edit_css(&session, "a {}");
        edit_css(&session, "a { color: red }");
        edit_css(&session, "a { color: blue }");

        assert_eq!(
            next_event(&mut events).await,
            RelayEvent::Broadcast {
                room: "42".to_string()
            }
        );

        let frames = connector.frames(0);
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[1],
            ClientFrame::RoomCode {
                room: "42".to_string()
            }
        );
        match &frames[2] {
            ClientFrame::CustomEvent { state, room, .. } => {
                assert_eq!(room, "42");
                let sent = SharedState::from_json(state).unwrap();
                assert_eq!(sent.style.style, "a { color: blue }");
            }
            other => panic!("expected custom-event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_ignored() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        next_event(&mut events).await;

        let before = lock_store(session.store()).state().clone();
        connector.push(
            0,
            ServerFrame::ReceiveMessage {
                state: "{\"appState\": 12".to_string(),
            },
        );

        assert!(matches!(
            next_event(&mut events).await,
            RelayEvent::Ignored { .. }
        ));
        assert_eq!(lock_store(session.store()).state(), &before);
    }

    #[tokio::test]
    async fn test_room_state_update_is_not_echoed() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        next_event(&mut events).await;
        connector.frames(0);

        let mut remote = SharedState::default();
        remote.style.style = "main { display: grid }".to_string();
        remote.code_preview.input = "export default App;".to_string();
        connector.push(
            0,
            ServerFrame::RoomStateUpdate {
                state: remote.to_json().unwrap(),
            },
        );

        assert_eq!(
            next_event(&mut events).await,
            RelayEvent::Reconciled(crate::reconciler::ReconcileOutcome::Baseline)
        );
        assert_eq!(lock_store(session.store()).shared_state(), remote);

        tokio::time::sleep(DEBOUNCE * 5).await;
        assert!(connector.frames(0).is_empty());
    }

    #[tokio::test]
    async fn test_peer_action_is_surfaced() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        next_event(&mut events).await;

        connector.push(
            0,
            ServerFrame::Action {
                name: "addChildAction".to_string(),
                payload: serde_json::json!({"type": "addChild"}),
            },
        );

        match next_event(&mut events).await {
            RelayEvent::PeerAction { name, .. } => assert_eq!(name, "addChildAction"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_action() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);

        let action = Action::DeletePassedInProps { row_id: 4 };
        assert!(!session.emit_action(&action).unwrap());

        session.join_room("42").await.unwrap();
        connector.frames(0);
        assert!(session.emit_action(&action).unwrap());

        match connector.frames(0).as_slice() {
            [ClientFrame::Action { name, room, .. }] => {
                assert_eq!(name, "deletePassedInPropsAction");
                assert_eq!(room, "42");
            }
            other => panic!("unexpected frames {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let connector = RecordingConnector::silent();
        let mut session = session(&connector);

        let result = session.join_room("42").await;

        assert!(matches!(result, Err(SessionError::ConnectTimeout)));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_blank_room_code() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        assert!(matches!(
            session.join_room("  ").await,
            Err(SessionError::BlankRoomCode)
        ));
        assert_eq!(connector.connections(), 0);
    }

    #[tokio::test]
    async fn test_transport_loss_disconnects() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        next_event(&mut events).await;

        connector.hang_up(0);

        assert_eq!(next_event(&mut events).await, RelayEvent::Disconnected);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.room_code(), None);
        assert_eq!(lock_store(session.store()).listener_count(), 0);
        assert!(!session.emit_action(&Action::DeleteChild { child_id: 1 }).unwrap());
    }

    #[tokio::test]
    async fn test_old_link_does_not_touch_new_link_state() {
        let connector = RecordingConnector::new();
        let mut session = session(&connector);
        let mut events = session.take_event_rx().unwrap();
        session.join_room("42").await.unwrap();
        session.join_room("43").await.unwrap();
        assert!(matches!(next_event(&mut events).await, RelayEvent::Joined { .. }));
        assert!(matches!(next_event(&mut events).await, RelayEvent::Joined { .. }));

        connector.hang_up(0);
        tokio::time::sleep(DEBOUNCE * 5).await;

        assert_eq!(session.state(), SessionState::Joined);
        assert_eq!(session.room_code(), Some("43"));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_superseded_generation_is_ignored() {
        let mut status = SessionStatus::new();
        let first = status.advance(SessionState::Connecting);
        assert!(status.set(first, SessionState::Joined));

        let second = status.advance(SessionState::Connecting);
        assert!(!status.set(first, SessionState::Disconnected));
        assert_eq!(status.state, SessionState::Connecting);

        assert!(status.set(second, SessionState::Joined));
        assert_eq!(status.state, SessionState::Joined);
    }
}
