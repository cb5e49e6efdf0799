//! Change relay: the bridge between the local store and a joined room.
//!
//! Outbound, one store subscription feeds a debounce worker. After the store
//! has been quiet for the debounce window the worker compares the shared
//! slices with what peers are believed to hold and, if they differ, sends
//! `room-code` followed by a `custom-event` carrying the full shared state.
//! Sends are fire-and-forget.
//!
//! Inbound, a second worker parses relay frames and hands peer state to the
//! [`Reconciler`]. The peer baseline is advanced by exactly the slices that
//! were applied, so reconciled state is not echoed back while local edits
//! made in the meantime still go out.
//!
//! Stopping the relay unsubscribes from the store and aborts both workers;
//! a broadcast still waiting out its debounce window is never sent.

use crate::protocol::{ClientFrame, Envelope, ProtocolError, ServerFrame};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::session::{SessionState, SessionStatus};
use crate::shared::{lock, lock_store, SharedStore};
use crate::transport::{FrameSender, Inbound, TransportError};
use reactype_editor::{Action, SharedState, SubscriptionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events surfaced to the application while a room is joined
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Joined { room: String, client_id: Uuid },
    /// Full shared state went out to the room
    Broadcast { room: String },
    Reconciled(ReconcileOutcome),
    /// Peer input that was dropped without touching the store
    Ignored { reason: String },
    /// Named intent announced by a peer. Informational; the peer's next
    /// full-state broadcast carries its effect.
    PeerAction {
        name: String,
        payload: serde_json::Value,
    },
    Disconnected,
}

pub struct ChangeRelay {
    store: SharedStore,
    room: String,
    sender: FrameSender,
    subscription: Option<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeRelay {
    pub(crate) fn start(
        store: SharedStore,
        room: String,
        sender: FrameSender,
        incoming: mpsc::UnboundedReceiver<Inbound>,
        debounce: Duration,
        events: mpsc::UnboundedSender<RelayEvent>,
        status: Arc<Mutex<SessionStatus>>,
        generation: u64,
    ) -> Self {
        let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();
        let (peer_baseline, subscription) = {
            let mut guard = lock_store(&store);
            let baseline = Arc::new(Mutex::new(guard.shared_state()));
            let subscription = guard.subscribe(move |_| {
                let _ = change_tx.send(());
            });
            (baseline, subscription)
        };

        let outbound = tokio::spawn(Self::run_outbound(
            store.clone(),
            room.clone(),
            sender.clone(),
            change_rx,
            debounce,
            peer_baseline.clone(),
            events.clone(),
        ));

        let inbound = tokio::spawn(Self::run_inbound(
            store.clone(),
            room.clone(),
            incoming,
            peer_baseline,
            events,
            subscription,
            status,
            generation,
        ));

        Self {
            store,
            room,
            sender,
            subscription: Some(subscription),
            tasks: vec![outbound, inbound],
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Announce a named intent to the room. Returns false for actions that
    /// have no named event.
    pub fn emit_action(&self, action: &Action) -> Result<bool, TransportError> {
        let Some(name) = action.broadcast_event() else {
            return Ok(false);
        };
        let payload = serde_json::to_value(action).map_err(ProtocolError::Encode)?;
        self.sender.send(ClientFrame::Action {
            name,
            room: self.room.clone(),
            payload,
        })?;
        Ok(true)
    }

    /// Unsubscribe and abort both workers. Idempotent.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            lock_store(&self.store).unsubscribe(subscription);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    async fn run_outbound(
        store: SharedStore,
        room: String,
        sender: FrameSender,
        mut changes: mpsc::UnboundedReceiver<()>,
        debounce: Duration,
        peer_baseline: Arc<Mutex<SharedState>>,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) {
        while changes.recv().await.is_some() {
            // Trailing edge: every further change restarts the window
            loop {
                match timeout(debounce, changes.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            match Self::flush(&store, &room, &sender, &peer_baseline) {
                Ok(true) => {
                    debug!(room = %room, "shared state broadcast");
                    let _ = events.send(RelayEvent::Broadcast { room: room.clone() });
                }
                Ok(false) => {}
                Err(TransportError::Closed) => break,
                Err(e) => warn!(room = %room, error = %e, "broadcast failed"),
            }
        }
    }

    fn flush(
        store: &SharedStore,
        room: &str,
        sender: &FrameSender,
        peer_baseline: &Mutex<SharedState>,
    ) -> Result<bool, TransportError> {
        // Store before baseline, as on the inbound side, and both held until
        // the baseline is advanced so a reconcile cannot slip in between
        let guard = lock_store(store);
        let current = guard.shared_state();
        let mut baseline = lock(peer_baseline);
        if *baseline == current {
            return Ok(false);
        }

        let payload = current.to_json().map_err(ProtocolError::Encode)?;
        sender.send(ClientFrame::RoomCode {
            room: room.to_string(),
        })?;
        sender.send(ClientFrame::broadcast(payload, room))?;

        *baseline = current;
        Ok(true)
    }

    async fn run_inbound(
        store: SharedStore,
        room: String,
        mut incoming: mpsc::UnboundedReceiver<Inbound>,
        peer_baseline: Arc<Mutex<SharedState>>,
        events: mpsc::UnboundedSender<RelayEvent>,
        subscription: SubscriptionId,
        status: Arc<Mutex<SessionStatus>>,
        generation: u64,
    ) {
        while let Some(item) = incoming.recv().await {
            let event = match item {
                Inbound::Frame(frame) => Self::on_frame(&store, &peer_baseline, frame),
                Inbound::Malformed(reason) => {
                    warn!(room = %room, reason = %reason, "ignoring undecodable frame");
                    Some(RelayEvent::Ignored { reason })
                }
            };
            if let Some(event) = event {
                let _ = events.send(event);
            }
        }

        // Dropping the listener closes the change channel, which ends the
        // outbound worker
        lock_store(&store).unsubscribe(subscription);

        if lock(&status).set(generation, SessionState::Disconnected) {
            info!(room = %room, "relay connection closed");
            let _ = events.send(RelayEvent::Disconnected);
        } else {
            debug!(room = %room, "superseded relay connection closed");
        }
    }

    fn on_frame(
        store: &SharedStore,
        peer_baseline: &Mutex<SharedState>,
        frame: ServerFrame,
    ) -> Option<RelayEvent> {
        let event = frame.event();
        let envelope = match Envelope::parse(frame) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => return None,
            Err(e) => {
                warn!(event, error = %e, "ignoring malformed peer state");
                return Some(RelayEvent::Ignored {
                    reason: e.to_string(),
                });
            }
        };

        match envelope {
            Envelope::RoomState(incoming) => {
                let mut store = lock_store(store);
                match Reconciler::apply_baseline(&mut store, incoming.clone()) {
                    Ok(outcome) => {
                        *lock(peer_baseline) = incoming;
                        Some(RelayEvent::Reconciled(outcome))
                    }
                    Err(e) => Some(RelayEvent::Ignored {
                        reason: e.to_string(),
                    }),
                }
            }

            Envelope::Broadcast(incoming) => {
                let mut store = lock_store(store);
                match Reconciler::reconcile(&mut store, &incoming) {
                    Ok(outcome) => {
                        let mut baseline = lock(peer_baseline);
                        match outcome {
                            ReconcileOutcome::Replaced(slice) => {
                                baseline.take_slice(&incoming, slice)
                            }
                            // Local state already equals what the peer holds
                            ReconcileOutcome::Unchanged => *baseline = incoming,
                            ReconcileOutcome::Baseline => {}
                        }
                        Some(RelayEvent::Reconciled(outcome))
                    }
                    Err(e) => Some(RelayEvent::Ignored {
                        reason: e.to_string(),
                    }),
                }
            }

            Envelope::Action { name, payload } => {
                debug!(action = %name, "peer action");
                Some(RelayEvent::PeerAction { name, payload })
            }
        }
    }
}

impl Drop for ChangeRelay {
    fn drop(&mut self) {
        self.stop();
    }
}
