//! Room membership and fan-out on the relay side.
//!
//! Each attached client gets an unbounded outbound queue. Frames a client
//! sends to its room are forwarded to every other member, never echoed to
//! the sender. The hub keeps the latest full-state broadcast per room so a
//! late joiner can be handed a baseline; a room and its state disappear with
//! its last member.

use crate::protocol::{ClientFrame, ServerFrame};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Snapshot of hub activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub active_connections: usize,
    pub active_rooms: usize,
    pub messages_relayed: u64,
}

struct Member {
    tx: mpsc::UnboundedSender<ServerFrame>,
    room: Option<String>,
}

#[derive(Default)]
struct Room {
    members: HashSet<Uuid>,
    /// Latest serialized shared state broadcast in this room
    state: Option<String>,
}

#[derive(Default)]
struct HubInner {
    members: HashMap<Uuid, Member>,
    rooms: HashMap<String, Room>,
}

#[derive(Clone, Default)]
pub struct RelayHub {
    inner: Arc<Mutex<HubInner>>,
    messages_relayed: Arc<AtomicU64>,
}

impl RelayHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection. The returned receiver yields `connect` first.
    pub fn attach(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerFrame>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        // Receiver is alive; this cannot fail
        let _ = tx.send(ServerFrame::Connect { client_id });

        self.lock().members.insert(client_id, Member { tx, room: None });
        info!(%client_id, "client attached");

        (client_id, rx)
    }

    /// Handle one frame from an attached client
    pub fn handle(&self, client_id: Uuid, frame: ClientFrame) {
        let mut inner = self.lock();
        if !inner.members.contains_key(&client_id) {
            warn!(%client_id, "frame from unknown client dropped");
            return;
        }

        match frame {
            ClientFrame::JoinRoom { room } => Self::join(&mut inner, client_id, room),

            ClientFrame::RoomCode { room } => {
                debug!(%client_id, room = %room, "room code announced");
            }

            ClientFrame::CustomEvent { state, room, .. } => {
                if !Self::is_member(&inner, client_id, &room) {
                    warn!(%client_id, room = %room, "broadcast for a room the client has not joined");
                    return;
                }
                if let Some(entry) = inner.rooms.get_mut(&room) {
                    entry.state = Some(state.clone());
                }
                let sent = Self::fan_out(&inner, client_id, &room, ServerFrame::ReceiveMessage { state });
                self.messages_relayed.fetch_add(sent as u64, Ordering::Relaxed);
                debug!(%client_id, room = %room, peers = sent, "state relayed");
            }

            ClientFrame::Action { name, room, payload } => {
                if !Self::is_member(&inner, client_id, &room) {
                    warn!(%client_id, room = %room, action = %name, "action for a room the client has not joined");
                    return;
                }
                let sent = Self::fan_out(&inner, client_id, &room, ServerFrame::Action { name, payload });
                self.messages_relayed.fetch_add(sent as u64, Ordering::Relaxed);
            }
        }
    }

    /// Remove a client and its room membership
    pub fn detach(&self, client_id: Uuid) {
        let mut inner = self.lock();
        if let Some(member) = inner.members.remove(&client_id) {
            if let Some(room) = member.room {
                Self::leave(&mut inner, client_id, &room);
            }
            info!(%client_id, "client detached");
        }
    }

    pub fn stats(&self) -> HubStats {
        let inner = self.lock();
        HubStats {
            active_connections: inner.members.len(),
            active_rooms: inner.rooms.len(),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
        }
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.lock().rooms.get(room).map_or(0, |r| r.members.len())
    }

    pub fn room_state(&self, room: &str) -> Option<String> {
        self.lock().rooms.get(room).and_then(|r| r.state.clone())
    }

    fn join(inner: &mut HubInner, client_id: Uuid, room: String) {
        let previous = inner
            .members
            .get(&client_id)
            .and_then(|member| member.room.clone());
        if let Some(previous) = previous {
            Self::leave(inner, client_id, &previous);
        }

        let entry = inner.rooms.entry(room.clone()).or_default();
        entry.members.insert(client_id);
        let baseline = entry.state.clone();

        if let Some(member) = inner.members.get_mut(&client_id) {
            member.room = Some(room.clone());
            if let Some(state) = baseline {
                if member.tx.send(ServerFrame::RoomStateUpdate { state }).is_err() {
                    warn!(%client_id, "joiner went away before baseline was sent");
                }
            }
        }

        info!(%client_id, room = %room, "joined room");
    }

    fn leave(inner: &mut HubInner, client_id: Uuid, room: &str) {
        let now_empty = match inner.rooms.get_mut(room) {
            Some(entry) => {
                entry.members.remove(&client_id);
                entry.members.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.rooms.remove(room);
            info!(room = %room, "room closed");
        }
        if let Some(member) = inner.members.get_mut(&client_id) {
            member.room = None;
        }
    }

    fn is_member(inner: &HubInner, client_id: Uuid, room: &str) -> bool {
        inner
            .rooms
            .get(room)
            .is_some_and(|r| r.members.contains(&client_id))
    }

    /// Send to every room member except `sender`; returns how many were reached
    fn fan_out(inner: &HubInner, sender: Uuid, room: &str, frame: ServerFrame) -> usize {
        let Some(entry) = inner.rooms.get(room) else {
            return 0;
        };

        entry
            .members
            .iter()
            .filter(|id| **id != sender)
            .filter_map(|id| inner.members.get(id))
            .filter(|member| member.tx.send(frame.clone()).is_ok())
            .count()
    }
}
