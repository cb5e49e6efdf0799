//! Wire protocol between editor clients and the relay.
//!
//! Frames are JSON text messages tagged by `event`:
//!
//! | Direction      | Event               | Data                      |
//! |----------------|---------------------|---------------------------|
//! | client → relay | `join-room`         | `{room}`                  |
//! | client → relay | `room-code`         | `{room}`                  |
//! | client → relay | `custom-event`      | `{label, state, room}`    |
//! | client → relay | `action`            | `{name, room, payload}`   |
//! | relay → client | `connect`           | `{clientId}`              |
//! | relay → client | `room-state-update` | `{state}`                 |
//! | relay → client | `receive message`   | `{state}`                 |
//! | relay → client | `action`            | `{name, payload}`         |
//!
//! `state` carries a serialized [`SharedState`] as a string so the relay can
//! store and forward it without understanding the document.

use reactype_editor::SharedState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Label attached to full-state broadcasts
pub const BROADCAST_LABEL: &str = "sent from front-end";

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    #[error("Malformed state payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("Encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Frames sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    #[serde(rename = "join-room")]
    JoinRoom { room: String },

    #[serde(rename = "room-code")]
    RoomCode { room: String },

    #[serde(rename = "custom-event")]
    CustomEvent {
        label: String,
        state: String,
        room: String,
    },

    /// Named intent, e.g. `addChildAction`
    #[serde(rename = "action")]
    Action {
        name: String,
        room: String,
        payload: serde_json::Value,
    },
}

impl ClientFrame {
    pub fn broadcast(state: String, room: impl Into<String>) -> Self {
        ClientFrame::CustomEvent {
            label: BROADCAST_LABEL.to_string(),
            state,
            room: room.into(),
        }
    }

    pub fn room(&self) -> &str {
        match self {
            ClientFrame::JoinRoom { room }
            | ClientFrame::RoomCode { room }
            | ClientFrame::CustomEvent { room, .. }
            | ClientFrame::Action { room, .. } => room,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)
    }
}

/// Frames sent by the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    /// Transport-level acknowledgment; the first frame on every connection
    #[serde(rename = "connect")]
    Connect {
        #[serde(rename = "clientId")]
        client_id: Uuid,
    },

    /// Authoritative room state for a client that just joined
    #[serde(rename = "room-state-update")]
    RoomStateUpdate { state: String },

    /// Full-state broadcast from a peer
    #[serde(rename = "receive message")]
    ReceiveMessage { state: String },

    #[serde(rename = "action")]
    Action {
        name: String,
        payload: serde_json::Value,
    },
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)
    }

    /// Event name as it appears on the wire
    pub fn event(&self) -> &'static str {
        match self {
            ServerFrame::Connect { .. } => "connect",
            ServerFrame::RoomStateUpdate { .. } => "room-state-update",
            ServerFrame::ReceiveMessage { .. } => "receive message",
            ServerFrame::Action { .. } => "action",
        }
    }
}

/// Parsed view of a relay frame that carries peer state
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    RoomState(SharedState),
    Broadcast(SharedState),
    Action {
        name: String,
        payload: serde_json::Value,
    },
}

impl Envelope {
    /// Returns `Ok(None)` for frames that carry no peer state
    pub fn parse(frame: ServerFrame) -> Result<Option<Envelope>, ProtocolError> {
        match frame {
            ServerFrame::Connect { .. } => Ok(None),
            ServerFrame::RoomStateUpdate { state } => SharedState::from_json(&state)
                .map(|s| Some(Envelope::RoomState(s)))
                .map_err(ProtocolError::MalformedPayload),
            ServerFrame::ReceiveMessage { state } => SharedState::from_json(&state)
                .map(|s| Some(Envelope::Broadcast(s)))
                .map_err(ProtocolError::MalformedPayload),
            ServerFrame::Action { name, payload } => Ok(Some(Envelope::Action { name, payload })),
        }
    }
}
