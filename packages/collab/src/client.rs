//! Editor client with room collaboration.
//!
//! Ties the pieces together the way the editor panels use them: a user
//! intent goes through the [`LocalMutator`] against the shared store, and
//! when a room is joined the matching named action is announced to peers.
//! The full-state broadcast follows from the store subscription.

use crate::config::RelayConfig;
use crate::relay::RelayEvent;
use crate::session::{RoomSession, SessionError, SessionState};
use crate::shared::{lock_store, shared_store, SharedStore};
use crate::transport::Connector;
use reactype_editor::{Action, EditorResult, LocalMutator, MutationResult, Store, StoreState};
use tokio::sync::mpsc;
use tracing::warn;

pub struct CollabClient<C: Connector> {
    store: SharedStore,
    mutator: LocalMutator,
    session: RoomSession<C>,
}

impl<C: Connector> CollabClient<C> {
    pub fn new(connector: C, config: RelayConfig) -> Self {
        Self::with_store(connector, Store::new(), config)
    }

    pub fn with_store(connector: C, store: Store, config: RelayConfig) -> Self {
        let store = shared_store(store);
        let session = RoomSession::new(connector, store.clone(), config);
        Self {
            store,
            mutator: LocalMutator::new(),
            session,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Copy of the current store state
    pub fn snapshot(&self) -> StoreState {
        lock_store(&self.store).state().clone()
    }

    pub fn session(&self) -> &RoomSession<C> {
        &self.session
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn take_event_rx(&mut self) -> Option<mpsc::UnboundedReceiver<RelayEvent>> {
        self.session.take_event_rx()
    }

    pub async fn join_room(&mut self, code: impl Into<String>) -> Result<(), SessionError> {
        self.session.join_room(code).await
    }

    pub fn leave_room(&mut self) {
        self.session.leave_room();
    }

    /// Apply a user intent and announce it to the room
    pub fn apply(&mut self, action: Action) -> EditorResult<MutationResult> {
        let result = {
            let mut store = lock_store(&self.store);
            self.mutator.apply(&mut store, action)?
        };

        if let Err(e) = self.session.emit_action(&result.action) {
            warn!(action = result.action.name(), error = %e, "could not announce action");
        }
        Ok(result)
    }

    pub fn undo(&mut self) -> EditorResult<bool> {
        let mut store = lock_store(&self.store);
        self.mutator.undo(&mut store)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        let mut store = lock_store(&self.store);
        self.mutator.redo(&mut store)
    }
}
