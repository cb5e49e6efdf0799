//! # Document Store
//!
//! Single container for every slice the editor renders from. All writes go
//! through `dispatch`, which applies an action to a copy of the state and
//! swaps the copy in only if the action succeeded, so a failed action never
//! leaves a half-applied state behind.
//!
//! Subscribers are notified synchronously after each successful dispatch.
//! The origin tag lets a relay tell local edits from reconciled peer state.

use crate::actions::{Action, ActionError};
use crate::document::{AppState, CanvasFocus, Component};
use crate::slices::{CodePreviewState, ContextState, SharedState, Slice, StyleState};
use tracing::debug;

/// Everything the store holds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub app_state: AppState,
    pub code_preview: CodePreviewState,
    pub style: StyleState,
    pub context: ContextState,
    pub canvas_focus: CanvasFocus,
}

impl StoreState {
    /// Copy of the relayed slices
    pub fn shared(&self) -> SharedState {
        SharedState {
            app_state: self.app_state.clone(),
            code_preview: self.code_preview.clone(),
            style: self.style.clone(),
        }
    }

    pub fn focused_component(&self) -> Option<&Component> {
        self.app_state.component(self.canvas_focus.component_id)
    }

    /// Whether `slice` differs between this state and `incoming`
    pub fn differs_from(&self, incoming: &SharedState, slice: Slice) -> bool {
        match slice {
            Slice::AppState => self.app_state != incoming.app_state,
            Slice::CodePreview => self.code_preview != incoming.code_preview,
            Slice::Style => self.style != incoming.style,
        }
    }

    /// Point focus at something that exists after the document was swapped
    pub(crate) fn repair_focus(&mut self) {
        let app = &self.app_state;
        match app.component(self.canvas_focus.component_id) {
            Some(component) => {
                if let Some(child_id) = self.canvas_focus.child_id {
                    if component.find_child(child_id).is_none() {
                        self.canvas_focus.child_id = None;
                    }
                }
            }
            None => {
                let fallback = app
                    .root_components
                    .first()
                    .copied()
                    .or_else(|| app.components.first().map(|c| c.id));
                self.canvas_focus = match fallback {
                    Some(component_id) => CanvasFocus {
                        component_id,
                        child_id: None,
                    },
                    None => CanvasFocus::default(),
                };
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Produced by this client
    Local,
    /// Applied from peer state
    Remote,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub version: u64,
    pub action: &'static str,
    pub origin: ChangeOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&StoreChange) + Send>;

pub struct Store {
    state: StoreState,
    version: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state,
            version: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &StoreState {
        &self.state
    }

    pub fn get_state(&self) -> &StoreState {
        self.state()
    }

    /// Number of successful dispatches so far
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn shared_state(&self) -> SharedState {
        self.state.shared()
    }

    /// Apply a locally produced action
    pub fn dispatch(&mut self, action: Action) -> Result<&StoreState, ActionError> {
        self.dispatch_from(action, ChangeOrigin::Local)
    }

    /// Apply an action carrying peer state
    pub fn dispatch_remote(&mut self, action: Action) -> Result<&StoreState, ActionError> {
        self.dispatch_from(action, ChangeOrigin::Remote)
    }

    fn dispatch_from(
        &mut self,
        action: Action,
        origin: ChangeOrigin,
    ) -> Result<&StoreState, ActionError> {
        let mut next = self.state.clone();
        action.apply(&mut next)?;

        self.state = next;
        self.version += 1;

        debug!(action = action.name(), version = self.version, ?origin, "dispatched");

        let change = StoreChange {
            version: self.version,
            action: action.name(),
            origin,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }

        Ok(&self.state)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreChange) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .field("state", &self.state)
            .finish()
    }
}
