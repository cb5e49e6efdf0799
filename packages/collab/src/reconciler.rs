//! Folding peer state into the local store.
//!
//! A generic broadcast replaces at most one slice: the first one, in
//! [`Slice::PRIORITY`] order, that differs from local state. Any other
//! differing slices in the same payload are left alone until a later event
//! carries them. This is last-writer-wins at slice granularity; two peers
//! editing different parts of one slice can overwrite each other.
//!
//! A `room-state-update` is authoritative and replaces all three slices.

use reactype_editor::{Action, ActionError, SharedState, Slice, Store, StoreState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Payload matched local state
    Unchanged,
    /// One slice was replaced
    Replaced(Slice),
    /// All slices were replaced from a room baseline
    Baseline,
}

pub struct Reconciler;

impl Reconciler {
    /// First slice in priority order where `incoming` differs from `local`
    pub fn first_difference(local: &StoreState, incoming: &SharedState) -> Option<Slice> {
        Slice::PRIORITY
            .into_iter()
            .find(|slice| local.differs_from(incoming, *slice))
    }

    /// Apply a peer broadcast, replacing only the first differing slice
    pub fn reconcile(
        store: &mut Store,
        incoming: &SharedState,
    ) -> Result<ReconcileOutcome, ActionError> {
        let Some(slice) = Self::first_difference(store.state(), incoming) else {
            return Ok(ReconcileOutcome::Unchanged);
        };

        let action = match slice {
            Slice::AppState => Action::ReplaceAppState(Box::new(incoming.app_state.clone())),
            Slice::CodePreview => Action::ReplaceCodePreview(incoming.code_preview.clone()),
            Slice::Style => Action::ReplaceStyle(incoming.style.clone()),
        };
        store.dispatch_remote(action)?;

        Ok(ReconcileOutcome::Replaced(slice))
    }

    /// Adopt a room's authoritative state
    pub fn apply_baseline(
        store: &mut Store,
        incoming: SharedState,
    ) -> Result<ReconcileOutcome, ActionError> {
        store.dispatch_remote(Action::ReplaceShared(Box::new(incoming)))?;
        Ok(ReconcileOutcome::Baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactype_editor::{ChangeOrigin, Component, StyleState};
    use std::sync::{Arc, Mutex};

    fn remote_with_everything_changed(store: &Store) -> SharedState {
        let mut incoming = store.shared_state();
        incoming
            .app_state
            .components
            .push(Component::new(2, "Row", false));
        incoming.app_state.next_component_id = 3;
        incoming.code_preview.input = "const Row = () => null;".to_string();
        incoming.style.style = "body { margin: 0 }".to_string();
        incoming
    }

    #[test]
    fn test_first_difference_wins() {
        let mut store = Store::new();
        let incoming = remote_with_everything_changed(&store);

        let outcome = Reconciler::reconcile(&mut store, &incoming).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Replaced(Slice::AppState));
        assert_eq!(store.state().app_state, incoming.app_state);
        assert_eq!(store.state().code_preview.input, "");
        assert_eq!(store.state().style, StyleState::default());
    }

    #[test]
    fn test_repeated_events_walk_down_the_slices() {
        let mut store = Store::new();
        let incoming = remote_with_everything_changed(&store);

        let outcomes: Vec<_> = (0..4)
            .map(|_| Reconciler::reconcile(&mut store, &incoming).unwrap())
            .collect();

        assert_eq!(
            outcomes,
            vec![
                ReconcileOutcome::Replaced(Slice::AppState),
                ReconcileOutcome::Replaced(Slice::CodePreview),
                ReconcileOutcome::Replaced(Slice::Style),
                ReconcileOutcome::Unchanged,
            ]
        );
        assert_eq!(store.shared_state(), incoming);
    }

    #[test]
    fn test_only_style_differs() {
        let mut store = Store::new();
        let mut incoming = store.shared_state();
        incoming.style.style = "p { color: blue }".to_string();

        let outcome = Reconciler::reconcile(&mut store, &incoming).unwrap();
        assert_eq!(outcome, ReconcileOutcome::Replaced(Slice::Style));
    }

    #[test]
    fn test_identical_payload_does_not_dispatch() {
        let mut store = Store::new();
        let incoming = store.shared_state();
        assert_eq!(
            Reconciler::reconcile(&mut store, &incoming).unwrap(),
            ReconcileOutcome::Unchanged
        );
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_baseline_replaces_all_slices_once() {
        let mut store = Store::new();
        let origins = Arc::new(Mutex::new(Vec::new()));
        let sink = origins.clone();
        store.subscribe(move |change| sink.lock().unwrap().push(change.origin));

        let incoming = remote_with_everything_changed(&store);
        let outcome = Reconciler::apply_baseline(&mut store, incoming.clone()).unwrap();

        assert_eq!(outcome, ReconcileOutcome::Baseline);
        assert_eq!(store.shared_state(), incoming);
        assert_eq!(*origins.lock().unwrap(), vec![ChangeOrigin::Remote]);
    }
}
