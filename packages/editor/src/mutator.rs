//! # Local Mutator
//!
//! Entry point for user intents. Every intent runs the same pipeline:
//!
//! 1. Intent validation (names, nesting, re-parenting)
//! 2. Structural validation against the current state
//! 3. Snapshot of the document, for intents that change it
//! 4. Dispatch
//!
//! Nothing is snapshotted or dispatched for a rejected intent.

use crate::actions::Action;
use crate::errors::EditorResult;
use crate::history::SnapshotHistory;
use crate::store::{Store, StoreState};
use crate::validation::{format_component_name, validate_intent};
use tracing::debug;

/// Outcome of an applied intent
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Store version after the dispatch
    pub version: u64,

    /// The action as dispatched (names are normalized)
    pub action: Action,

    /// Whether an undo snapshot was recorded
    pub snapshotted: bool,
}

#[derive(Debug, Default)]
pub struct LocalMutator {
    history: SnapshotHistory,
}

impl LocalMutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: SnapshotHistory) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    /// Validate, snapshot and dispatch a user intent
    pub fn apply(&mut self, store: &mut Store, action: Action) -> EditorResult<MutationResult> {
        let action = match Self::prepare(store.state(), action) {
            Ok(action) => action,
            Err(err) => {
                debug!(error = %err, "intent rejected");
                return Err(err);
            }
        };

        let focus_index = store.state().canvas_focus.focus_index();
        let snapshotted = action.touches_document();
        if snapshotted {
            self.history
                .take_snapshot(focus_index, &store.state().app_state);
        }

        if let Err(err) = store.dispatch(action.clone()) {
            if snapshotted {
                self.history.discard_latest(focus_index);
            }
            return Err(err.into());
        }

        Ok(MutationResult {
            version: store.version(),
            action,
            snapshotted,
        })
    }

    /// Restore the previous document for the focused component.
    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self, store: &mut Store) -> EditorResult<bool> {
        let focus_index = store.state().canvas_focus.focus_index();
        match self.history.undo(focus_index, &store.state().app_state) {
            Some(previous) => {
                store.dispatch(Action::ReplaceAppState(Box::new(previous)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply the most recently undone document
    pub fn redo(&mut self, store: &mut Store) -> EditorResult<bool> {
        let focus_index = store.state().canvas_focus.focus_index();
        match self.history.redo(focus_index, &store.state().app_state) {
            Some(next) => {
                store.dispatch(Action::ReplaceAppState(Box::new(next)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn prepare(state: &StoreState, action: Action) -> EditorResult<Action> {
        validate_intent(state, &action)?;

        let action = match action {
            Action::AddComponent { component_name, root } => Action::AddComponent {
                component_name: format_component_name(
                    &component_name,
                    state.app_state.project_type,
                ),
                root,
            },
            other => other,
        };

        action.validate(state)?;
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionError;
    use crate::document::ChildKind;
    use crate::errors::EditorError;
    use crate::validation::ValidationError;

    #[test]
    fn test_apply_snapshots_document_changes() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();

        let result = mutator
            .apply(
                &mut store,
                Action::AddComponent {
                    component_name: "row".to_string(),
                    root: false,
                },
            )
            .unwrap();

        assert!(result.snapshotted);
        assert_eq!(result.version, 1);
        assert_eq!(mutator.history().undo_levels(0), 1);
        assert!(store.state().app_state.component_by_name("Row").is_some());
    }

    #[test]
    fn test_slice_edits_are_not_snapshotted() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();

        let result = mutator
            .apply(
                &mut store,
                Action::UpdateCss {
                    style: "h1 {}".to_string(),
                },
            )
            .unwrap();

        assert!(!result.snapshotted);
        assert!(!mutator.history().can_undo(0));
    }

    #[test]
    fn test_rejected_name_leaves_everything_untouched() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();
        let before = store.state().clone();

        let err = mutator
            .apply(
                &mut store,
                Action::AddComponent {
                    component_name: "9lives".to_string(),
                    root: false,
                },
            )
            .unwrap_err();

        assert!(matches!(
            err,
            EditorError::Validation(ValidationError::NameMustStartWithLetter)
        ));
        assert_eq!(
            err.user_message().as_deref(),
            Some("Component name must start with a letter.")
        );
        assert_eq!(store.state(), &before);
        assert_eq!(store.version(), 0);
        assert!(!mutator.history().can_undo(0));
    }

    #[test]
    fn test_structural_failure_takes_no_snapshot() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();

        let result = mutator.apply(
            &mut store,
            Action::AddChild {
                kind: ChildKind::HtmlElement,
                type_id: 11,
                child_id: Some(404),
            },
        );

        assert!(matches!(result, Err(EditorError::Action(_))));
        assert!(!mutator.history().can_undo(0));
    }

    #[test]
    fn test_peer_document_with_exhausted_counter() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();

        let mut peer = store.state().app_state.clone();
        peer.next_child_id = u32::MAX;
        store
            .dispatch_remote(Action::ReplaceAppState(Box::new(peer)))
            .unwrap();
        let before = store.state().clone();
        let version = store.version();

        let result = mutator.apply(
            &mut store,
            Action::AddChild {
                kind: ChildKind::HtmlElement,
                type_id: 11,
                child_id: None,
            },
        );

        assert!(matches!(
            result,
            Err(EditorError::Action(ActionError::InvalidStructure(_)))
        ));
        assert_eq!(store.state(), &before);
        assert_eq!(store.version(), version);
        assert!(!mutator.history().can_undo(0));
    }

    #[test]
    fn test_undo_redo_round() {
        let mut store = Store::new();
        let mut mutator = LocalMutator::new();
        let initial = store.state().app_state.clone();

        mutator
            .apply(
                &mut store,
                Action::AddChild {
                    kind: ChildKind::HtmlElement,
                    type_id: 11,
                    child_id: None,
                },
            )
            .unwrap();
        let edited = store.state().app_state.clone();

        assert!(mutator.undo(&mut store).unwrap());
        assert_eq!(store.state().app_state, initial);

        assert!(mutator.redo(&mut store).unwrap());
        assert_eq!(store.state().app_state, edited);

        assert!(!mutator.redo(&mut store).unwrap());
    }
}
