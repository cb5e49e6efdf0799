//! # Snapshot History
//!
//! Undo/redo for the document, kept separately for every focus index.
//!
//! ## Design
//!
//! - A full copy of the document is taken before each document-changing intent
//! - Undo pushes the current document onto the future stack and returns the
//!   most recent snapshot
//! - Redo is the mirror image
//! - Taking a snapshot clears the future stack for that focus index
//! - Snapshots are shared immutable values; nothing mutates one after capture
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = SnapshotHistory::new();
//!
//! history.take_snapshot(0, &store.state().app_state);
//! store.dispatch(action)?;
//!
//! if let Some(previous) = history.undo(0, &store.state().app_state) {
//!     store.dispatch(Action::ReplaceAppState(Box::new(previous)))?;
//! }
//! ```

use crate::document::AppState;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable copy of the document
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot(Arc<AppState>);

impl Snapshot {
    pub fn capture(document: &AppState) -> Self {
        Self(Arc::new(document.clone()))
    }

    pub fn document(&self) -> &AppState {
        &self.0
    }

    pub fn into_document(self) -> AppState {
        Arc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// Per-focus undo/redo stacks
#[derive(Debug)]
pub struct SnapshotHistory {
    /// Most recent last
    past: HashMap<usize, Vec<Snapshot>>,

    /// Most recently undone last
    future: HashMap<usize, Vec<Snapshot>>,

    /// Maximum snapshots kept per focus index (0 = unlimited)
    max_levels: usize,
}

impl SnapshotHistory {
    /// Unbounded history: every change can be undone back to the start
    pub fn new() -> Self {
        Self::with_max_levels(0)
    }

    /// Keep at most `max_levels` snapshots per focus index, dropping the
    /// oldest. Undo then stops short of the initial document.
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            past: HashMap::new(),
            future: HashMap::new(),
            max_levels,
        }
    }

    /// Record the document as it is before a change
    pub fn take_snapshot(&mut self, focus_index: usize, current: &AppState) {
        let past = self.past.entry(focus_index).or_default();
        past.push(Snapshot::capture(current));

        if self.max_levels > 0 && past.len() > self.max_levels {
            past.remove(0);
        }

        // A new change invalidates the redo path
        self.future.remove(&focus_index);
    }

    /// Drop the snapshot taken for a change that did not go through
    pub fn discard_latest(&mut self, focus_index: usize) -> bool {
        self.past
            .get_mut(&focus_index)
            .and_then(|past| past.pop())
            .is_some()
    }

    /// Step back. Returns the document to restore, or None if there is
    /// nothing to undo for this focus index.
    pub fn undo(&mut self, focus_index: usize, current: &AppState) -> Option<AppState> {
        let previous = self.past.get_mut(&focus_index)?.pop()?;
        self.future
            .entry(focus_index)
            .or_default()
            .push(Snapshot::capture(current));
        Some(previous.into_document())
    }

    /// Step forward again after an undo
    pub fn redo(&mut self, focus_index: usize, current: &AppState) -> Option<AppState> {
        let next = self.future.get_mut(&focus_index)?.pop()?;
        self.past
            .entry(focus_index)
            .or_default()
            .push(Snapshot::capture(current));
        Some(next.into_document())
    }

    pub fn can_undo(&self, focus_index: usize) -> bool {
        self.undo_levels(focus_index) > 0
    }

    pub fn can_redo(&self, focus_index: usize) -> bool {
        self.redo_levels(focus_index) > 0
    }

    pub fn undo_levels(&self, focus_index: usize) -> usize {
        self.past.get(&focus_index).map_or(0, Vec::len)
    }

    pub fn redo_levels(&self, focus_index: usize) -> usize {
        self.future.get(&focus_index).map_or(0, Vec::len)
    }

    /// Clear all undo/redo history
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new()
    }
}
