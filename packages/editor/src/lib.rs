//! # ReacType Editor
//!
//! Client-side state core for the ReacType component builder.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ user intent: drag, drop, rename, undo       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutator: validate → snapshot → dispatch     │
//! │  - Component name rules                     │
//! │  - Nesting / re-parenting checks            │
//! │  - Per-focus undo/redo history              │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ store: slices + subscribers                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Store is source of truth**: every view derives from `StoreState`
//! 2. **Atomic dispatch**: an action applies completely or not at all
//! 3. **Snapshots, not inverses**: undo restores a whole copy of the document
//! 4. **Focus is local**: canvas focus never leaves the client
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reactype_editor::{Action, ChildKind, LocalMutator, Store};
//!
//! let mut store = Store::new();
//! let mut mutator = LocalMutator::new();
//!
//! mutator.apply(&mut store, Action::AddChild {
//!     kind: ChildKind::HtmlElement,
//!     type_id: 11,
//!     child_id: None,
//! })?;
//!
//! mutator.undo(&mut store)?;
//! ```

mod actions;
mod document;
mod errors;
mod history;
mod mutator;
mod slices;
mod store;
mod validation;

pub use actions::{Action, ActionError};
pub use document::{
    default_html_types, AppState, CanvasFocus, Child, ChildId, ChildKind, Component, ComponentId,
    HtmlType, PassedInProp, ProjectType, StateEntry, StateId, StateType, ROOT_COMPONENT_ID,
};
pub use errors::{EditorError, EditorResult};
pub use history::{Snapshot, SnapshotHistory};
pub use mutator::{LocalMutator, MutationResult};
pub use slices::{
    CodePreviewState, ContextEntry, ContextState, ContextValue, SharedState, Slice, StyleState,
};
pub use store::{ChangeOrigin, Listener, Store, StoreChange, StoreState, SubscriptionId};
pub use validation::{
    can_nest_component, format_component_name, is_valid_new_parent, validate_component_name,
    validate_intent, ValidationError,
};
