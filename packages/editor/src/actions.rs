//! # Store Actions
//!
//! The closed set of operations the document store understands.
//!
//! ## Action Semantics
//!
//! ### Canvas actions
//! - Operate on the focused component (`StoreState::canvas_focus`)
//! - `AddChild` appends to the component root or to a nestable container
//! - `ChangePosition` fails if the new parent sits inside the moved child
//! - `DeleteChild` drops the whole subtree and clears focus pointing into it
//!
//! ### State and props
//! - State ids are global; a passed-in prop keeps the id of its source entry
//! - Deleting a state entry removes every passed-in prop derived from it
//! - Deleting a passed-in prop cascades to components instantiated below
//!
//! ### Replacement actions
//! - Used by reconciliation and undo/redo, never by user intent
//! - Swap a whole slice and repair focus if it no longer resolves

use crate::document::{
    AppState, Child, ChildId, ChildKind, Component, ComponentId, PassedInProp, ProjectType,
    StateEntry, StateId, StateType,
};
use crate::slices::{CodePreviewState, ContextEntry, ContextValue, SharedState, StyleState};
use crate::store::StoreState;
use crate::validation::capitalize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    /// Create a component (already validated and formatted)
    AddComponent { component_name: String, root: bool },

    /// Drop a new node onto the focused component, optionally into a container
    AddChild {
        kind: ChildKind,
        type_id: u32,
        child_id: Option<ChildId>,
    },

    /// Move a node within the focused component. `None` means the component root.
    ChangePosition {
        current_child_id: ChildId,
        new_parent_child_id: Option<ChildId>,
    },

    ChangeFocus {
        component_id: ComponentId,
        child_id: Option<ChildId>,
    },

    DeleteChild { child_id: ChildId },

    AddState {
        key: String,
        value: serde_json::Value,
        kind: StateType,
    },

    DeleteState { state_id: StateId },

    /// Thread a state entry (or a prop the focused component received) into
    /// a component instantiated by the focused component
    AddPassedInProps {
        child_component_id: ComponentId,
        state_id: StateId,
        with_hook: bool,
    },

    DeletePassedInProps { row_id: StateId },

    AddContext { name: String },

    AddContextValues {
        name: String,
        input_key: String,
        input_value: String,
    },

    UpdateCodePreview { input: String },

    UpdateCss { style: String },

    ChangeProjectType { project_type: ProjectType },

    ReplaceAppState(Box<AppState>),

    ReplaceCodePreview(CodePreviewState),

    ReplaceStyle(StyleState),

    /// Replace all three shared slices in one dispatch
    ReplaceShared(Box<SharedState>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    #[error("Child not found: {0}")]
    ChildNotFound(ChildId),

    #[error("State not found: {0}")]
    StateNotFound(StateId),

    #[error("Passed-in prop not found: {0}")]
    PassedInPropNotFound(StateId),

    #[error("Context not found: {0}")]
    ContextNotFound(String),

    #[error("HTML type not found: {0}")]
    HtmlTypeNotFound(u32),

    #[error("State key already exists: {0}")]
    DuplicateStateKey(String),

    #[error("Would create cycle")]
    CycleDetected,

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
}

impl Action {
    /// Reducer name, as listeners see it
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddComponent { .. } => "addComponent",
            Action::AddChild { .. } => "addChild",
            Action::ChangePosition { .. } => "changePosition",
            Action::ChangeFocus { .. } => "changeFocus",
            Action::DeleteChild { .. } => "deleteChild",
            Action::AddState { .. } => "addState",
            Action::DeleteState { .. } => "deleteState",
            Action::AddPassedInProps { .. } => "addPassedInProps",
            Action::DeletePassedInProps { .. } => "deletePassedInProps",
            Action::AddContext { .. } => "addContext",
            Action::AddContextValues { .. } => "addContextValues",
            Action::UpdateCodePreview { .. } => "updateCodePreview",
            Action::UpdateCss { .. } => "updateStylesheet",
            Action::ChangeProjectType { .. } => "changeProjectType",
            Action::ReplaceAppState(_) => "allCooperativeState",
            Action::ReplaceCodePreview(_) => "codePreviewCooperative",
            Action::ReplaceStyle(_) => "cooperativeStyle",
            Action::ReplaceShared(_) => "roomStateUpdate",
        }
    }

    /// Named event announcing this intent to peers, if it has one
    pub fn broadcast_event(&self) -> Option<String> {
        match self {
            Action::AddComponent { .. }
            | Action::AddChild { .. }
            | Action::ChangePosition { .. }
            | Action::ChangeFocus { .. }
            | Action::DeleteChild { .. }
            | Action::AddState { .. }
            | Action::DeleteState { .. }
            | Action::AddPassedInProps { .. }
            | Action::DeletePassedInProps { .. }
            | Action::ChangeProjectType { .. } => Some(format!("{}Action", self.name())),
            _ => None,
        }
    }

    /// Whether the action edits the document and so needs an undo snapshot
    pub fn touches_document(&self) -> bool {
        matches!(
            self,
            Action::AddComponent { .. }
                | Action::AddChild { .. }
                | Action::ChangePosition { .. }
                | Action::DeleteChild { .. }
                | Action::AddState { .. }
                | Action::DeleteState { .. }
                | Action::AddPassedInProps { .. }
                | Action::DeletePassedInProps { .. }
                | Action::ChangeProjectType { .. }
        )
    }

    /// Apply to the store state with validation
    pub fn apply(&self, state: &mut StoreState) -> Result<(), ActionError> {
        self.validate(state)?;

        match self {
            Action::AddComponent { component_name, root } => {
                Self::apply_add_component(&mut state.app_state, component_name, *root)
            }

            Action::AddChild { kind, type_id, child_id } => {
                Self::apply_add_child(state, *kind, *type_id, *child_id)
            }

            Action::ChangePosition { current_child_id, new_parent_child_id } => {
                Self::apply_change_position(state, *current_child_id, *new_parent_child_id)
            }

            Action::ChangeFocus { component_id, child_id } => {
                state.canvas_focus.component_id = *component_id;
                state.canvas_focus.child_id = *child_id;
                Ok(())
            }

            Action::DeleteChild { child_id } => Self::apply_delete_child(state, *child_id),

            Action::AddState { key, value, kind } => {
                let focus = state.canvas_focus.component_id;
                let app = &mut state.app_state;
                let id = allocate_id(&mut app.next_state_id, "state")?;
                focused_mut(app, focus)?.state_props.push(StateEntry {
                    id,
                    key: key.clone(),
                    value: value.clone(),
                    kind: *kind,
                });
                Ok(())
            }

            Action::DeleteState { state_id } => {
                let focus = state.canvas_focus.component_id;
                let app = &mut state.app_state;
                focused_mut(app, focus)?
                    .state_props
                    .retain(|entry| entry.id != *state_id);
                for component in app.components.iter_mut() {
                    component.passed_in_props.retain(|prop| prop.id != *state_id);
                }
                Ok(())
            }

            Action::AddPassedInProps { child_component_id, state_id, with_hook } => {
                Self::apply_add_passed_in_props(state, *child_component_id, *state_id, *with_hook)
            }

            Action::DeletePassedInProps { row_id } => {
                let focus = state.canvas_focus.component_id;
                let app = &mut state.app_state;
                let below = app.descendants_of(focus);
                focused_mut(app, focus)?
                    .passed_in_props
                    .retain(|prop| prop.id != *row_id);
                for id in below {
                    if let Some(component) = app.component_mut(id) {
                        component.passed_in_props.retain(|prop| prop.id != *row_id);
                    }
                }
                Ok(())
            }

            Action::AddContext { name } => {
                if state.context.find(name).is_none() {
                    state.context.contexts.push(ContextEntry {
                        name: name.clone(),
                        values: Vec::new(),
                    });
                }
                Ok(())
            }

            Action::AddContextValues { name, input_key, input_value } => {
                let context = state
                    .context
                    .find_mut(name)
                    .ok_or_else(|| ActionError::ContextNotFound(name.clone()))?;
                context.values.push(ContextValue {
                    key: input_key.clone(),
                    value: input_value.clone(),
                });
                Ok(())
            }

            Action::UpdateCodePreview { input } => {
                state.code_preview.input = input.clone();
                Ok(())
            }

            Action::UpdateCss { style } => {
                state.style.style = style.clone();
                Ok(())
            }

            Action::ChangeProjectType { project_type } => {
                state.app_state.project_type = *project_type;
                Ok(())
            }

            Action::ReplaceAppState(app_state) => {
                state.app_state = app_state.as_ref().clone();
                state.repair_focus();
                Ok(())
            }

            Action::ReplaceCodePreview(code_preview) => {
                state.code_preview = code_preview.clone();
                Ok(())
            }

            Action::ReplaceStyle(style) => {
                state.style = style.clone();
                Ok(())
            }

            Action::ReplaceShared(shared) => {
                state.app_state = shared.app_state.clone();
                state.code_preview = shared.code_preview.clone();
                state.style = shared.style.clone();
                state.repair_focus();
                Ok(())
            }
        }
    }

    /// Check structural constraints without applying
    pub fn validate(&self, state: &StoreState) -> Result<(), ActionError> {
        let app = &state.app_state;
        let focus = state.canvas_focus.component_id;

        match self {
            Action::AddComponent { component_name, .. } => {
                ensure_id_available(app.next_component_id, "component")?;
                if component_name.is_empty() {
                    return Err(ActionError::InvalidStructure(
                        "Component name is empty".to_string(),
                    ));
                }
                if app.component_by_name(component_name).is_some() {
                    return Err(ActionError::InvalidStructure(format!(
                        "Component {} already exists",
                        component_name
                    )));
                }
                Ok(())
            }

            Action::AddChild { kind, type_id, child_id } => {
                let component = focused(app, focus)?;
                ensure_id_available(app.next_child_id, "child")?;

                match kind {
                    ChildKind::HtmlElement => {
                        app.html_type(*type_id)
                            .ok_or(ActionError::HtmlTypeNotFound(*type_id))?;
                    }
                    ChildKind::Component => {
                        app.component(*type_id)
                            .ok_or(ActionError::ComponentNotFound(*type_id))?;
                        if app.reaches(*type_id, focus) {
                            return Err(ActionError::CycleDetected);
                        }
                    }
                    ChildKind::RouteLink => {
                        let target = app
                            .component(*type_id)
                            .ok_or(ActionError::ComponentNotFound(*type_id))?;
                        if !target.root {
                            return Err(ActionError::InvalidStructure(
                                "Route links must point at a root component".to_string(),
                            ));
                        }
                    }
                }

                if let Some(target) = child_id {
                    let container = component
                        .find_child(*target)
                        .ok_or(ActionError::ChildNotFound(*target))?;
                    if !app.is_nestable(container) {
                        return Err(ActionError::InvalidStructure(format!(
                            "{} cannot hold children",
                            container.name
                        )));
                    }
                }
                Ok(())
            }

            Action::ChangePosition { current_child_id, new_parent_child_id } => {
                let component = focused(app, focus)?;
                let moving = component
                    .find_child(*current_child_id)
                    .ok_or(ActionError::ChildNotFound(*current_child_id))?;

                if let Some(parent_id) = new_parent_child_id {
                    if moving.contains(*parent_id) {
                        return Err(ActionError::CycleDetected);
                    }
                    let parent = component
                        .find_child(*parent_id)
                        .ok_or(ActionError::ChildNotFound(*parent_id))?;
                    if !app.is_nestable(parent) {
                        return Err(ActionError::InvalidStructure(format!(
                            "{} cannot hold children",
                            parent.name
                        )));
                    }
                }
                Ok(())
            }

            Action::ChangeFocus { component_id, child_id } => {
                let component = app
                    .component(*component_id)
                    .ok_or(ActionError::ComponentNotFound(*component_id))?;
                if let Some(id) = child_id {
                    component
                        .find_child(*id)
                        .ok_or(ActionError::ChildNotFound(*id))?;
                }
                Ok(())
            }

            Action::DeleteChild { child_id } => {
                focused(app, focus)?
                    .find_child(*child_id)
                    .ok_or(ActionError::ChildNotFound(*child_id))?;
                Ok(())
            }

            Action::AddState { key, .. } => {
                let component = focused(app, focus)?;
                ensure_id_available(app.next_state_id, "state")?;
                if key.trim().is_empty() {
                    return Err(ActionError::InvalidStructure(
                        "State key is empty".to_string(),
                    ));
                }
                if component.state_props.iter().any(|entry| entry.key == *key) {
                    return Err(ActionError::DuplicateStateKey(key.clone()));
                }
                Ok(())
            }

            Action::DeleteState { state_id } => {
                let component = focused(app, focus)?;
                if !component.state_props.iter().any(|entry| entry.id == *state_id) {
                    return Err(ActionError::StateNotFound(*state_id));
                }
                Ok(())
            }

            Action::AddPassedInProps { child_component_id, state_id, .. } => {
                let component = focused(app, focus)?;
                prop_source(component, *state_id).ok_or(ActionError::StateNotFound(*state_id))?;
                app.component(*child_component_id)
                    .ok_or(ActionError::ComponentNotFound(*child_component_id))?;
                if !component.instantiates(*child_component_id) {
                    return Err(ActionError::InvalidStructure(format!(
                        "Component {} is not rendered by component {}",
                        child_component_id, component.id
                    )));
                }
                Ok(())
            }

            Action::DeletePassedInProps { row_id } => {
                let component = focused(app, focus)?;
                if !component.passed_in_props.iter().any(|prop| prop.id == *row_id) {
                    return Err(ActionError::PassedInPropNotFound(*row_id));
                }
                Ok(())
            }

            Action::AddContext { name } => {
                if name.trim().is_empty() {
                    return Err(ActionError::InvalidStructure(
                        "Context name is empty".to_string(),
                    ));
                }
                Ok(())
            }

            Action::AddContextValues { name, input_key, .. } => {
                state
                    .context
                    .find(name)
                    .ok_or_else(|| ActionError::ContextNotFound(name.clone()))?;
                if input_key.trim().is_empty() {
                    return Err(ActionError::InvalidStructure(
                        "Context key is empty".to_string(),
                    ));
                }
                Ok(())
            }

            Action::UpdateCodePreview { .. }
            | Action::UpdateCss { .. }
            | Action::ChangeProjectType { .. }
            | Action::ReplaceAppState(_)
            | Action::ReplaceCodePreview(_)
            | Action::ReplaceStyle(_)
            | Action::ReplaceShared(_) => Ok(()),
        }
    }

    fn apply_add_component(app: &mut AppState, name: &str, root: bool) -> Result<(), ActionError> {
        let id = allocate_id(&mut app.next_component_id, "component")?;
        app.components.push(Component::new(id, name, root));
        if root {
            app.root_components.push(id);
        }
        Ok(())
    }

    fn apply_add_child(
        state: &mut StoreState,
        kind: ChildKind,
        type_id: u32,
        target: Option<ChildId>,
    ) -> Result<(), ActionError> {
        let focus = state.canvas_focus.component_id;
        let app = &mut state.app_state;

        let name = match kind {
            ChildKind::HtmlElement => app
                .html_type(type_id)
                .map(|h| h.name.clone())
                .ok_or(ActionError::HtmlTypeNotFound(type_id))?,
            ChildKind::Component | ChildKind::RouteLink => app
                .component(type_id)
                .map(|c| c.name.clone())
                .ok_or(ActionError::ComponentNotFound(type_id))?,
        };

        let child_id = allocate_id(&mut app.next_child_id, "child")?;
        let node = Child::new(child_id, kind, type_id, name);

        let component = focused_mut(app, focus)?;
        match target {
            None => component.children.push(node),
            Some(id) => component
                .find_child_mut(id)
                .ok_or(ActionError::ChildNotFound(id))?
                .children
                .push(node),
        }
        Ok(())
    }

    fn apply_change_position(
        state: &mut StoreState,
        current_child_id: ChildId,
        new_parent: Option<ChildId>,
    ) -> Result<(), ActionError> {
        let focus = state.canvas_focus.component_id;
        let component = focused_mut(&mut state.app_state, focus)?;

        // Detach first; the node is re-inserted under its new parent
        let node = component
            .remove_child(current_child_id)
            .ok_or(ActionError::ChildNotFound(current_child_id))?;

        match new_parent {
            None => component.children.push(node),
            Some(id) => component
                .find_child_mut(id)
                .ok_or(ActionError::ChildNotFound(id))?
                .children
                .push(node),
        }
        Ok(())
    }

    fn apply_delete_child(state: &mut StoreState, child_id: ChildId) -> Result<(), ActionError> {
        let focus = state.canvas_focus.component_id;
        let removed = focused_mut(&mut state.app_state, focus)?
            .remove_child(child_id)
            .ok_or(ActionError::ChildNotFound(child_id))?;

        if let Some(focused_child) = state.canvas_focus.child_id {
            if removed.contains(focused_child) {
                state.canvas_focus.child_id = None;
            }
        }
        Ok(())
    }

    fn apply_add_passed_in_props(
        state: &mut StoreState,
        child_component_id: ComponentId,
        state_id: StateId,
        with_hook: bool,
    ) -> Result<(), ActionError> {
        let focus = state.canvas_focus.component_id;
        let app = &mut state.app_state;

        let source = focused(app, focus)
            .ok()
            .and_then(|component| prop_source(component, state_id))
            .ok_or(ActionError::StateNotFound(state_id))?;

        let prop = PassedInProp {
            hook: with_hook.then(|| format!("set{}", capitalize(&source.key))),
            ..source
        };

        let child = app
            .component_mut(child_component_id)
            .ok_or(ActionError::ComponentNotFound(child_component_id))?;
        if !child.passed_in_props.iter().any(|p| p.id == state_id) {
            child.passed_in_props.push(prop);
        }
        Ok(())
    }
}

/// Hand out the counter's current value and advance it. Counters arrive
/// with peer documents, so the end of the id space is an error, not a wrap.
fn allocate_id(counter: &mut u32, kind: &str) -> Result<u32, ActionError> {
    let id = *counter;
    *counter = id.checked_add(1).ok_or_else(|| ids_exhausted(kind))?;
    Ok(id)
}

fn ensure_id_available(counter: u32, kind: &str) -> Result<(), ActionError> {
    counter
        .checked_add(1)
        .map(|_| ())
        .ok_or_else(|| ids_exhausted(kind))
}

fn ids_exhausted(kind: &str) -> ActionError {
    ActionError::InvalidStructure(format!("No {} ids left in this document", kind))
}

fn focused(app: &AppState, focus: ComponentId) -> Result<&Component, ActionError> {
    app.component(focus).ok_or(ActionError::ComponentNotFound(focus))
}

fn focused_mut(app: &mut AppState, focus: ComponentId) -> Result<&mut Component, ActionError> {
    app.component_mut(focus)
        .ok_or(ActionError::ComponentNotFound(focus))
}

/// A state entry or received prop of `component`, in passed-in shape
fn prop_source(component: &Component, state_id: StateId) -> Option<PassedInProp> {
    component
        .state_props
        .iter()
        .find(|entry| entry.id == state_id)
        .map(|entry| PassedInProp {
            id: entry.id,
            key: entry.key.clone(),
            value: entry.value.clone(),
            kind: entry.kind,
            hook: None,
        })
        .or_else(|| {
            component
                .passed_in_props
                .iter()
                .find(|prop| prop.id == state_id)
                .map(|prop| PassedInProp { hook: None, ..prop.clone() })
        })
}
