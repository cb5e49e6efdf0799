//! # Intent Validation
//!
//! User-facing checks run before anything is snapshotted or dispatched.
//! A rejected intent leaves the store and the history untouched; the error
//! carries the inline message shown next to the offending input.

use crate::actions::Action;
use crate::document::{AppState, ChildId, ChildKind, Component, ComponentId, ProjectType};
use crate::store::StoreState;
use thiserror::Error;

/// Names reserved for the root component and the entry file
const RESERVED_NAMES: [&str; 2] = ["index", "app"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Component name cannot be blank.")]
    BlankName,

    #[error("Component name must start with a letter.")]
    NameMustStartWithLetter,

    #[error("Component name must not contain symbols.")]
    NameContainsSymbols,

    #[error("Component name already exists.")]
    DuplicateName,

    #[error("Component name cannot be root component name.")]
    ReservedName,

    #[error("Component {dragged} cannot be placed inside component {target}")]
    InvalidNesting {
        dragged: ComponentId,
        target: ComponentId,
    },

    #[error("Element {child_id} cannot be moved into itself or its descendants")]
    InvalidParent { child_id: ChildId },
}

impl ValidationError {
    /// Message shown inline in the editor
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Check a new component name against the existing document.
/// Rules run in a fixed order and the first failure wins.
pub fn validate_component_name(name: &str, app: &AppState) -> Result<(), ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::BlankName);
    }
    if !trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::NameMustStartWithLetter);
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::NameContainsSymbols);
    }
    if app.component_by_name(trimmed).is_some() {
        return Err(ValidationError::DuplicateName);
    }
    if RESERVED_NAMES.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Err(ValidationError::ReservedName);
    }

    Ok(())
}

/// Normalize a validated name: whitespace removed, and capitalized for
/// Classic React projects.
pub fn format_component_name(name: &str, project_type: ProjectType) -> String {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    match project_type {
        ProjectType::ClassicReact => capitalize(&compact),
        ProjectType::NextJs | ProjectType::GatsbyJs => compact,
    }
}

pub(crate) fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An instance of `dragged` may be dropped into `target` unless `dragged` is
/// `target` or already renders it somewhere below.
pub fn can_nest_component(app: &AppState, dragged: ComponentId, target: ComponentId) -> bool {
    !app.reaches(dragged, target)
}

/// A child may be re-parented anywhere except onto itself or its own subtree.
pub fn is_valid_new_parent(
    component: &Component,
    current_child_id: ChildId,
    new_parent: Option<ChildId>,
) -> bool {
    match (new_parent, component.find_child(current_child_id)) {
        (None, _) => true,
        (Some(parent), Some(moving)) => !moving.contains(parent),
        (Some(parent), None) => parent != current_child_id,
    }
}

/// Validate a user intent against the current store state
pub fn validate_intent(state: &StoreState, action: &Action) -> Result<(), ValidationError> {
    let focus = state.canvas_focus.component_id;

    match action {
        Action::AddComponent { component_name, .. } => {
            validate_component_name(component_name, &state.app_state)
        }

        Action::AddChild {
            kind: ChildKind::Component,
            type_id,
            ..
        } => {
            if can_nest_component(&state.app_state, *type_id, focus) {
                Ok(())
            } else {
                Err(ValidationError::InvalidNesting {
                    dragged: *type_id,
                    target: focus,
                })
            }
        }

        Action::ChangePosition {
            current_child_id,
            new_parent_child_id,
        } => match state.app_state.component(focus) {
            Some(component)
                if !is_valid_new_parent(component, *current_child_id, *new_parent_child_id) =>
            {
                Err(ValidationError::InvalidParent {
                    child_id: *current_child_id,
                })
            }
            _ => Ok(()),
        },

        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Child, Component};

    fn app_with(names: &[&str]) -> AppState {
        let mut app = AppState::default();
        for name in names {
            let id = app.next_component_id;
            app.next_component_id += 1;
            app.components.push(Component::new(id, *name, false));
        }
        app
    }

    #[test]
    fn test_name_rules_in_order() {
        let app = app_with(&["Row"]);

        assert_eq!(validate_component_name("   ", &app), Err(ValidationError::BlankName));
        assert_eq!(
            validate_component_name("1Row", &app),
            Err(ValidationError::NameMustStartWithLetter)
        );
        assert_eq!(
            validate_component_name("Ro-w", &app),
            Err(ValidationError::NameContainsSymbols)
        );
        assert_eq!(validate_component_name("row", &app), Err(ValidationError::DuplicateName));
        assert_eq!(validate_component_name("index", &app), Err(ValidationError::ReservedName));
        assert!(validate_component_name("Cell", &app).is_ok());
    }

    #[test]
    fn test_app_is_reported_as_duplicate_first() {
        let app = AppState::default();
        assert_eq!(validate_component_name("app", &app), Err(ValidationError::DuplicateName));
    }

    #[test]
    fn test_symbol_check_precedes_duplicate_check() {
        let app = app_with(&["Row"]);
        assert_eq!(
            validate_component_name("Row!", &app),
            Err(ValidationError::NameContainsSymbols)
        );
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ValidationError::BlankName.user_message(),
            "Component name cannot be blank."
        );
        assert_eq!(
            ValidationError::DuplicateName.user_message(),
            "Component name already exists."
        );
    }

    #[test]
    fn test_format_component_name() {
        assert_eq!(format_component_name(" row item", ProjectType::ClassicReact), "Rowitem");
        assert_eq!(format_component_name("row", ProjectType::NextJs), "row");
    }

    #[test]
    fn test_nesting() {
        let mut app = app_with(&["Row"]);
        app.component_mut(1)
            .unwrap()
            .children
            .push(Child::new(1, ChildKind::Component, 2, "Row"));

        assert!(can_nest_component(&app, 2, 1));
        assert!(!can_nest_component(&app, 1, 2));
        assert!(!can_nest_component(&app, 2, 2));
    }

    #[test]
    fn test_new_parent() {
        let mut component = Component::new(1, "App", true);
        let mut outer = Child::new(1, ChildKind::HtmlElement, 11, "Div");
        outer.children.push(Child::new(2, ChildKind::HtmlElement, 11, "Div"));
        component.children.push(outer);
        component.children.push(Child::new(3, ChildKind::HtmlElement, 11, "Div"));

        assert!(!is_valid_new_parent(&component, 1, Some(1)));
        assert!(!is_valid_new_parent(&component, 1, Some(2)));
        assert!(is_valid_new_parent(&component, 1, Some(3)));
        assert!(is_valid_new_parent(&component, 2, None));
    }
}
