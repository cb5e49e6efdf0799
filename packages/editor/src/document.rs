//! # Document Model
//!
//! The app-state slice: every component of a project and the element tree
//! each component renders. This is the unit captured by undo snapshots and
//! the first slice compared when peers reconcile.
//!
//! Identifiers are plain integers handed out from monotonic counters kept on
//! the document itself, so a document received from a peer carries the
//! counters it was built with.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub type ComponentId = u32;
pub type ChildId = u32;
pub type StateId = u32;

/// Id of the component every new project starts with.
pub const ROOT_COMPONENT_ID: ComponentId = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    #[default]
    #[serde(rename = "Classic React")]
    ClassicReact,
    #[serde(rename = "Next.js")]
    NextJs,
    #[serde(rename = "Gatsby.js")]
    GatsbyJs,
}

/// The Document: components, roots, and the element palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub name: String,

    #[serde(default)]
    pub project_type: ProjectType,

    pub components: Vec<Component>,

    /// Ids of page/root components, in creation order
    pub root_components: Vec<ComponentId>,

    #[serde(default = "default_html_types")]
    pub html_types: Vec<HtmlType>,

    pub next_component_id: ComponentId,
    pub next_child_id: ChildId,

    #[serde(default = "default_next_state_id")]
    pub next_state_id: StateId,

    /// Set when the project was cloned from the marketplace
    #[serde(default)]
    pub forked: bool,
}

fn default_next_state_id() -> StateId {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            name: String::new(),
            project_type: ProjectType::default(),
            components: vec![Component::new(ROOT_COMPONENT_ID, "App", true)],
            root_components: vec![ROOT_COMPONENT_ID],
            html_types: default_html_types(),
            next_component_id: ROOT_COMPONENT_ID + 1,
            next_child_id: 1,
            next_state_id: default_next_state_id(),
            forked: false,
        }
    }
}

impl AppState {
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.id == id)
    }

    pub fn component_by_name(&self, name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn html_type(&self, id: u32) -> Option<&HtmlType> {
        self.html_types.iter().find(|h| h.id == id)
    }

    /// Whether a child of the given kind/type can hold nested children
    pub fn is_nestable(&self, child: &Child) -> bool {
        match child.kind {
            ChildKind::HtmlElement => self
                .html_type(child.type_id)
                .map(|h| h.nestable)
                .unwrap_or(false),
            ChildKind::Component | ChildKind::RouteLink => false,
        }
    }

    /// True if `target` is `from` or is instantiated anywhere beneath it,
    /// following component-instance children transitively.
    pub fn reaches(&self, from: ComponentId, target: ComponentId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![from];

        while let Some(id) = pending.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(component) = self.component(id) {
                pending.extend(component.referenced_components());
            }
        }

        false
    }

    /// Components reachable from `from` through instance children, excluding `from`
    pub fn descendants_of(&self, from: ComponentId) -> Vec<ComponentId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut pending: Vec<ComponentId> = self
            .component(from)
            .map(|c| c.referenced_components())
            .unwrap_or_default();

        while let Some(id) = pending.pop() {
            if id == from || !visited.insert(id) {
                continue;
            }
            order.push(id);
            if let Some(component) = self.component(id) {
                pending.extend(component.referenced_components());
            }
        }

        order
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub root: bool,

    #[serde(default)]
    pub children: Vec<Child>,

    #[serde(default)]
    pub state_props: Vec<StateEntry>,

    #[serde(default)]
    pub passed_in_props: Vec<PassedInProp>,

    #[serde(default)]
    pub style: BTreeMap<String, String>,

    #[serde(default)]
    pub code: String,
}

impl Component {
    pub fn new(id: ComponentId, name: impl Into<String>, root: bool) -> Self {
        Self {
            id,
            name: name.into(),
            root,
            children: Vec::new(),
            state_props: Vec::new(),
            passed_in_props: Vec::new(),
            style: BTreeMap::new(),
            code: String::new(),
        }
    }

    /// Find a child anywhere in this component's tree
    pub fn find_child(&self, child_id: ChildId) -> Option<&Child> {
        find_in(&self.children, child_id)
    }

    pub fn find_child_mut(&mut self, child_id: ChildId) -> Option<&mut Child> {
        find_in_mut(&mut self.children, child_id)
    }

    /// Detach a child (and its subtree) from wherever it sits
    pub fn remove_child(&mut self, child_id: ChildId) -> Option<Child> {
        remove_from(&mut self.children, child_id)
    }

    /// Ids of components instantiated directly or nested in this tree
    pub fn referenced_components(&self) -> Vec<ComponentId> {
        let mut ids = Vec::new();
        collect_references(&self.children, &mut ids);
        ids
    }

    /// True if an instance of `component_id` sits directly in this tree
    pub fn instantiates(&self, component_id: ComponentId) -> bool {
        self.referenced_components().contains(&component_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildKind {
    #[serde(rename = "HTML Element")]
    HtmlElement,
    #[serde(rename = "Component")]
    Component,
    #[serde(rename = "Route Link")]
    RouteLink,
}

/// A node placed on a component's canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub child_id: ChildId,

    #[serde(rename = "type")]
    pub kind: ChildKind,

    /// Html-type id for elements, component id for instances and route links
    pub type_id: u32,

    pub name: String,

    #[serde(default)]
    pub style: BTreeMap<String, String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub children: Vec<Child>,
}

impl Child {
    pub fn new(child_id: ChildId, kind: ChildKind, type_id: u32, name: impl Into<String>) -> Self {
        Self {
            child_id,
            kind,
            type_id,
            name: name.into(),
            style: BTreeMap::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// True if `child_id` is this node or sits anywhere below it
    pub fn contains(&self, child_id: ChildId) -> bool {
        self.child_id == child_id || find_in(&self.children, child_id).is_some()
    }
}

fn find_in(children: &[Child], child_id: ChildId) -> Option<&Child> {
    for child in children {
        if child.child_id == child_id {
            return Some(child);
        }
        if let Some(found) = find_in(&child.children, child_id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut(children: &mut [Child], child_id: ChildId) -> Option<&mut Child> {
    for child in children.iter_mut() {
        if child.child_id == child_id {
            return Some(child);
        }
        if let Some(found) = find_in_mut(&mut child.children, child_id) {
            return Some(found);
        }
    }
    None
}

fn remove_from(children: &mut Vec<Child>, child_id: ChildId) -> Option<Child> {
    if let Some(index) = children.iter().position(|c| c.child_id == child_id) {
        return Some(children.remove(index));
    }
    children
        .iter_mut()
        .find_map(|child| remove_from(&mut child.children, child_id))
}

fn collect_references(children: &[Child], ids: &mut Vec<ComponentId>) {
    for child in children {
        if child.kind == ChildKind::Component {
            ids.push(child.type_id);
        }
        collect_references(&child.children, ids);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub id: StateId,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: StateType,
}

/// State threaded into a component from an ancestor.
/// `id` is the id of the originating state entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassedInProp {
    pub id: StateId,
    pub key: String,
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: StateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlType {
    pub id: u32,
    pub tag: String,
    pub name: String,
    pub nestable: bool,
}

impl HtmlType {
    fn new(id: u32, tag: &str, name: &str, nestable: bool) -> Self {
        Self {
            id,
            tag: tag.to_string(),
            name: name.to_string(),
            nestable,
        }
    }
}

pub fn default_html_types() -> Vec<HtmlType> {
    vec![
        HtmlType::new(1, "img", "Image", false),
        HtmlType::new(2, "form", "Form", true),
        HtmlType::new(3, "button", "Button", false),
        HtmlType::new(4, "a", "Link", false),
        HtmlType::new(5, "ul", "List", true),
        HtmlType::new(6, "p", "Paragraph", false),
        HtmlType::new(7, "h1", "Header 1", false),
        HtmlType::new(8, "h2", "Header 2", false),
        HtmlType::new(9, "span", "Span", false),
        HtmlType::new(10, "input", "Input", false),
        HtmlType::new(11, "div", "Div", true),
    ]
}

/// Canvas focus. Client-local: not part of the document, never relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasFocus {
    pub component_id: ComponentId,
    pub child_id: Option<ChildId>,
}

impl Default for CanvasFocus {
    fn default() -> Self {
        Self {
            component_id: ROOT_COMPONENT_ID,
            child_id: None,
        }
    }
}

impl CanvasFocus {
    /// History key for the focused component
    pub fn focus_index(&self) -> usize {
        self.component_id.saturating_sub(1) as usize
    }
}
