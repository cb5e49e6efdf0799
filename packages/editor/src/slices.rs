//! Store slices besides the document, and the shared payload peers exchange.

use crate::document::AppState;
use serde::{Deserialize, Serialize};

/// Text shown in the code preview pane
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePreviewState {
    #[serde(default)]
    pub input: String,
}

/// Global stylesheet applied to the canvas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleState {
    #[serde(default)]
    pub style: String,
}

/// React contexts created in the context manager. Local only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextState {
    #[serde(default)]
    pub contexts: Vec<ContextEntry>,
}

impl ContextState {
    pub fn find(&self, name: &str) -> Option<&ContextEntry> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut ContextEntry> {
        self.contexts.iter_mut().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub name: String,
    #[serde(default)]
    pub values: Vec<ContextValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextValue {
    pub key: String,
    pub value: String,
}

/// A top-level partition of shared state, in reconciliation priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slice {
    AppState,
    CodePreview,
    Style,
}

impl Slice {
    /// Order in which slices are compared when a peer broadcast arrives
    pub const PRIORITY: [Slice; 3] = [Slice::AppState, Slice::CodePreview, Slice::Style];

    /// Key of this slice in the serialized payload
    pub fn key(self) -> &'static str {
        match self {
            Slice::AppState => "appState",
            Slice::CodePreview => "codePreviewCooperative",
            Slice::Style => "styleSlice",
        }
    }
}

/// The three slices relayed between peers, in wire shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(rename = "appState")]
    pub app_state: AppState,

    #[serde(rename = "codePreviewCooperative")]
    pub code_preview: CodePreviewState,

    #[serde(rename = "styleSlice")]
    pub style: StyleState,
}

impl SharedState {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a peer payload. All three slices must be present.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn slice_eq(&self, other: &SharedState, slice: Slice) -> bool {
        match slice {
            Slice::AppState => self.app_state == other.app_state,
            Slice::CodePreview => self.code_preview == other.code_preview,
            Slice::Style => self.style == other.style,
        }
    }

    /// Copy one slice over from `other`
    pub fn take_slice(&mut self, other: &SharedState, slice: Slice) {
        match slice {
            Slice::AppState => self.app_state = other.app_state.clone(),
            Slice::CodePreview => self.code_preview = other.code_preview.clone(),
            Slice::Style => self.style = other.style.clone(),
        }
    }
}
