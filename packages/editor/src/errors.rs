//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Validation error: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    #[error("Action error: {0}")]
    Action(#[from] crate::actions::ActionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EditorError {
    /// Inline message for intents rejected by validation
    pub fn user_message(&self) -> Option<String> {
        match self {
            EditorError::Validation(err) => Some(err.user_message()),
            _ => None,
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
