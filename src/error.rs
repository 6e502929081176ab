//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Engine error taxonomy.
///
/// `Adapter` and `Content` conditions are normalized into failed
/// `NodeResult`s by the dispatcher and never escape as `Err`; the
/// variants exist so validation paths and the CLI boundary share one
/// error surface.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Graph contains a cycle or an edge referencing a missing node
    #[error("Structural error: {0}")]
    Structural(String),

    /// A node is malformed or uses a type/action pair outside the capability table
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external tool call failed (auth, not-found, rate-limit, network)
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// A required piece of context is absent at execution time
    #[error("Content error: {0}")]
    Content(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixSuggestion for EngineError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            EngineError::Structural(_) => {
                Some("Check edges for cycles and make sure every edge references an existing node id")
            }
            EngineError::Validation(_) => {
                Some("Every node needs a unique id, a label, and a type/action pair from the capability table")
            }
            EngineError::Adapter(_) => Some("Check the external service credentials and availability"),
            EngineError::Content(_) => {
                Some("Configure the missing destination or make sure an upstream node produces input")
            }
            EngineError::Json(_) => Some("Check the workflow JSON syntax"),
            EngineError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
