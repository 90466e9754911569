use crate::types::DbId;

/// Error taxonomy shared by every engine component.
///
/// Collaborator implementations (queue, state store, artifact store) map
/// their backend errors into `Queue` / `Storage` via the helper
/// constructors so the core crate stays free of driver dependencies.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Step execution failed: {0}")]
    Execution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wrap a backend storage error.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// Wrap a queue transport error.
    pub fn queue(err: impl std::fmt::Display) -> Self {
        Self::Queue(err.to_string())
    }

    /// Wrap a step executor error.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}
