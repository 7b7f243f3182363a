use crate::types::JobId;

/// Domain error taxonomy shared across the workspace.
///
/// Mapping to HTTP happens in the API crate; everything below the API
/// surface works in terms of these variants.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: JobId },

    /// A single validation failure (names, ranges, shapes).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Render options failed the compatibility checks. Carries the full
    /// list so submission responses can report every problem at once.
    #[error("Invalid render options: {}", errors.join("; "))]
    InvalidOptions { errors: Vec<String> },

    /// An operation that is illegal in the job's current state, e.g. a
    /// progress update on a job that is not processing.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The job store or queue broker is unreachable. Callers surface this
    /// as a 503; background loops back off and retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
