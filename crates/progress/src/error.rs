//! Progression engine errors.

use academia_storage::StorageError;

/// Result type for progression operations.
pub type Result<T> = std::result::Result<T, ProgressionError>;

/// Errors surfaced by the progression engine.
///
/// `DataIntegrity` and `Configuration` point at records staff must fix; the
/// engine never corrects them on its own.
#[derive(Debug, thiserror::Error)]
pub enum ProgressionError {
    /// Unknown program, block, module, exam, grade, cohort or student
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind
        kind: &'static str,
        /// Requested identifier
        id: String,
    },

    /// Caller passed arguments that do not fit together
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored records contradict each other
    #[error("data integrity: {0}")]
    DataIntegrity(String),

    /// Program or engine configured in a way that cannot be evaluated
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Underlying storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressionError {
    /// Build a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        ProgressionError::NotFound { kind, id: id.to_string() }
    }
}
