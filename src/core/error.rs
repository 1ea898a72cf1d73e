use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The aggregate's declared shape cannot be persisted (missing id,
    /// unsupported embedded id, unknown entity or property).
    #[error("Mapping error: {0}")]
    MappingError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Incorrect update semantics: {0}")]
    IncorrectUpdateSemantics(String),

    #[error("Optimistic locking failure: {0}")]
    OptimisticLockingFailure(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
