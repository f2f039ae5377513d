use thiserror::Error;

/// Errors raised by a storage backend.
///
/// `Connectivity` is the only transient kind: the readiness gate retries it
/// with a bounded budget. Everything else escalates immediately.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connectivity: {0}")]
    Connectivity(String),

    #[error("duplicate {entity} '{value}'")]
    Conflict { entity: &'static str, value: String },

    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connectivity(_))
    }
}

/// Top-level error type for the task core.
///
/// Propagation policy: errors local to one task body never cross the worker
/// boundary as errors. The runner converts them into a failure `TaskResult`
/// and records it. Only process-wide failures (`StorageUnavailable`) abort
/// startup.
#[derive(Debug, Error)]
pub enum BazaarError {
    #[error("storage unavailable after {attempts} attempts: {source}")]
    StorageUnavailable {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),

    #[error("handler not found for task_type={0}")]
    HandlerNotFound(String),

    #[error("payload decode failed for task_type={task_type}: {cause}")]
    Codec { task_type: String, cause: String },

    #[error("credential hashing failed: {0}")]
    Hash(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Other(String),
}
