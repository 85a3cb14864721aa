use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by the task-scoped persistent store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The exclusive slot lock stayed contended for the whole bounded wait.
    ///
    /// Recoverable: callers treat the record as absent and recompile from
    /// scratch rather than failing the build.
    #[error("timed out after {waited:?} waiting for store lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },
}
