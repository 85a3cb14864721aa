//! Task-scoped persistent storage for Kiln's incremental-compilation state.
//!
//! Each compilation task owns a private region of the store, addressed by
//! `(owner identity, slot name)`. A slot holds exactly one value, replaced
//! wholesale on every successful build; there is no cross-task sharing and
//! no caching of compiled artifacts.
//!
//! ## On-disk layout
//!
//! Owner regions live under `<cache_root>/<owner_sha256>/`:
//! - `<slot>.bin`: versioned `bincode` record envelope (schema version +
//!   slot name + payload)
//! - `<slot>.lock`: lockfile guarding the record across processes and
//!   threads
//! - `task.json`: human-readable manifest naming the owning task
//!
//! ## Failure policy
//!
//! Reads fail open: a record that is missing, truncated, oversized, from an
//! older schema, or from a foreign slot is reported absent (and the stale
//! file deleted), which costs the owner one full recompilation. Only lock
//! timeouts surface as errors, and those are recoverable by the same
//! degradation.

mod cache_dir;
mod error;
mod lock;
mod single_op;
mod util;

pub use cache_dir::{CacheDir, TaskIdentity};
pub use error::{CacheError, Result};
pub use lock::{LockOptions, StoreLock};
pub use single_op::{SingleOpStore, STORE_SCHEMA_VERSION};
pub use util::{atomic_write, MAX_RECORD_BYTES};
