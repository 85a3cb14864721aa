use crate::deps::ClassDependencyGraph;
use kiln_cache::{CacheDir, LockOptions, SingleOpStore, TaskIdentity};
use std::path::PathBuf;

/// Slot holding a task's persisted class dependency graph.
const CLASS_DEPENDENCY_SLOT: &str = "local class dependency info";

fn store<'a>(
    cache: &'a CacheDir,
    task: &'a TaskIdentity,
    options: LockOptions,
) -> SingleOpStore<'a, ClassDependencyGraph> {
    SingleOpStore::new(cache, task, CLASS_DEPENDENCY_SLOT).with_lock_options(options)
}

/// Replaces the task's persisted dependency graph.
///
/// Every call constructs a fresh single-operation store bound to the task's
/// slot, so the exclusive lock spans exactly this one write.
pub fn put_class_dependency_graph(
    cache: &CacheDir,
    task: &TaskIdentity,
    options: LockOptions,
    graph: &ClassDependencyGraph,
) -> kiln_cache::Result<()> {
    store(cache, task, options).put_and_close(graph)
}

/// Reads the task's persisted dependency graph.
///
/// `Ok(None)` on the first-ever build, and for any record the store cannot
/// trust; callers respond with a full recompilation either way.
pub fn get_class_dependency_graph(
    cache: &CacheDir,
    task: &TaskIdentity,
    options: LockOptions,
) -> kiln_cache::Result<Option<ClassDependencyGraph>> {
    store(cache, task, options).get_and_close()
}

/// Drops the persisted graph so the next build starts from absent, e.g.
/// when a full recompilation is forced externally.
pub fn invalidate_class_dependency_graph(
    cache: &CacheDir,
    task: &TaskIdentity,
    options: LockOptions,
) -> kiln_cache::Result<()> {
    store(cache, task, options).delete_and_close()
}

/// On-disk location of the task's dependency record, for diagnostics.
pub fn class_dependency_record_path(cache: &CacheDir, task: &TaskIdentity) -> PathBuf {
    store(cache, task, LockOptions::default()).record_path()
}
