use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Identity of the compilation task that owns a set of persisted records.
///
/// Two tasks never share store state. The identity is hashed into the
/// on-disk directory name, so arbitrary project paths and task names stay
/// filesystem safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdentity {
    project: PathBuf,
    task: String,
}

impl TaskIdentity {
    pub fn new(project: impl Into<PathBuf>, task: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            task: task.into(),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Stable on-disk key for this task.
    pub fn storage_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.project.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(self.task.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Handle to the on-disk store root.
///
/// Construction performs no I/O; owner directories are created lazily on
/// first write.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every record owned by `owner`.
    pub fn owner_dir(&self, owner: &TaskIdentity) -> PathBuf {
        self.root.join(owner.storage_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_stable_and_task_scoped() {
        let compile = TaskIdentity::new("/work/app", "compileJava");
        let compile_again = TaskIdentity::new("/work/app", "compileJava");
        let test_compile = TaskIdentity::new("/work/app", "compileTestJava");

        assert_eq!(compile.storage_key(), compile_again.storage_key());
        assert_ne!(compile.storage_key(), test_compile.storage_key());
    }

    #[test]
    fn owner_dirs_do_not_collide_across_projects() {
        let cache = CacheDir::new("/tmp/kiln");
        let a = TaskIdentity::new("/work/app-a", "compileJava");
        let b = TaskIdentity::new("/work/app-b", "compileJava");

        assert_ne!(cache.owner_dir(&a), cache.owner_dir(&b));
    }
}
