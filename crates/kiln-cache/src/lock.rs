use crate::error::CacheError;
use fs2::FileExt as _;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, TryLockError};
use std::time::{Duration, Instant};

/// Bounded-wait acquisition parameters for [`StoreLock`].
#[derive(Clone, Copy, Debug)]
pub struct LockOptions {
    /// Maximum time to wait for a contended lock before failing the call.
    pub wait: Duration,
    /// Poll interval while the lock is contended.
    pub poll: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(60),
            poll: Duration::from_millis(50),
        }
    }
}

/// Exclusive lock on one store slot, held for a single operation.
///
/// Released on drop. Every exit path out of the operation (normal return,
/// error, or cancellation unwind) releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    _guard: MutexGuard<'static, ()>,
}

impl StoreLock {
    /// Acquires `path` exclusively, creating the lockfile if needed.
    ///
    /// Fails with [`CacheError::LockTimeout`] once `options.wait` elapses
    /// without the lock becoming available.
    pub fn acquire(path: &Path, options: LockOptions) -> Result<Self, CacheError> {
        let deadline = Instant::now() + options.wait;

        // `fs2` file locks are process-scoped on Unix: they exclude other
        // processes but not other threads of this one. Acquire a per-path
        // in-process mutex first so both levels are covered.
        let guard = acquire_thread_slot(path, deadline, options)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                    if Instant::now() >= deadline {
                        return Err(CacheError::LockTimeout {
                            path: path.to_path_buf(),
                            waited: options.wait,
                        });
                    }
                    std::thread::sleep(options.poll);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Self { file, _guard: guard })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn acquire_thread_slot(
    path: &Path,
    deadline: Instant,
    options: LockOptions,
) -> Result<MutexGuard<'static, ()>, CacheError> {
    let slot = thread_slot_for(path);
    loop {
        match slot.try_lock() {
            Ok(guard) => return Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return Err(CacheError::LockTimeout {
                        path: path.to_path_buf(),
                        waited: options.wait,
                    });
                }
                std::thread::sleep(options.poll);
            }
        }
    }
}

// One mutex per lockfile path for the lifetime of the process. The map only
// grows by the handful of slots a build actually touches.
fn thread_slot_for(path: &Path) -> &'static Mutex<()> {
    static SLOTS: OnceLock<Mutex<HashMap<PathBuf, &'static Mutex<()>>>> = OnceLock::new();
    let slots = SLOTS.get_or_init(|| Mutex::new(HashMap::new()));

    let mut map = slots
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(slot) = map.get(path) {
        return slot;
    }

    let slot: &'static Mutex<()> = Box::leak(Box::new(Mutex::new(())));
    map.insert(path.to_path_buf(), slot);
    slot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_wait() -> LockOptions {
        LockOptions {
            wait: Duration::from_millis(100),
            poll: Duration::from_millis(5),
        }
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.lock");

        let lock = StoreLock::acquire(&path, short_wait()).unwrap();
        drop(lock);

        StoreLock::acquire(&path, short_wait()).unwrap();
    }

    #[test]
    fn contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.lock");

        let _held = StoreLock::acquire(&path, short_wait()).unwrap();

        let path_clone = path.clone();
        let result = std::thread::spawn(move || StoreLock::acquire(&path_clone, short_wait()))
            .join()
            .unwrap();

        match result {
            Err(CacheError::LockTimeout { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected lock timeout, got {other:?}"),
        }
    }

    #[test]
    fn distinct_paths_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();

        let _first = StoreLock::acquire(&dir.path().join("a.lock"), short_wait()).unwrap();
        let _second = StoreLock::acquire(&dir.path().join("b.lock"), short_wait()).unwrap();
    }
}
