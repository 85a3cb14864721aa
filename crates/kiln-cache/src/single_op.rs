use crate::cache_dir::{CacheDir, TaskIdentity};
use crate::error::Result;
use crate::lock::{LockOptions, StoreLock};
use crate::util::{
    atomic_write, decode_record, encode_record, read_record_bytes, remove_file_best_effort,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Schema version of the on-disk record envelope.
pub const STORE_SCHEMA_VERSION: u32 = 1;

const MANIFEST_FILENAME: &str = "task.json";

/// A persistent store permitting exactly one operation per instance.
///
/// Construction binds the cache root, the owning task, the slot name and
/// the value type, and performs no I/O. The operations consume `self`, so a
/// second operation on the same instance does not compile: callers build a
/// fresh store per call and the exclusive slot lock never outlives one
/// open → operate → close span.
#[derive(Debug)]
pub struct SingleOpStore<'a, T> {
    cache: &'a CacheDir,
    owner: &'a TaskIdentity,
    slot: &'a str,
    lock_options: LockOptions,
    _value: PhantomData<fn() -> T>,
}

#[derive(Debug, Serialize)]
struct RecordEnvelopeRef<'v, T> {
    schema_version: u32,
    slot: &'v str,
    value: &'v T,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope<T> {
    schema_version: u32,
    slot: String,
    value: T,
}

/// Human-readable sidecar describing the owner of a record directory.
#[derive(Debug, Serialize)]
struct TaskManifest<'a> {
    schema_version: u32,
    owner: &'a TaskIdentity,
}

impl<'a, T> SingleOpStore<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(cache: &'a CacheDir, owner: &'a TaskIdentity, slot: &'a str) -> Self {
        Self {
            cache,
            owner,
            slot,
            lock_options: LockOptions::default(),
            _value: PhantomData,
        }
    }

    /// Overrides the bounded lock wait (tests use short waits).
    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    /// Serializes `value` and replaces the stored record, then closes.
    ///
    /// The record is replaced wholesale via an atomic rename; a reader
    /// holding the lock sees either the prior record or this one, never a
    /// partial write.
    pub fn put_and_close(self, value: &T) -> Result<()> {
        let bytes = encode_record(&RecordEnvelopeRef {
            schema_version: STORE_SCHEMA_VERSION,
            slot: self.slot,
            value,
        })?;

        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_options)?;
        atomic_write(&self.record_path(), &bytes)?;
        self.write_manifest()?;
        Ok(())
    }

    /// Reads the stored record, then closes.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet. A record that
    /// cannot be decoded (truncated, a foreign slot behind the same file
    /// name, or an older schema) is deleted and reported absent: the caller
    /// falls back to a full rebuild, so failing open is always safe here.
    pub fn get_and_close(self) -> Result<Option<T>> {
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_options)?;

        let path = self.record_path();
        let Some(bytes) = read_record_bytes(&path) else {
            return Ok(None);
        };

        let envelope: RecordEnvelope<T> = match decode_record(&bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(
                    target = "kiln.cache",
                    path = %path.display(),
                    error = %err,
                    "discarding undecodable record"
                );
                remove_file_best_effort(&path);
                return Ok(None);
            }
        };

        if envelope.schema_version != STORE_SCHEMA_VERSION || envelope.slot != self.slot {
            tracing::warn!(
                target = "kiln.cache",
                path = %path.display(),
                slot = envelope.slot.as_str(),
                schema_version = envelope.schema_version,
                "discarding record from a different slot or schema"
            );
            remove_file_best_effort(&path);
            return Ok(None);
        }

        Ok(Some(envelope.value))
    }

    /// Removes the stored record under the slot lock, then closes.
    pub fn delete_and_close(self) -> Result<()> {
        let _lock = StoreLock::acquire(&self.lock_path(), self.lock_options)?;
        remove_file_best_effort(&self.record_path());
        Ok(())
    }

    /// On-disk location of this slot's record.
    pub fn record_path(&self) -> PathBuf {
        self.owner_dir()
            .join(format!("{}.bin", slot_file_stem(self.slot)))
    }

    fn lock_path(&self) -> PathBuf {
        self.owner_dir()
            .join(format!("{}.lock", slot_file_stem(self.slot)))
    }

    fn owner_dir(&self) -> PathBuf {
        self.cache.owner_dir(self.owner)
    }

    fn write_manifest(&self) -> Result<()> {
        let manifest = serde_json::to_vec_pretty(&TaskManifest {
            schema_version: STORE_SCHEMA_VERSION,
            owner: self.owner,
        })?;
        atomic_write(&self.owner_dir().join(MANIFEST_FILENAME), &manifest)
    }
}

// Distinct slot names can map to the same stem; the slot echoed inside the
// envelope disambiguates, treating a foreign record as absent.
fn slot_file_stem(slot: &str) -> String {
    slot.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    type Payload = BTreeMap<String, BTreeSet<String>>;

    fn short_wait() -> LockOptions {
        LockOptions {
            wait: Duration::from_millis(100),
            poll: Duration::from_millis(5),
        }
    }

    fn sample_payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert(
            "com.acme.Widget".to_string(),
            ["com.acme.Frame".to_string()].into(),
        );
        payload.insert("com.acme.Frame".to_string(), BTreeSet::new());
        payload
    }

    #[test]
    fn get_is_absent_before_first_put() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        let store: SingleOpStore<'_, Payload> = SingleOpStore::new(&cache, &task, "deps");
        assert_eq!(store.get_and_close().unwrap(), None);
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");
        let payload = sample_payload();

        SingleOpStore::new(&cache, &task, "deps")
            .put_and_close(&payload)
            .unwrap();
        let loaded: Option<Payload> = SingleOpStore::new(&cache, &task, "deps")
            .get_and_close()
            .unwrap();

        assert_eq!(loaded, Some(payload));
    }

    #[test]
    fn put_writes_owner_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        SingleOpStore::new(&cache, &task, "deps")
            .put_and_close(&sample_payload())
            .unwrap();

        let manifest = std::fs::read_to_string(
            cache.owner_dir(&task).join(super::MANIFEST_FILENAME),
        )
        .unwrap();
        assert!(manifest.contains("compileJava"));
    }

    #[test]
    fn corrupt_record_reads_as_absent_and_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        SingleOpStore::new(&cache, &task, "deps")
            .put_and_close(&sample_payload())
            .unwrap();

        let store: SingleOpStore<'_, Payload> = SingleOpStore::new(&cache, &task, "deps");
        let record_path = store.record_path();
        std::fs::write(&record_path, b"not a record").unwrap();

        assert_eq!(store.get_and_close().unwrap(), None);
        assert!(!record_path.exists());
    }

    #[test]
    fn record_from_another_slot_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        // Both slot names collapse to the same file stem; only the envelope
        // tells them apart.
        assert_eq!(slot_file_stem("class deps"), slot_file_stem("class-deps"));

        SingleOpStore::new(&cache, &task, "class deps")
            .put_and_close(&sample_payload())
            .unwrap();

        let foreign: SingleOpStore<'_, Payload> = SingleOpStore::new(&cache, &task, "class-deps");
        assert_eq!(foreign.get_and_close().unwrap(), None);
    }

    #[test]
    fn delete_and_close_drops_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        SingleOpStore::new(&cache, &task, "deps")
            .put_and_close(&sample_payload())
            .unwrap();
        SingleOpStore::<Payload>::new(&cache, &task, "deps")
            .delete_and_close()
            .unwrap();

        let loaded: Option<Payload> = SingleOpStore::new(&cache, &task, "deps")
            .get_and_close()
            .unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn operations_fail_recoverably_while_the_slot_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        let task = TaskIdentity::new("/work/app", "compileJava");

        let store: SingleOpStore<'_, Payload> =
            SingleOpStore::new(&cache, &task, "deps").with_lock_options(short_wait());
        let lock_path = store.record_path().with_extension("lock");
        let _held = StoreLock::acquire(&lock_path, short_wait()).unwrap();
        drop(store);

        let cache_clone = cache.clone();
        let task_clone = task.clone();
        let result = std::thread::spawn(move || {
            SingleOpStore::<Payload>::new(&cache_clone, &task_clone, "deps")
                .with_lock_options(short_wait())
                .get_and_close()
        })
        .join()
        .unwrap();

        assert!(matches!(result, Err(CacheError::LockTimeout { .. })));
    }
}
