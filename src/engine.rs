//! Engine Module
//!
//! The per-book store engine that coordinates all components.
//!
//! ## Responsibilities
//! - Validate keys and resolve entry paths
//! - Encode/decode values through the codec
//! - Write entries atomically and keep the key index in step with disk
//! - Serialize writers per key and gate `destroy` against in-flight work

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Codec, SerializerRegistry};
use crate::config::{Config, FsyncPolicy};
use crate::error::{Result, ShelfError};
use crate::index::KeyIndex;
use crate::storage::{self, atomic, EntryPaths, PathResolver};

/// Storage engine for a single book
///
/// ## Lifecycle
/// `Uninitialized` (index not scanned) → `Indexed` (first operation scans the
/// directory) → `Destroyed` (terminal, every call returns `Destroyed`).
///
/// ## Concurrency Model
///
/// - **Writers** (insert/delete): serialized per key by `key_locks`
///   - Two writers on the same key never interleave write/rename steps
///   - Writers on different keys run in parallel
///
/// - **Readers** (select/exists/list_keys): no key lock
///   - Atomic rename guarantees a reader sees a whole old or new file
///   - The index has its own RwLock (many concurrent readers)
///
/// - **Destroy**: needs `lifecycle` exclusively
///   - Every operation holds a shared `lifecycle` guard while it runs
///   - `destroy` uses `try_write` and fails with `ConcurrentDestroy`
///     instead of waiting behind in-flight work
pub struct Store {
    /// Book name (as given by the caller)
    name: String,

    /// Key → path mapping inside the book directory
    paths: PathResolver,

    /// Value ↔ bytes
    codec: Codec,

    /// Durability for each atomic write
    fsync_policy: FsyncPolicy,

    /// Live keys, scanned from disk on first use
    index: KeyIndex,

    /// One mutex per key with a writer in flight
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,

    /// Shared by operations, exclusive for destroy
    lifecycle: RwLock<()>,

    /// Set once destroy has removed the directory
    destroyed: AtomicBool,
}

impl Store {
    /// Open or create the store for `name` under `config.root_dir`
    ///
    /// Creates the book directory; the index is built lazily.
    pub fn open(name: &str, config: &Config, registry: Arc<SerializerRegistry>) -> Result<Self> {
        let dir = storage::book_dir(&config.root_dir, name)?;
        fs::create_dir_all(&dir)?;

        tracing::debug!(book = name, dir = %dir.display(), "Opened book");

        Ok(Self {
            name: name.to_string(),
            paths: PathResolver::new(dir, config.max_key_len),
            codec: Codec::new(registry),
            fsync_policy: config.fsync_policy,
            index: KeyIndex::new(),
            key_locks: Mutex::new(HashMap::new()),
            lifecycle: RwLock::new(()),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Write a value under `key`, replacing any previous value
    ///
    /// Steps:
    /// 1. Encode (a failure leaves disk and index untouched)
    /// 2. Acquire the key lock
    /// 3. Add key to index
    /// 4. Atomic write: temp file → fsync → rename
    /// 5. If the write failed, drop a key that step 3 added
    ///
    /// The key is indexed before the rename so a reader that sees the new
    /// file also sees the key. A reader that finds the key indexed but its
    /// file not yet there waits on the key lock (see `select_opt`).
    pub fn insert<T: Serialize + 'static>(&self, key: &str, value: &T) -> Result<()> {
        let _op = self.enter()?;
        let paths = self.paths.resolve(key)?;
        let bytes = self.codec.encode(value)?;
        self.ensure_index()?;

        self.with_key_lock(key, || {
            let newly_indexed = self.index.insert(key.to_string());

            if let Err(e) = atomic::write_atomic(&paths, &bytes, self.fsync_policy) {
                if newly_indexed {
                    self.index.remove(key);
                }
                return Err(e);
            }

            Ok(())
        })
    }

    /// Read the value under `key`, or `default` if there is none
    pub fn select<T: DeserializeOwned + 'static>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.select_opt(key)?.unwrap_or(default))
    }

    /// Read the value under `key`
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key indexed and file decoded
    /// - `Ok(None)`: key not indexed, or its file vanished (index is healed)
    pub fn select_opt<T: DeserializeOwned + 'static>(&self, key: &str) -> Result<Option<T>> {
        let _op = self.enter()?;
        let paths = self.paths.resolve(key)?;
        self.ensure_index()?;

        if !self.index.contains(key) {
            return Ok(None);
        }

        match self.read_entry(&paths)? {
            Some(value) => Ok(Some(value)),
            // Either a writer is mid-way through a new key, or the file was
            // removed behind our back. The key lock tells the two apart.
            None if self.heal_missing(key, &paths) => Ok(None),
            None => self.read_entry(&paths),
        }
    }

    /// Check whether `key` has a value (index lookup only)
    pub fn exists(&self, key: &str) -> Result<bool> {
        let _op = self.enter()?;
        self.ensure_index()?;
        Ok(self.index.contains(key))
    }

    /// Delete `key`; deleting a missing key succeeds
    pub fn delete(&self, key: &str) -> Result<()> {
        let _op = self.enter()?;
        let paths = self.paths.resolve(key)?;
        self.ensure_index()?;

        self.with_key_lock(key, || {
            atomic::remove(&paths.final_path)?;
            self.index.remove(key);
            Ok(())
        })
    }

    /// Sorted snapshot of all keys
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let _op = self.enter()?;
        self.ensure_index()?;
        Ok(self.index.snapshot())
    }

    /// Number of keys in the book
    pub fn len(&self) -> Result<usize> {
        let _op = self.enter()?;
        self.ensure_index()?;
        Ok(self.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove the book directory with every entry in it
    ///
    /// Fails with `ConcurrentDestroy` if any other operation is in flight.
    /// On success the store is `Destroyed`.
    pub fn destroy(&self) -> Result<()> {
        let _exclusive = self
            .lifecycle
            .try_write()
            .ok_or_else(|| ShelfError::ConcurrentDestroy(self.name.clone()))?;

        if self.is_destroyed() {
            return Err(ShelfError::Destroyed(self.name.clone()));
        }

        match fs::remove_dir_all(self.dir()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ShelfError::Io(e)),
        }

        self.index.clear();
        self.destroyed.store(true, Ordering::SeqCst);

        tracing::info!(book = %self.name, "Destroyed book");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Book name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Book directory
    pub fn dir(&self) -> &Path {
        self.paths.dir()
    }

    /// Final file path for `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        Ok(self.paths.resolve(key)?.final_path)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_loaded()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Shared lifecycle guard for one operation
    fn enter(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let guard = self.lifecycle.read();
        if self.is_destroyed() {
            return Err(ShelfError::Destroyed(self.name.clone()));
        }
        Ok(guard)
    }

    /// Build the index from disk if this is the first operation
    ///
    /// Runs before any writer can stage a temp file, so every `.tmp` seen by
    /// the scan is a crash remnant.
    fn ensure_index(&self) -> Result<()> {
        let dir = self.paths.dir();

        self.index.ensure_loaded(|| {
            let stale = atomic::remove_stale_temps(dir)?;
            let mut keys = HashSet::new();

            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_file() {
                    continue;
                }
                if let Some(key) = entry.file_name().to_str().and_then(storage::key_from_file_name) {
                    keys.insert(key);
                }
            }

            tracing::debug!(
                book = %self.name,
                keys = keys.len(),
                stale_temps = stale,
                "Built key index"
            );
            Ok(keys)
        })?;

        Ok(())
    }

    /// Run `f` holding the writer lock for `key`
    fn with_key_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let lock = Arc::clone(self.key_locks.lock().entry(key.to_string()).or_default());

        let result = {
            let _guard = lock.lock();
            f()
        };

        // Clones are only handed out under the map lock, so a count of two
        // (map + ours) means no other writer is waiting on this key.
        let mut locks = self.key_locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }

        result
    }

    /// Decode the entry file, None if it does not exist
    fn read_entry<T: DeserializeOwned + 'static>(&self, paths: &EntryPaths) -> Result<Option<T>> {
        match atomic::read_all(&paths.final_path) {
            Ok(bytes) => self.codec.decode(&bytes).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop `key` from the index when its file disappeared behind our back
    ///
    /// Returns false if the file exists once the key lock is held, meaning a
    /// writer committed it while we waited.
    fn heal_missing(&self, key: &str, paths: &EntryPaths) -> bool {
        self.with_key_lock(key, || {
            if paths.final_path.exists() {
                return false;
            }

            if self.index.remove(key) {
                tracing::warn!(
                    book = %self.name,
                    key,
                    "Entry file missing for indexed key; removed from index"
                );
            }
            true
        })
    }
}
