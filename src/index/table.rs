//! KeyIndex implementation
//!
//! HashSet-based key index with RwLock for concurrency.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::error::Result;

/// Set of keys currently stored in a book
#[derive(Debug, Default)]
pub struct KeyIndex {
    /// `None` until `ensure_loaded` has run
    keys: RwLock<Option<HashSet<String>>>,
}

impl KeyIndex {
    /// Create an empty, unloaded index
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the initial scan has completed
    pub fn is_loaded(&self) -> bool {
        self.keys.read().is_some()
    }

    /// Populate the index with `scan` unless that already happened
    ///
    /// `scan` runs under the write lock, so concurrent callers wait for it
    /// and it runs at most once. Returns true if this call did the load.
    pub fn ensure_loaded<F>(&self, scan: F) -> Result<bool>
    where
        F: FnOnce() -> Result<HashSet<String>>,
    {
        if self.is_loaded() {
            return Ok(false);
        }

        let mut keys = self.keys.write();
        if keys.is_some() {
            return Ok(false);
        }

        *keys = Some(scan()?);
        Ok(true)
    }

    /// Check for a key (false while unloaded)
    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .read()
            .as_ref()
            .is_some_and(|keys| keys.contains(key))
    }

    /// Record a key; returns true if it was not present before
    pub fn insert(&self, key: String) -> bool {
        self.keys
            .write()
            .get_or_insert_with(HashSet::new)
            .insert(key)
    }

    /// Forget a key; returns true if it was present
    pub fn remove(&self, key: &str) -> bool {
        self.keys
            .write()
            .as_mut()
            .is_some_and(|keys| keys.remove(key))
    }

    /// Sorted copy of the current keys
    pub fn snapshot(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .keys
            .read()
            .as_ref()
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// Number of keys (0 while unloaded)
    pub fn len(&self) -> usize {
        self.keys.read().as_ref().map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all keys and mark the index loaded-and-empty
    pub fn clear(&self) {
        *self.keys.write() = Some(HashSet::new());
    }
}
