//! Book Module
//!
//! The caller-facing handle for one book, plus deferred variants that run
//! each call on a worker thread.

mod deferred;

pub use deferred::{DeferredBook, Pending};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::Store;
use crate::error::Result;

/// Cheap, cloneable handle to a book's store
#[derive(Clone)]
pub struct Book {
    store: Arc<Store>,
}

impl std::fmt::Debug for Book {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Book")
            .field("name", &self.store.name())
            .field("dir", &self.store.dir())
            .finish()
    }
}

impl Book {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Save `value` under `key`; returns self for chaining
    pub fn write<T: Serialize + 'static>(&self, key: &str, value: &T) -> Result<&Self> {
        self.store.insert(key, value)?;
        Ok(self)
    }

    /// Read `key`, falling back to `default`
    ///
    /// The stored value may have been written by an older or newer shape of
    /// `T`. Fields `T` does not know are dropped. Fields the stored value
    /// lacks are filled from `T`'s `Default` only when `T` (or the field)
    /// carries `#[serde(default)]`; otherwise the read fails with
    /// `ShelfError::Serialization`.
    ///
    /// ```no_run
    /// # use serde::{Deserialize, Serialize};
    /// # fn demo(book: &bookshelf::Book) -> bookshelf::Result<()> {
    /// #[derive(Serialize, Deserialize, Default)]
    /// #[serde(default)]
    /// struct Prefs {
    ///     theme: String,
    ///     font_size: u32, // added later, 0 for old entries
    /// }
    ///
    /// let prefs: Prefs = book.read("prefs", Prefs::default())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn read<T: DeserializeOwned + 'static>(&self, key: &str, default: T) -> Result<T> {
        self.store.select(key, default)
    }

    /// Read `key`, None if it has no value
    ///
    /// Decodes like `read`, including the `#[serde(default)]` requirement.
    pub fn read_opt<T: DeserializeOwned + 'static>(&self, key: &str) -> Result<Option<T>> {
        self.store.select_opt(key)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.store.exists(key)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        self.store.list_keys()
    }

    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }

    /// Remove every entry and the book directory
    pub fn destroy(&self) -> Result<()> {
        self.store.destroy()
    }

    /// File that holds (or would hold) `key`
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        self.store.path_for(key)
    }

    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Handle whose calls run on a dedicated worker thread
    pub fn deferred(&self) -> Result<DeferredBook> {
        DeferredBook::spawn(self.clone())
    }

    /// True if both handles share one store
    pub fn same_store(&self, other: &Book) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}
