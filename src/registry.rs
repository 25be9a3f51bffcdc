//! Book Registry
//!
//! Maps book names to their store engines, one engine per name per process.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::book::Book;
use crate::codec::{SerializerRegistry, TypeSerializer};
use crate::config::Config;
use crate::engine::Store;
use crate::error::Result;

/// Entry point: owns the root directory and every open book
///
/// ## Concurrency:
/// - `books`: Mutex (held only while looking up or creating a store)
/// - Stores are shared as `Arc<Store>`, so every `Book` handle for the same
///   name sees the same index
pub struct Shelf {
    config: Config,

    /// Custom serializers, shared by all books
    serializers: Arc<SerializerRegistry>,

    /// Open stores by book name
    books: Mutex<HashMap<String, Arc<Store>>>,
}

impl Shelf {
    /// Open a shelf rooted at `config.root_dir`, creating it if needed
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.root_dir)?;

        tracing::info!(root = %config.root_dir.display(), "Opened shelf");

        Ok(Self {
            config,
            serializers: Arc::new(SerializerRegistry::new()),
            books: Mutex::new(HashMap::new()),
        })
    }

    /// Get the book called `name`, creating its directory on first access
    ///
    /// Repeated calls return handles to the same store. A destroyed store is
    /// replaced by a fresh one, so the name can be reused after `destroy`.
    pub fn book(&self, name: &str) -> Result<Book> {
        let mut books = self.books.lock();

        if let Some(store) = books.get(name) {
            if !store.is_destroyed() {
                return Ok(Book::new(Arc::clone(store)));
            }
            tracing::debug!(book = name, "Reopening destroyed book");
        }

        let store = Arc::new(Store::open(name, &self.config, Arc::clone(&self.serializers))?);
        books.insert(name.to_string(), Arc::clone(&store));

        Ok(Book::new(store))
    }

    /// The book named by `config.default_book`
    pub fn default_book(&self) -> Result<Book> {
        self.book(&self.config.default_book)
    }

    /// Register a custom serializer for `T` on every book of this shelf
    ///
    /// Returns true if it replaced an earlier registration.
    pub fn register<T, S>(&self, serializer: S) -> bool
    where
        T: 'static,
        S: TypeSerializer<T> + 'static,
    {
        self.serializers.register::<T, S>(serializer)
    }

    /// Names of books opened through this shelf (live ones only), sorted
    pub fn book_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .books
            .lock()
            .iter()
            .filter(|(_, store)| !store.is_destroyed())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Registry shared by every book of this shelf
    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        &self.serializers
    }
}
