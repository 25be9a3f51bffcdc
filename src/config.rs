//! Configuration for Bookshelf
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::storage::MAX_ENCODED_LEN;

/// Main configuration for a Bookshelf instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory holding one sub-directory per book
    /// Internal structure:
    ///   {root_dir}/
    ///     └── {book}/
    ///           ├── {key}.pt        (one file per entry)
    ///           └── {key}.pt.tmp    (only while a write is in flight)
    pub root_dir: PathBuf,

    /// Durability strategy applied by every atomic write
    pub fsync_policy: FsyncPolicy,

    // -------------------------------------------------------------------------
    // Key Configuration
    // -------------------------------------------------------------------------
    /// Max key length in bytes *after* file name encoding
    ///
    /// Bytes outside `[a-z0-9._-]` encode to three bytes each. Values above
    /// `storage::MAX_ENCODED_LEN` are capped to it.
    pub max_key_len: usize,

    /// Name of the book returned by `Shelf::default_book`
    pub default_book: String,
}

/// How far an atomic write goes to make itself durable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// fsync the temp file before renaming it into place
    FileOnly,

    /// Also fsync the parent directory after the rename (unix only)
    FileAndDirectory,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./bookshelf_data"),
            fsync_policy: FsyncPolicy::FileAndDirectory,
            max_key_len: MAX_ENCODED_LEN,
            default_book: "bookshelf".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the root directory (parent of all book directories)
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the fsync policy
    pub fn fsync_policy(mut self, policy: FsyncPolicy) -> Self {
        self.config.fsync_policy = policy;
        self
    }

    /// Set the maximum encoded key length (in bytes)
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.config.max_key_len = len;
        self
    }

    /// Set the name of the default book
    pub fn default_book(mut self, name: impl Into<String>) -> Self {
        self.config.default_book = name.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
