//! # Bookshelf
//!
//! An embedded key-value store that keeps every value in its own file:
//! - One directory per book, one file per key
//! - Crash-safe replace-on-write (temp file + fsync + atomic rename)
//! - Schema-tolerant serialization (removed fields ignored, new fields default)
//! - Per-key writer locking, lock-free readers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Shelf (Book Registry)                      │
//! │            (one shared Store per book name)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Store Engine                             │
//! │        (key index, per-key locks, destroy gate)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Codec    │          │   Storage   │
//!   │ (envelope)  │          │ (paths and  │
//!   └─────────────┘          │ atomic I/O) │
//!                            └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use bookshelf::{Config, Shelf};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Default)]
//! #[serde(default)]
//! struct Settings {
//!     theme: String,
//!     volume: u8,
//! }
//!
//! let shelf = Shelf::open(Config::builder().root_dir("./data").build()).unwrap();
//! let book = shelf.book("prefs").unwrap();
//!
//! book.write("settings", &Settings { theme: "dark".into(), volume: 7 }).unwrap();
//! let settings: Settings = book.read("settings", Settings::default()).unwrap();
//! assert_eq!(settings.volume, 7);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod storage;
pub mod index;
pub mod engine;
pub mod registry;
pub mod book;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ShelfError, Result};
pub use config::{Config, FsyncPolicy};
pub use codec::{FnSerializer, SerializerRegistry, TypeSerializer};
pub use engine::Store;
pub use registry::Shelf;
pub use book::{Book, DeferredBook, Pending};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Bookshelf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
