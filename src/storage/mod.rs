//! Storage Module
//!
//! Per-key file layout and the crash-safe write protocol.
//!
//! ## Responsibilities
//! - Map book names and keys to deterministic file names
//! - Replace entry files atomically (temp file + fsync + rename)
//! - Idempotent removal and stale temp cleanup
//!
//! ## On-disk Layout
//! ```text
//! {root_dir}/
//!   └── {encoded book name}/
//!         ├── {encoded key}.pt         committed entry (one per key)
//!         └── {encoded key}.pt.tmp     in-flight write, renamed onto .pt
//! ```

pub mod atomic;
mod path;

pub use path::{
    book_dir, decode_name, encode_name, key_from_file_name, EntryPaths, PathResolver,
    MAX_ENCODED_LEN,
};

/// Extension of committed entry files
pub const ENTRY_EXTENSION: &str = ".pt";

/// Suffix appended to the entry file name while a write is in flight
pub const TEMP_SUFFIX: &str = ".tmp";
