//! Index Module
//!
//! In-memory set of live keys for one book.
//!
//! ## Responsibilities
//! - Answer `exists` and `list_keys` without touching disk
//! - Build lazily from a directory scan, at most once per store
//! - Stay in step with disk on every insert/delete
//!
//! ## Data Structure Choice
//! HashSet wrapped in RwLock:
//! - `None` until the first scan (the store's Uninitialized state)
//! - Many concurrent readers, short exclusive sections for mutation
//! - Snapshots are sorted copies, never views of the live set

mod table;

pub use table::KeyIndex;
