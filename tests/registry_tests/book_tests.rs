//! Tests for Book and DeferredBook
//!
//! These tests verify:
//! - Facade calls map straight onto the store
//! - Missing fields need `#[serde(default)]` on the read type
//! - Deferred calls run off-thread and keep per-handle order
//! - Pending results surface errors unchanged

use std::thread;

use bookshelf::config::{Config, FsyncPolicy};
use bookshelf::{Book, Shelf, ShelfError};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_book() -> (TempDir, Shelf, Book) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .fsync_policy(FsyncPolicy::FileOnly)
        .build();
    let shelf = Shelf::open(config).unwrap();
    let book = shelf.book("book").unwrap();
    (temp_dir, shelf, book)
}

// =============================================================================
// Facade Tests
// =============================================================================

#[test]
fn test_write_is_chainable() {
    let (_temp, _shelf, book) = setup_temp_book();

    book.write("a", &1u8).unwrap().write("b", &2u8).unwrap();

    assert_eq!(book.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(book.len().unwrap(), 2);
    assert!(!book.is_empty().unwrap());
}

#[test]
fn test_read_default_and_opt() {
    let (_temp, _shelf, book) = setup_temp_book();

    assert_eq!(book.read("nothing", "fallback".to_string()).unwrap(), "fallback");
    assert_eq!(book.read_opt::<String>("nothing").unwrap(), None);

    book.write("something", &"here").unwrap();
    assert_eq!(book.read_opt::<String>("something").unwrap().as_deref(), Some("here"));
}

#[derive(Serialize)]
struct ProfileV1 {
    name: String,
}

#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(default)]
struct ProfileV2 {
    name: String,
    karma: u32,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct StrictProfileV2 {
    name: String,
    karma: u32,
}

#[test]
fn test_read_missing_field_needs_serde_default() {
    let (_temp, _shelf, book) = setup_temp_book();
    book.write("p", &ProfileV1 { name: "ann".to_string() }).unwrap();

    let tolerant: ProfileV2 = book.read("p", ProfileV2::default()).unwrap();
    assert_eq!(
        tolerant,
        ProfileV2 {
            name: "ann".to_string(),
            karma: 0
        }
    );

    let err = book.read_opt::<StrictProfileV2>("p").unwrap_err();
    assert!(matches!(err, ShelfError::Serialization(_)));
}

#[test]
fn test_path_points_into_book_dir() {
    let (_temp, _shelf, book) = setup_temp_book();

    let path = book.path("user/1").unwrap();
    assert_eq!(path.parent().unwrap(), book.dir());
    assert!(!path.exists());

    book.write("user/1", &1u8).unwrap();
    assert!(path.exists());
}

#[test]
fn test_clones_share_state() {
    let (_temp, _shelf, book) = setup_temp_book();
    let clone = book.clone();

    let writer = thread::spawn(move || {
        clone.write("from_thread", &true).unwrap();
    });
    writer.join().unwrap();

    assert!(book.read("from_thread", false).unwrap());
}

// =============================================================================
// Deferred Tests
// =============================================================================

#[test]
fn test_deferred_write_then_read() {
    let (_temp, _shelf, book) = setup_temp_book();
    let deferred = book.deferred().unwrap();

    deferred.write("k", vec![1u32, 2, 3]).wait().unwrap();
    let value = deferred.read("k", Vec::<u32>::new()).wait().unwrap();

    assert_eq!(value, vec![1, 2, 3]);
    assert!(book.exists("k").unwrap());
}

#[test]
fn test_deferred_preserves_submission_order() {
    let (_temp, _shelf, book) = setup_temp_book();
    let deferred = book.deferred().unwrap();

    // Queue everything before waiting on anything
    let writes: Vec<_> = (0..50u32).map(|i| deferred.write("counter", i)).collect();
    let exists = deferred.exists("counter");
    let delete = deferred.delete("other");
    let last = deferred.read("counter", 0u32);

    for pending in writes {
        pending.wait().unwrap();
    }
    assert!(exists.wait().unwrap());
    delete.wait().unwrap();
    assert_eq!(last.wait().unwrap(), 49);
}

#[test]
fn test_deferred_keys_and_destroy() {
    let (_temp, _shelf, book) = setup_temp_book();
    let deferred = book.deferred().unwrap();

    deferred.write("a", "x").wait().unwrap();
    deferred.write("b", "y").wait().unwrap();
    assert_eq!(
        deferred.keys().wait().unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );

    deferred.destroy().wait().unwrap();
    assert!(matches!(
        deferred.read_opt::<String>("a").wait().unwrap_err(),
        ShelfError::Destroyed(_)
    ));
}

#[test]
fn test_deferred_errors_pass_through() {
    let (_temp, _shelf, book) = setup_temp_book();
    let deferred = book.deferred().unwrap();

    let err = deferred.write("", 1u8).wait().unwrap_err();
    assert!(matches!(err, ShelfError::InvalidKey(_)));

    let err = deferred.write("k", None::<u8>).wait().unwrap_err();
    assert!(matches!(err, ShelfError::Serialization(_)));
}

#[test]
fn test_pending_try_wait_eventually_resolves() {
    let (_temp, _shelf, book) = setup_temp_book();
    let deferred = book.deferred().unwrap();

    let pending = deferred.write("k", 5u64);
    let result = loop {
        if let Some(result) = pending.try_wait() {
            break result;
        }
        thread::yield_now();
    };

    result.unwrap();
    assert_eq!(book.read("k", 0u64).unwrap(), 5);
}

#[test]
fn test_dropping_deferred_drains_queue() {
    let (_temp, _shelf, book) = setup_temp_book();

    {
        let deferred = book.deferred().unwrap();
        for i in 0..10u8 {
            // Results intentionally not awaited
            let _ = deferred.write(format!("k{}", i), i);
        }
    }

    assert_eq!(book.len().unwrap(), 10);
}
