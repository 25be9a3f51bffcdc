//! Concurrency tests for Store
//!
//! These tests verify:
//! - Concurrent writers to one key converge on exactly one value
//! - Readers never observe a torn or mixed payload
//! - A new key is readable as soon as its file is visible
//! - Writers on distinct keys all land
//! - Listing while writing returns consistent snapshots
//! - Destroy refuses to race in-flight work

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use bookshelf::config::{Config, FsyncPolicy};
use bookshelf::engine::Store;
use bookshelf::ShelfError;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_shared_store() -> (TempDir, Arc<Store>) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .fsync_policy(FsyncPolicy::FileOnly)
        .build();
    let store = Store::open("concurrent", &config, Arc::default()).unwrap();
    (temp_dir, Arc::new(store))
}

/// Payload whose fields must always agree with each other
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Stamp {
    writer: u32,
    body: Vec<u32>,
}

impl Stamp {
    fn new(writer: u32) -> Self {
        Self {
            writer,
            body: vec![writer; 2048],
        }
    }

    fn is_consistent(&self) -> bool {
        self.body.len() == 2048 && self.body.iter().all(|&v| v == self.writer)
    }
}

// =============================================================================
// Same-key Writer Tests
// =============================================================================

#[test]
fn test_concurrent_writers_converge_to_one_value() {
    let (_temp, store) = setup_shared_store();
    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers as usize));

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..10 {
                    store.insert("shared", &Stamp::new(w)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let result: Option<Stamp> = store.select_opt("shared").unwrap();
    let result = result.unwrap();
    assert!(result.writer < writers);
    assert!(result.is_consistent());
    assert_eq!(store.list_keys().unwrap(), vec!["shared".to_string()]);

    // No temp files survive
    let names: Vec<String> = std::fs::read_dir(store.dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["shared.pt".to_string()]);
}

#[test]
fn test_readers_never_see_torn_writes() {
    let (_temp, store) = setup_shared_store();
    store.insert("hot", &Stamp::new(0)).unwrap();

    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0;
                while !done.load(Ordering::SeqCst) || reads == 0 {
                    let value: Option<Stamp> = store.select_opt("hot").unwrap();
                    assert!(value.unwrap().is_consistent());
                    reads += 1;
                }
            })
        })
        .collect();

    let writers: Vec<_> = (1..=4)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..25 {
                    store.insert("hot", &Stamp::new(w)).unwrap();
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    for handle in readers {
        handle.join().unwrap();
    }
}

#[test]
fn test_new_key_visible_once_its_file_exists() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .root_dir(temp_dir.path())
        .fsync_policy(FsyncPolicy::FileAndDirectory)
        .build();
    let store = Arc::new(Store::open("visible", &config, Arc::default()).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..300u32 {
                store.insert(&format!("k{}", i), &i).unwrap();
            }
        })
    };

    for i in 0..300u32 {
        let key = format!("k{}", i);
        let path = store.path_for(&key).unwrap();
        while !path.exists() {
            thread::yield_now();
        }
        // The rename has happened, so the value must be readable
        assert_eq!(store.select(&key, u32::MAX).unwrap(), i);
        assert!(store.exists(&key).unwrap());
    }

    writer.join().unwrap();
    assert_eq!(store.len().unwrap(), 300);
}

// =============================================================================
// Distinct-key Tests
// =============================================================================

#[test]
fn test_concurrent_writes_to_distinct_keys() {
    let (_temp, store) = setup_shared_store();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("thread{}_key{}", t, i);
                    store.insert(&key, &format!("thread{}_value{}", t, i)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len().unwrap(), 100);
    for t in 0..4 {
        for i in 0..25 {
            let key = format!("thread{}_key{}", t, i);
            let expected = format!("thread{}_value{}", t, i);
            assert_eq!(store.select(&key, String::new()).unwrap(), expected);
        }
    }
}

#[test]
fn test_list_keys_while_writing() {
    let (_temp, store) = setup_shared_store();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200 {
                store.insert(&format!("k{:03}", i), &i).unwrap();
            }
        })
    };

    let mut last_len = 0;
    while !writer.is_finished() {
        let keys = store.list_keys().unwrap();
        // Keys only ever get added here, so snapshots grow monotonically
        assert!(keys.len() >= last_len);
        last_len = keys.len();
    }
    writer.join().unwrap();

    assert_eq!(store.list_keys().unwrap().len(), 200);
}

#[test]
fn test_interleaved_insert_delete_same_key() {
    let (_temp, store) = setup_shared_store();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50u32 {
                    if (i + t) % 2 == 0 {
                        store.insert("flip", &i).unwrap();
                    } else {
                        store.delete("flip").unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Index and disk agree whatever the final outcome
    let on_disk = store.path_for("flip").unwrap().exists();
    assert_eq!(store.exists("flip").unwrap(), on_disk);
}

// =============================================================================
// Destroy Race Tests
// =============================================================================

#[test]
fn test_destroy_racing_writers_never_corrupts() {
    let (_temp, store) = setup_shared_store();
    let barrier = Arc::new(Barrier::new(3));

    let writers: Vec<_> = (0..2)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..100u32 {
                    match store.insert(&format!("w{}_{}", t, i), &i) {
                        Ok(()) => {}
                        Err(ShelfError::Destroyed(_)) => return,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    barrier.wait();
    loop {
        match store.destroy() {
            Ok(()) => break,
            Err(ShelfError::ConcurrentDestroy(_)) => thread::yield_now(),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    for handle in writers {
        handle.join().unwrap();
    }

    assert!(store.is_destroyed());
    assert!(!store.dir().exists());
}
