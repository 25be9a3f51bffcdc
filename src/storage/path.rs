//! Path Resolver
//!
//! Maps book names and keys to deterministic, collision-free file names.
//!
//! ## Encoding
//! Bytes in `[a-z0-9._-]` are kept as-is; every other byte of the UTF-8 key
//! becomes `%XX` (upper-case hex). The mapping is injective, never emits a
//! path separator, and stays unambiguous on case-insensitive filesystems
//! because upper-case letters are always escaped.

use std::path::{Path, PathBuf};

use crate::error::{Result, ShelfError};

use super::{ENTRY_EXTENSION, TEMP_SUFFIX};

/// Longest encoded stem we accept (255-byte name limit minus ".pt.tmp")
pub const MAX_ENCODED_LEN: usize = 248;

/// Final and temporary locations for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    /// Where the committed value lives
    pub final_path: PathBuf,

    /// Sibling written during an in-flight write, renamed onto `final_path`
    pub temp_path: PathBuf,
}

/// Resolves keys to paths inside one book directory
///
/// `max_key_len` bounds the *encoded* stem, since that is what has to fit in
/// a file name. Plain `[a-z0-9._-]` keys get the whole budget; every other
/// byte costs three.
#[derive(Debug, Clone)]
pub struct PathResolver {
    dir: PathBuf,
    max_key_len: usize,
}

impl PathResolver {
    /// `max_key_len` is capped at `MAX_ENCODED_LEN`
    pub fn new(dir: impl Into<PathBuf>, max_key_len: usize) -> Self {
        Self {
            dir: dir.into(),
            max_key_len: max_key_len.min(MAX_ENCODED_LEN),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Longest encoded stem this resolver accepts
    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    /// Compute the final and temp path for `key`
    pub fn resolve(&self, key: &str) -> Result<EntryPaths> {
        if key.is_empty() {
            return Err(ShelfError::InvalidKey("key must not be empty".to_string()));
        }

        let stem = encode_name(key);
        if stem.len() > self.max_key_len {
            return Err(ShelfError::InvalidKey(format!(
                "key encodes to {} bytes (max {})",
                stem.len(),
                self.max_key_len
            )));
        }

        let file_name = format!("{}{}", stem, ENTRY_EXTENSION);
        Ok(EntryPaths {
            final_path: self.dir.join(&file_name),
            temp_path: self.dir.join(format!("{}{}", file_name, TEMP_SUFFIX)),
        })
    }
}

/// Directory for the book called `name` under `root`
pub fn book_dir(root: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() {
        return Err(ShelfError::Config("book name must not be empty".to_string()));
    }

    let encoded = encode_name(name);
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(ShelfError::Config(format!(
            "book name too long once encoded: {} bytes",
            encoded.len()
        )));
    }

    Ok(root.join(encoded))
}

/// Key stored in `file_name`, if it is an entry file
///
/// "user%2F42.pt" → Some("user/42"); temp files and foreign files → None
pub fn key_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(ENTRY_EXTENSION)?;
    decode_name(stem)
}

/// Escape a raw name into a file-name-safe stem
pub fn encode_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw.as_bytes() {
        if is_kept(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(hex_digit(b >> 4));
            out.push(hex_digit(b & 0x0F));
        }
    }
    out
}

/// Reverse `encode_name`; None if `encoded` could not have come from it
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                let b = (hi << 4) | lo;
                // A kept byte is never escaped, so this name is not ours
                if is_kept(b) {
                    return None;
                }
                out.push(b);
                i += 3;
            }
            b if is_kept(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(out).ok()
}

fn is_kept(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-')
}

fn hex_digit(nibble: u8) -> char {
    char::from(b"0123456789ABCDEF"[nibble as usize])
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
