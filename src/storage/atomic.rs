//! Atomic File Writer
//!
//! Replace-on-write for entry files: stage into a temp sibling, fsync,
//! rename over the final path. A reader sees the old file or the new one,
//! never a partial write.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::config::FsyncPolicy;
use crate::error::{Result, ShelfError};

use super::{EntryPaths, TEMP_SUFFIX};

/// Write `bytes` to `paths.final_path` atomically
///
/// Steps:
/// 1. Write all bytes to the temp path (truncating any stale temp file)
/// 2. fsync the temp file
/// 3. Rename temp → final
/// 4. fsync the directory (FsyncPolicy::FileAndDirectory)
///
/// An `Err` means the final path is untouched and the temp file is removed.
/// Once the rename has happened the write is reported as done, even if the
/// directory fsync fails afterwards (see `commit`).
pub fn write_atomic(paths: &EntryPaths, bytes: &[u8], policy: FsyncPolicy) -> Result<()> {
    let result = stage(&paths.temp_path, bytes).and_then(|()| commit(paths, policy));

    if result.is_err() {
        discard(&paths.temp_path);
    }

    result
}

/// Write and fsync the temp file (steps 1-2)
///
/// Nothing is visible under the final path until `commit` runs.
pub fn stage(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)?;

    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;

    Ok(())
}

/// Rename the staged temp file into place (steps 3-4)
///
/// Only a failed rename is an error. After the rename the new value is
/// already visible, so a failed directory fsync is logged and the commit
/// still succeeds; the rename may not survive power loss in that case.
pub fn commit(paths: &EntryPaths, policy: FsyncPolicy) -> Result<()> {
    fs::rename(&paths.temp_path, &paths.final_path)?;

    if policy == FsyncPolicy::FileAndDirectory {
        if let Some(dir) = paths.final_path.parent() {
            if let Err(e) = sync_dir(dir) {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Directory fsync failed after rename; entry written but not yet durable"
                );
            }
        }
    }

    Ok(())
}

/// Read a whole entry file
///
/// Returns `ShelfError::NotFound` if the file does not exist.
pub fn read_all(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ShelfError::NotFound(path.display().to_string()),
        _ => ShelfError::Io(e),
    })
}

/// Remove an entry file; a missing file is not an error
///
/// Returns true if a file was actually removed.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ShelfError::Io(e)),
    }
}

/// Delete temp files left behind by a crash mid-write
///
/// Returns the number of files removed.
pub fn remove_stale_temps(dir: &Path) -> Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let is_temp = name.to_str().is_some_and(|n| n.ends_with(TEMP_SUFFIX));

        if is_temp && entry.file_type()?.is_file() && remove(&entry.path())? {
            tracing::debug!(path = %entry.path().display(), "Removed stale temp file");
            removed += 1;
        }
    }

    Ok(removed)
}

/// Best-effort temp cleanup after a failed write
fn discard(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

/// fsync a directory so a completed rename survives power loss
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(test)]
    {
        if fail_dir_sync::is_set() {
            return Err(ShelfError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "directory sync disabled for test",
            )));
        }
    }

    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
