//! Exclusive-lock file primitives
//!
//! Every slide file is read and written under an OS-level exclusive lock
//! (flock semantics via `fs2`). Writes go to a sibling temp file that is
//! renamed over the target, so a reader sees either the old or the new
//! contents in full. The same mechanism backs the collection-wide reorder
//! lock held by [`crate::slide::SlideStore`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use fs2::FileExt;
use tracing::debug;

/// Distinguishes temp files of concurrent writers in one process
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Locked read/write of whole files
pub trait FileStore: Send + Sync {
    /// Read the full contents of `path` while holding an exclusive lock.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    fn read_locked(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    /// Replace the contents of `path` while holding an exclusive lock,
    /// creating the file and its parent directories if needed.
    ///
    /// Readers never observe a partially written file.
    fn write_locked(&self, path: &Path, data: &[u8]) -> io::Result<()>;
}

/// Filesystem-backed [`FileStore`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LockedFs;

impl FileStore for LockedFs {
    fn read_locked(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        file.lock_exclusive()?;
        let mut buf = Vec::new();
        let result = file.read_to_end(&mut buf);
        file.unlock()?;
        result?;

        Ok(Some(buf))
    }

    fn write_locked(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = tmp_path(path);
        let result = write_then_rename(&tmp, path, data);
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;

        debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        ".{name}.tmp.{}.{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

/// The lock stays held across the rename, so a reader that opens the new
/// file blocks until the writer is done with it.
fn write_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(tmp)?;

    file.lock_exclusive()?;
    let result = file
        .write_all(data)
        .and_then(|()| file.sync_data())
        .and_then(|()| fs::rename(tmp, path));
    file.unlock()?;
    result
}

/// Exclusive lock on a lock file, released when dropped
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
}

impl FileLockGuard {
    /// Block until an exclusive lock on `path` is held.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;

        Ok(Self { file })
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        let _ = self.file.unlock();
    }
}
