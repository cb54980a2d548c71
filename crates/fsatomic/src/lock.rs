use std::fs::{File, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use fs2::FileExt;

/// An exclusive advisory lock on a `.lock` file, held for the lifetime of
/// the guard. Released automatically (and the fd dropped) when the guard
/// goes out of scope; the lock file itself is left on disk intentionally
/// so concurrent lockers always agree on one inode.
pub struct FileLock {
    file: File,
}

impl FileLock {
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("opening lock file {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking {}", lock_path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
