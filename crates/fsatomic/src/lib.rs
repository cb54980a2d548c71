//! Atomic JSON persistence over a single target path.
//!
//! Every component that persists state on disk goes through this crate:
//! no component in the workspace opens a JSON state file directly. The
//! save path is write-tmp, fsync, close, fsync-parent-dir, rename — so a
//! crash at any point leaves the target path either fully written or
//! untouched, never partial.

mod lock;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use lock::FileLock;

/// Load and deserialize JSON from `path`.
///
/// Returns `Ok(None)` if the file does not exist. Never reads `path.tmp`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing JSON from {}", path.display()))?;
    Ok(Some(value))
}

/// Serialize `value` and atomically replace `path` with the result.
///
/// Creates parent directories (mode `0750` on unix) if missing, writes to
/// `path.tmp`, fsyncs the file and its parent directory, then renames
/// `path.tmp` onto `path`. `mode` sets the permissions of the final file
/// (applied after rename, since `rename` does not carry permissions across
/// filesystems the way a plain write does on some platforms).
pub fn save_json<T: Serialize>(path: &Path, value: &T, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all_mode(parent, 0o750)
            .with_context(|| format!("creating parent directory {}", parent.display()))?;
    }

    let tmp_path = tmp_path_for(path);
    let body = serde_json::to_vec_pretty(value).context("serializing value to JSON")?;

    {
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("opening {}", tmp_path.display()))?;
        tmp_file
            .write_all(&body)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        tmp_file
            .sync_all()
            .with_context(|| format!("fsyncing {}", tmp_path.display()))?;
    }

    set_permissions(&tmp_path, mode)?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        sync_dir(parent).with_context(|| format!("fsyncing directory {}", parent.display()))?;
    }

    Ok(())
}

/// Run `f` while holding a coarse advisory lock on `path.lock`.
///
/// Serializes all readers and writers of `path` *within this process* that
/// go through `with_lock`; it is not a substitute for `save_json`'s own
/// atomicity, but is required around read-modify-write sequences.
pub fn with_lock<R>(path: &Path, f: impl FnOnce() -> Result<R>) -> Result<R> {
    let lock_path = lock_path_for(path);
    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all_mode(parent, 0o750)?;
    }
    let _guard = FileLock::acquire(&lock_path)
        .with_context(|| format!("acquiring lock {}", lock_path.display()))?;
    f()
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

fn lock_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    std::path::PathBuf::from(os)
}

#[cfg(unix)]
fn create_dir_all_mode(dir: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.exists() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true).mode(mode);
    builder
        .create(dir)
        .with_context(|| format!("creating {}", dir.display()))
}

#[cfg(not(unix))]
fn create_dir_all_mode(dir: &Path, _mode: u32) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perms)
        .with_context(|| format!("setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let f = File::open(dir)?;
    f.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("doc.json");

        let doc = Doc {
            name: "alpha".into(),
            count: 3,
        };
        save_json(&path, &doc, 0o640).unwrap();

        let loaded: Doc = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.json");
        let loaded: Option<Doc> = load_json(&path).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_never_leaves_bare_tmp_as_the_real_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        save_json(&path, &Doc { name: "a".into(), count: 1 }, 0o640).unwrap();
        // Simulate a crash mid-write on a second save: the tmp file is
        // written but the rename never happens. The prior `path` must
        // remain intact and parseable.
        let tmp = tmp_path_for(&path);
        fs::write(&tmp, b"{not valid json").unwrap();

        let loaded: Doc = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded.name, "a");
    }

    #[test]
    fn with_lock_serializes_read_modify_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.json");
        save_json(&path, &Doc { name: "c".into(), count: 0 }, 0o640).unwrap();

        for _ in 0..5 {
            with_lock(&path, || {
                let mut doc: Doc = load_json(&path)?.unwrap();
                doc.count += 1;
                save_json(&path, &doc, 0o640)?;
                Ok(())
            })
            .unwrap();
        }

        let loaded: Doc = load_json(&path).unwrap().unwrap();
        assert_eq!(loaded.count, 5);
    }

    #[test]
    fn parent_directories_are_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join("c.json");
        save_json(&path, &Doc { name: "x".into(), count: 1 }, 0o640).unwrap();
        assert!(path.exists());
    }
}
