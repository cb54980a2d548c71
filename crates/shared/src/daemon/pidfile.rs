use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

/// Create `dir` (and parents) with default permissions if it does not exist.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    }
    Ok(())
}

pub fn write_pid(path: &Path) -> Result<()> {
    let pid = std::process::id();
    fs::write(path, pid.to_string()).with_context(|| format!("writing PID file {}", path.display()))
}

pub fn read_pid(path: &Path) -> Result<Option<u32>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading PID file {}", path.display()))?;
    let pid = contents
        .trim()
        .parse::<u32>()
        .with_context(|| format!("invalid PID in {}", path.display()))?;
    Ok(Some(pid))
}

pub fn remove_pid(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("removing PID file {}", path.display()))?;
    }
    Ok(())
}

pub fn is_process_running(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    kill(Pid::from_raw(pid as i32), signal)
        .with_context(|| format!("sending {signal:?} to PID {pid}"))
}

/// Errors if a live process already owns `path`; cleans up a stale pidfile
/// (process no longer running) rather than erroring on it.
pub fn verify_not_running(path: &Path) -> Result<()> {
    if let Some(pid) = read_pid(path)? {
        if is_process_running(pid) {
            bail!("already running (PID {pid})");
        }
        tracing::warn!(pid, "found stale PID file, cleaning up");
        remove_pid(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");
        write_pid(&path).unwrap();
        assert_eq!(read_pid(&path).unwrap(), Some(std::process::id()));
    }

    #[test]
    fn read_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_pid(&dir.path().join("nope.pid")).unwrap(), None);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");
        write_pid(&path).unwrap();
        remove_pid(&path).unwrap();
        assert!(!path.exists());
        remove_pid(&path).unwrap();
    }

    #[test]
    fn current_process_is_running() {
        assert!(is_process_running(std::process::id()));
        assert!(!is_process_running(999_999));
    }

    #[test]
    fn verify_not_running_cleans_up_stale_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.pid");
        fs::write(&path, "999999").unwrap();
        verify_not_running(&path).unwrap();
        assert!(!path.exists());
    }
}
