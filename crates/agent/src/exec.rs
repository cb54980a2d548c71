use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Runs an external command to completion, capturing combined stdout+stderr.
/// Used for quick, non-streaming ops (status checks, config writes via
/// helper tools, systemctl calls).
pub async fn run_to_completion(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("spawning {program}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        bail!(
            "{program} exited with {}: {}",
            output.status,
            if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
        );
    }
    Ok(stdout.trim().to_string())
}

/// Spawns a long-running command and streams its combined stdout/stderr
/// lines to `tx`, one `LogLine` per line, until the process exits. The
/// final send on the channel is the caller's responsibility (the exit
/// status is returned so the dispatcher can build the `TerminalEnvelope`).
pub async fn run_streaming(
    program: &str,
    args: &[&str],
    tx: mpsc::Sender<String>,
) -> Result<i32> {
    let mut child: Child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {program}"))?;

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let tx_out = tx.clone();
    let out_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx_out.send(line).await.is_err() {
                break;
            }
        }
    });
    let tx_err = tx;
    let err_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx_err.send(line).await.is_err() {
                break;
            }
        }
    });

    let status = child.wait().await.context("waiting for child process")?;
    let _ = out_task.await;
    let _ = err_task.await;

    Ok(status.code().unwrap_or(-1))
}

/// Writes `contents` to `path` atomically-ish via rename, matching the
/// convention the rest of the system uses for config files the agent owns
/// on disk (nftables.conf, smb.conf.d fragments, exports.d fragments).
pub fn write_rendered_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_to_completion_captures_stdout() {
        let out = run_to_completion("echo", &["hello"]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn run_to_completion_fails_on_nonzero_exit() {
        let err = run_to_completion("sh", &["-c", "exit 3"]).await;
        assert!(err.is_err());
    }

    #[test]
    fn write_rendered_file_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.conf");
        write_rendered_file(&path, "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
