use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

/// Lines the `Log(cursor, max)` pull API returns, plus the cursor to resume
/// from on the next call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub lines: Vec<String>,
    pub next_cursor: u64,
}

fn log_path(state_dir: &Path, tx_id: Uuid) -> PathBuf {
    state_dir.join("tx-logs").join(format!("{tx_id}.log"))
}

/// Appends one log line for `tx_id`, creating the log file and its parent
/// directory on first use. Not atomic-replace like `fsatomic`'s JSON
/// documents: log files are append-only and never read-modify-written.
pub fn append_line(state_dir: &Path, tx_id: Uuid, line: &str) -> Result<()> {
    let path = log_path(state_dir, tx_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    writeln!(file, "{line}").with_context(|| format!("appending to {}", path.display()))
}

/// Reads up to `max` lines starting at line index `cursor` (0-based).
/// `next_cursor` always advances past whatever was returned, even when
/// fewer than `max` lines exist, so a client polling past the end simply
/// gets an empty page with an unchanged cursor.
pub fn read_from_cursor(state_dir: &Path, tx_id: Uuid, cursor: u64, max: usize) -> Result<LogPage> {
    let path = log_path(state_dir, tx_id);
    if !path.exists() {
        return Ok(LogPage { lines: Vec::new(), next_cursor: cursor });
    }
    let file = std::fs::File::open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    let mut index: u64 = 0;
    let mut next_cursor = cursor;
    for line in reader.lines() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if index >= cursor {
            if lines.len() >= max {
                break;
            }
            lines.push(line);
            next_cursor = index + 1;
        }
        index += 1;
    }
    Ok(LogPage { lines, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        append_line(dir.path(), id, "line one").unwrap();
        append_line(dir.path(), id, "line two").unwrap();

        let page = read_from_cursor(dir.path(), id, 0, 10).unwrap();
        assert_eq!(page.lines, vec!["line one", "line two"]);
        assert_eq!(page.next_cursor, 2);
    }

    #[test]
    fn cursor_resumes_where_it_left_off() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        for i in 0..5 {
            append_line(dir.path(), id, &format!("line {i}")).unwrap();
        }

        let first = read_from_cursor(dir.path(), id, 0, 2).unwrap();
        assert_eq!(first.lines, vec!["line 0", "line 1"]);
        assert_eq!(first.next_cursor, 2);

        let second = read_from_cursor(dir.path(), id, first.next_cursor, 2).unwrap();
        assert_eq!(second.lines, vec!["line 2", "line 3"]);
    }

    #[test]
    fn reading_past_end_returns_empty_page() {
        let dir = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        append_line(dir.path(), id, "only line").unwrap();

        let page = read_from_cursor(dir.path(), id, 1, 10).unwrap();
        assert!(page.lines.is_empty());
        assert_eq!(page.next_cursor, 1);
    }

    #[test]
    fn missing_log_file_returns_empty_page() {
        let dir = TempDir::new().unwrap();
        let page = read_from_cursor(dir.path(), Uuid::new_v4(), 0, 10).unwrap();
        assert!(page.lines.is_empty());
    }
}
