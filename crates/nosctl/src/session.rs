use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Path to the cached session cookie (`~/.config/nosctl/session`). Shared
/// across invocations so `nosctl login` followed by `nosctl pool list`
/// doesn't need to re-authenticate every time.
fn session_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let dir = PathBuf::from(home).join(".config").join("nosctl");
    if !dir.exists() {
        fs::create_dir_all(&dir).context("creating ~/.config/nosctl")?;
    }
    Ok(dir.join("session"))
}

pub fn load() -> Result<Option<String>> {
    let path = session_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let value = fs::read_to_string(&path)
        .context("reading cached session")?
        .trim()
        .to_string();
    Ok(if value.is_empty() { None } else { Some(value) })
}

#[cfg(unix)]
pub fn save(session_id: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let path = session_path()?;
    fs::write(&path, session_id).context("writing session cache")?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
        .context("setting session cache permissions")?;
    Ok(())
}

#[cfg(not(unix))]
pub fn save(session_id: &str) -> Result<()> {
    fs::write(session_path()?, session_id).context("writing session cache")
}

pub fn clear() -> Result<()> {
    let path = session_path()?;
    if path.exists() {
        fs::remove_file(&path).context("removing session cache")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_path_lives_under_home_config() {
        let home = std::env::var("HOME").expect("HOME should be set");
        let path = session_path().unwrap();
        assert!(path.to_string_lossy().starts_with(&home));
        assert!(path.to_string_lossy().ends_with(".config/nosctl/session"));
    }
}
