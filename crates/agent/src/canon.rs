use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

/// Canonicalizes `path` and checks it falls under one of `allowed_prefixes`
/// by comparing canonicalized component lists, not string prefixes, so a
/// symlink pointing outside an allowed prefix is rejected even if its own
/// path string looks like it's inside one.
pub fn canonicalize_under(path: &Path, allowed_prefixes: &[PathBuf]) -> Result<PathBuf> {
    let canon = dunce_canonicalize(path)?;
    for prefix in allowed_prefixes {
        let canon_prefix = dunce_canonicalize(prefix).unwrap_or_else(|_| prefix.clone());
        if has_prefix(&canon, &canon_prefix) {
            return Ok(canon);
        }
    }
    bail!(
        "path {} does not canonicalize under any allowed prefix",
        path.display()
    )
}

/// Like `std::fs::canonicalize` but tolerates a path whose final component
/// does not yet exist (canonicalizes the existing parent, then rejoins).
fn dunce_canonicalize(path: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(p) => Ok(p),
        Err(_) => {
            let parent = path.parent().unwrap_or(Path::new("/"));
            let file_name = path.file_name();
            let canon_parent = std::fs::canonicalize(parent)?;
            Ok(match file_name {
                Some(name) => canon_parent.join(name),
                None => canon_parent,
            })
        }
    }
}

fn has_prefix(path: &Path, prefix: &Path) -> bool {
    let mut path_components = path.components();
    for prefix_component in prefix.components() {
        match path_components.next() {
            Some(c) if c == prefix_component => continue,
            _ => return false,
        }
    }
    // Reject a path that merely starts with the prefix's characters but
    // diverges at a component boundary, e.g. prefix `/srv/shares` must not
    // match `/srv/shares-evil`.
    matches!(
        path_components.next(),
        None | Some(Component::Normal(_)) | Some(Component::CurDir)
    ) || path == prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepts_path_under_allowed_prefix() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("shares");
        std::fs::create_dir(&allowed).unwrap();
        let target = allowed.join("docs");
        std::fs::create_dir(&target).unwrap();

        let result = canonicalize_under(&target, &[allowed.clone()]).unwrap();
        assert_eq!(result, std::fs::canonicalize(&target).unwrap());
    }

    #[test]
    fn rejects_path_outside_allowed_prefixes() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("shares");
        std::fs::create_dir(&allowed).unwrap();
        let outside = dir.path().join("etc");
        std::fs::create_dir(&outside).unwrap();

        assert!(canonicalize_under(&outside, &[allowed]).is_err());
    }

    #[test]
    fn rejects_symlink_escaping_prefix() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("shares");
        std::fs::create_dir(&allowed).unwrap();
        let outside = dir.path().join("secret");
        std::fs::create_dir(&outside).unwrap();

        let link = allowed.join("escape");
        #[cfg(unix)]
        std::os::unix::fs::symlink(&outside, &link).unwrap();

        #[cfg(unix)]
        assert!(canonicalize_under(&link, &[allowed]).is_err());
    }

    #[test]
    fn rejects_sibling_directory_with_shared_prefix_string() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("shares");
        std::fs::create_dir(&allowed).unwrap();
        let evil = dir.path().join("shares-evil");
        std::fs::create_dir(&evil).unwrap();

        assert!(canonicalize_under(&evil, &[allowed]).is_err());
    }

    #[test]
    fn tolerates_nonexistent_final_component() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("shares");
        std::fs::create_dir(&allowed).unwrap();
        let not_yet_created = allowed.join("new-share");

        assert!(canonicalize_under(&not_yet_created, &[allowed]).is_ok());
    }
}
