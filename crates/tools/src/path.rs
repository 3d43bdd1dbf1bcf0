//! Workspace-root path containment — the only sandboxing guarantee shell
//! and file tools get (`spec.md` §1 Non-goals): reject `..` traversal and
//! absolute paths, then verify the resolved path stays under the root.

use std::path::{Component, Path, PathBuf};

use chatcore_domain::error::{Error, ErrorCode, Result};

pub fn validate_path(workspace_root: &Path, requested: &str) -> Result<PathBuf> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(Error::new(
            ErrorCode::FileAccessDenied,
            format!("absolute paths are not allowed; use a path relative to the workspace root (got '{requested}')"),
        ));
    }
    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::new(
                ErrorCode::FileAccessDenied,
                "path must not contain '..' components",
            ));
        }
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| Error::new(ErrorCode::DirectoryNotFound, format!("cannot resolve workspace root: {e}")))?;

    let candidate = canonical_root.join(requested_path);
    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| Error::new(ErrorCode::FileNotFound, format!("cannot resolve path: {e}")))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| Error::new(ErrorCode::DirectoryNotFound, format!("cannot resolve ancestor: {e}")))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(Error::new(
            ErrorCode::FileAccessDenied,
            format!("path '{requested}' resolves outside the workspace root"),
        ));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal() {
        let ws = tempfile::tempdir().unwrap();
        assert!(validate_path(ws.path(), "../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        let ws = tempfile::tempdir().unwrap();
        let abs = if cfg!(windows) { "C:\\Windows" } else { "/etc/passwd" };
        assert!(validate_path(ws.path(), abs).is_err());
    }

    #[test]
    fn accepts_nested_new_file() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(ws.path().join("subdir")).unwrap();
        assert!(validate_path(ws.path(), "subdir/new.txt").is_ok());
    }
}
