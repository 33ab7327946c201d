//! Root containment for every client-supplied path.
//!
//! Validation happens in two passes. The lexical pass rejects absolute
//! overrides and `..` segments that climb above the root without touching
//! the filesystem. The canonical pass resolves symlinks and checks that the
//! result is still the root or one of its descendants.

use crate::errors::{AppError, AppResult};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Returns true when `relative` resolves to `root` or a path below it.
pub fn validate(root: &Path, relative: &str) -> bool {
    resolve(root, relative).is_ok()
}

/// Resolves `relative` against `root` and returns the canonical target.
///
/// The target itself need not exist; callers report NotFound when they
/// stat it. A missing root yields NotFound.
pub fn resolve(root: &Path, relative: &str) -> AppResult<PathBuf> {
    let Some(lexical) = normalize_relative(relative) else {
        return Err(reject(relative, "escapes root lexically"));
    };
    let canon_root = dunce::canonicalize(root).map_err(|e| {
        AppError::from_io(&e, "Path does not exist", "Error resolving root")
    })?;
    let canon = canonicalize_lenient(&canon_root.join(lexical)).map_err(|e| match e.kind() {
        io::ErrorKind::PermissionDenied => AppError::PermissionDenied("Permission denied".into()),
        _ => AppError::NotFound("Path does not exist".into()),
    })?;
    if canon.starts_with(&canon_root) {
        Ok(canon)
    } else {
        Err(reject(relative, "resolves outside root"))
    }
}

fn reject(relative: &str, reason: &str) -> AppError {
    tracing::warn!(path = relative, reason = reason, "containment violation");
    AppError::InvalidPath
}

/// Lexically normalizes a client path; `None` when it cannot stay below root.
fn normalize_relative(relative: &str) -> Option<PathBuf> {
    if relative.contains('\0') {
        return None;
    }
    let mut out = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Symlink hops followed while resolving a dangling link.
const MAX_LINK_HOPS: usize = 40;

/// Canonicalizes the deepest existing ancestor and re-appends the rest.
///
/// A dangling symlink is not a missing leaf: its target is followed so the
/// containment check sees where the link would actually land.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path.to_path_buf();
    let mut hops = 0;
    loop {
        match dunce::canonicalize(&current) {
            Ok(mut found) => {
                found.extend(missing.iter().rev());
                return Ok(found);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if is_symlink(&current) {
                    hops += 1;
                    if hops > MAX_LINK_HOPS {
                        return Err(io::Error::new(io::ErrorKind::Other, "too many levels of symbolic links"));
                    }
                    let target = fs::read_link(&current)?;
                    current = match current.parent() {
                        Some(parent) => parent.join(target),
                        None => target,
                    };
                    continue;
                }
                match (current.parent(), current.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        current = parent.to_path_buf();
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).map(|m| m.file_type().is_symlink()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_normalization() {
        assert_eq!(normalize_relative(""), Some(PathBuf::new()));
        assert_eq!(normalize_relative("a/./b/../c"), Some(PathBuf::from("a/c")));
        assert_eq!(normalize_relative("a/.."), Some(PathBuf::new()));
        assert_eq!(normalize_relative(".."), None);
        assert_eq!(normalize_relative("a/../../b"), None);
        assert_eq!(normalize_relative("/etc/passwd"), None);
        assert_eq!(normalize_relative("a\0b"), None);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_links_are_followed() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("not_yet.txt"), root.path().join("dang.txt")).unwrap();
        std::os::unix::fs::symlink("later/prog.nc", root.path().join("pending.nc")).unwrap();
        std::os::unix::fs::symlink("hop2", root.path().join("hop1")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone"), root.path().join("hop2")).unwrap();

        assert!(matches!(resolve(root.path(), "dang.txt"), Err(AppError::InvalidPath)));
        assert!(matches!(resolve(root.path(), "hop1/deeper.nc"), Err(AppError::InvalidPath)));
        let inside = resolve(root.path(), "pending.nc").unwrap();
        assert_eq!(inside, dunce::canonicalize(root.path()).unwrap().join("later/prog.nc"));
    }
}
