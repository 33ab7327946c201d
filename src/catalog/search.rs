//! Filename search over the whole tree.

use crate::{
    catalog::{is_listable, join_relative},
    config::Limits,
    errors::{AppError, AppResult},
};
use serde::Serialize;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Hard cap on hits returned by one search.
pub const MAX_RESULTS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub path: String,
    pub folder: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    pub max_dirs: usize,
    pub budget: Duration,
}

impl From<&Limits> for SearchLimits {
    fn from(l: &Limits) -> Self {
        Self { max_dirs: l.search_max_dirs, budget: Duration::from_millis(l.search_budget_ms) }
    }
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self::from(&Limits::default())
    }
}

/// Depth-first, pre-order search for files whose name contains `query`.
///
/// Stops at [`MAX_RESULTS`] hits or when `limits` run out, returning what
/// was found so far. Symlinks are never followed.
pub fn search(root: &Path, query: &str, limits: &SearchLimits) -> AppResult<Vec<SearchHit>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let needle = query.to_lowercase();
    let root = dunce::canonicalize(root)
        .map_err(|e| AppError::from_io(&e, "Path does not exist", "Search error"))?;

    let started = Instant::now();
    // the root itself
    let mut dirs_scanned = 1usize;
    let mut hits = Vec::new();
    let walker = WalkDir::new(&root).follow_links(false).contents_first(false).min_depth(1);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if skippable(&e) => {
                tracing::debug!(path = ?e.path(), error = %e, "skipping directory");
                continue;
            }
            Err(e) => return Err(AppError::Internal(format!("Search error: {e}"))),
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            if dirs_scanned >= limits.max_dirs || started.elapsed() >= limits.budget {
                tracing::warn!(
                    dirs_scanned = dirs_scanned,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    hits = hits.len(),
                    "search budget exhausted, returning partial results"
                );
                break;
            }
            dirs_scanned += 1;
        } else if file_type.is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_lowercase().contains(&needle) || !is_listable(&name) {
                continue;
            }
            let folder = folder_of(&root, entry.path());
            let path = join_relative(&folder, &name);
            hits.push(SearchHit { name, path, folder });
            if hits.len() >= MAX_RESULTS {
                break;
            }
        }
    }

    tracing::debug!(query = query, hits = hits.len(), dirs_scanned = dirs_scanned, "search finished");
    Ok(hits)
}

/// Unreadable or vanished directories are left out of the results.
fn skippable(e: &walkdir::Error) -> bool {
    e.io_error()
        .map(|io| matches!(io.kind(), io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound))
        .unwrap_or(false)
}

/// `/`-joined folder of `path` relative to `root`; empty at the root.
fn folder_of(root: &Path, path: &Path) -> String {
    let Some(parent) = path.parent().and_then(|p| p.strip_prefix(root).ok()) else {
        return String::new();
    };
    parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn empty_query_does_not_touch_filesystem() {
        let hits = search(Path::new("/definitely/not/a/root"), "", &SearchLimits::default()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn missing_root_is_not_found() {
        let err = search(Path::new("/definitely/not/a/root"), "x", &SearchLimits::default()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn case_insensitive_with_allow_list() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("DOOR_A.NC").touch().unwrap();
        root.child("jobs/2024/big_door.mpf").touch().unwrap();
        root.child("jobs/door.png").touch().unwrap();
        root.child("door_folder/readme").touch().unwrap();
        root.child("window.nc").touch().unwrap();

        let mut hits = search(root.path(), "Door", &SearchLimits::default()).unwrap();
        hits.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            hits,
            vec![
                SearchHit { name: "DOOR_A.NC".into(), path: "DOOR_A.NC".into(), folder: "".into() },
                SearchHit {
                    name: "big_door.mpf".into(),
                    path: "jobs/2024/big_door.mpf".into(),
                    folder: "jobs/2024".into()
                },
            ]
        );
    }

    #[test]
    fn capped_at_fifty() {
        let root = assert_fs::TempDir::new().unwrap();
        for i in 0..40 {
            root.child(format!("a/part{i}.nc")).touch().unwrap();
            root.child(format!("b/part{i}.nc")).touch().unwrap();
        }
        let hits = search(root.path(), "PART", &SearchLimits::default()).unwrap();
        assert_eq!(hits.len(), MAX_RESULTS);
        assert!(hits.iter().all(|h| h.name.to_lowercase().contains("part")));
    }

    #[test]
    fn directory_budget_stops_early() {
        let root = assert_fs::TempDir::new().unwrap();
        for i in 0..5 {
            root.child(format!("d{i}/hit.nc")).touch().unwrap();
        }
        let limits = SearchLimits { max_dirs: 2, budget: Duration::from_secs(60) };
        let hits = search(root.path(), "hit", &limits).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn zero_budget_returns_partial_result() {
        let root = assert_fs::TempDir::new().unwrap();
        root.child("top_hit.nc").touch().unwrap();
        root.child("a/hit.nc").touch().unwrap();
        root.child("a/b/hit.nc").touch().unwrap();
        let limits = SearchLimits { max_dirs: usize::MAX, budget: Duration::ZERO };
        let hits = search(root.path(), "hit", &limits).unwrap();
        assert!(hits.len() < 3);
        assert!(hits.iter().all(|h| h.folder.is_empty()));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directories_are_skipped() {
        use std::os::unix::fs::PermissionsExt;
        let root = assert_fs::TempDir::new().unwrap();
        root.child("locked/hidden.nc").touch().unwrap();
        root.child("open/visible.nc").touch().unwrap();
        let locked = root.child("locked");
        std::fs::set_permissions(locked.path(), std::fs::Permissions::from_mode(0o000)).unwrap();
        // privileged users read through mode bits
        let enforced = std::fs::read_dir(locked.path()).is_err();

        let result = search(root.path(), ".nc", &SearchLimits::default());
        std::fs::set_permissions(locked.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        let hits = result.unwrap();
        if enforced {
            assert_eq!(hits.len(), 1);
        }
        assert!(hits.iter().any(|h| h.path == "open/visible.nc"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let root = assert_fs::TempDir::new().unwrap();
        let outside = assert_fs::TempDir::new().unwrap();
        outside.child("secret.nc").touch().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("out")).unwrap();
        std::os::unix::fs::symlink(root.path(), root.path().join("loop")).unwrap();
        root.child("inside_secret.nc").touch().unwrap();

        let hits = search(root.path(), "secret", &SearchLimits::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "inside_secret.nc");
    }
}
