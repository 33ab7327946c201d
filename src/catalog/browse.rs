//! Directory listing below the root.

use crate::{
    catalog::{is_listable, join_relative},
    errors::{AppError, AppResult},
    security,
};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub current_path: String,
    pub parent_path: Option<String>,
    pub items: Vec<DirectoryEntry>,
}

/// Lists the immediate children of `relative`, most recently modified first.
pub fn list(root: &Path, relative: &str) -> AppResult<Listing> {
    let target = security::resolve(root, relative)?;
    let meta = fs::metadata(&target)
        .map_err(|e| AppError::from_io(&e, "Path does not exist", "Error reading directory"))?;
    if !meta.is_dir() {
        return Err(AppError::InvalidArgument("Not a directory".into()));
    }

    let read_dir = fs::read_dir(&target).map_err(dir_error)?;
    let mut keyed: Vec<(SystemTime, DirectoryEntry)> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(dir_error)?;
        // file_type does not follow symlinks, so links are never listed
        let file_type = entry.file_type().map_err(dir_error)?;
        let kind = if file_type.is_dir() {
            EntryKind::Folder
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if kind == EntryKind::File && !is_listable(&name) {
            continue;
        }
        let modified = match entry.metadata() {
            Ok(m) => m.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            // removed between enumeration and stat
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(dir_error(e)),
        };
        let path = join_relative(relative, &name);
        keyed.push((modified, DirectoryEntry { name, kind, path }));
    }

    // stable: equal timestamps keep enumeration order
    keyed.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(Listing {
        current_path: relative.to_string(),
        parent_path: parent_of(relative),
        items: keyed.into_iter().map(|(_, entry)| entry).collect(),
    })
}

fn dir_error(e: io::Error) -> AppError {
    AppError::from_io(&e, "Path does not exist", "Error reading directory")
}

/// Parent of a client path; `""` for top-level folders, `None` at the root.
pub fn parent_of(relative: &str) -> Option<String> {
    if relative.is_empty() {
        return None;
    }
    Path::new(relative)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .map(|p| if p == "." { String::new() } else { p })
        .or(Some(String::new()))
}
