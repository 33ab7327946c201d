//! File content with metadata and optional companion parameters.

use crate::{
    catalog::{
        browse::parent_of,
        join_relative,
        params::{parse_parameters, ParameterSet},
    },
    errors::{AppError, AppResult},
    security,
};
use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

pub const PRIMARY_MARKER: &str = "_K1";
pub const COMPANION_MARKER: &str = "_K3";

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub content: String,
    pub size: u64,
    pub modified: String,
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ParameterSet>,
}

pub fn read(root: &Path, relative: &str) -> AppResult<FileRecord> {
    let target = security::resolve(root, relative)?;
    let meta = fs::metadata(&target).map_err(file_error)?;
    if !meta.is_file() {
        return Err(AppError::InvalidArgument("Not a file".into()));
    }
    let bytes = fs::read(&target).map_err(file_error)?;

    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    // not every filesystem records a birth time
    let created = meta.created().unwrap_or(modified);

    let parameters = attempt("companion parameters", || companion_parameters(root, relative));

    Ok(FileRecord {
        content: decode_text(bytes),
        size: meta.len(),
        modified: timestamp(modified),
        created: timestamp(created),
        parameters,
    })
}

fn file_error(e: std::io::Error) -> AppError {
    AppError::from_io(&e, "File does not exist", "Error reading file")
}

/// Runs a best-effort step; its error is logged and dropped.
pub fn attempt<T>(what: &str, step: impl FnOnce() -> AppResult<Option<T>>) -> Option<T> {
    match step() {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(step = what, error = %e, "best-effort step skipped");
            None
        }
    }
}

/// Parameters from the `_K3` sibling of a `_K1` file, if both exist.
fn companion_parameters(root: &Path, relative: &str) -> AppResult<Option<ParameterSet>> {
    let Some(name) = Path::new(relative).file_name().map(|n| n.to_string_lossy()) else {
        return Ok(None);
    };
    if !name.contains(PRIMARY_MARKER) {
        return Ok(None);
    }
    let companion = join_relative(
        &parent_of(relative).unwrap_or_default(),
        &name.replace(PRIMARY_MARKER, COMPANION_MARKER),
    );
    let path = security::resolve(root, &companion)?;
    match fs::metadata(&path) {
        Ok(m) if m.is_file() => {}
        _ => return Ok(None),
    }
    // strict UTF-8, an undecodable companion carries no parameters
    let text = String::from_utf8(fs::read(&path).map_err(file_error)?)
        .map_err(|e| AppError::Internal(format!("companion is not UTF-8: {e}")))?;
    Ok(parse_parameters(&text))
}

/// UTF-8 when valid, Latin-1 otherwise. Line endings become `\n`.
pub fn decode_text(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    };
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

/// Naive local time, with microseconds only when there are any.
fn timestamp(t: SystemTime) -> String {
    let local = DateTime::<Local>::from(t).naive_local();
    if local.nanosecond() / 1_000 == 0 {
        local.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        local.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}
