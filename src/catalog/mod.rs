pub mod browse;
pub mod params;
pub mod read;
pub mod search;

use std::path::Path;

/// Program file extensions shown to clients, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["nc", "cnc", "mpf", "spf", "txt"];

/// Files are listed when their extension is allowed or they have none.
///
/// Dotfiles such as `.profile` count as extensionless; a trailing dot
/// (`name.`) is an empty extension and is not allowed.
pub fn is_listable(name: &str) -> bool {
    match Path::new(name).extension() {
        None => true,
        Some(ext) => {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        }
    }
}

/// Joins a client-facing relative path with a child name using `/`.
pub fn join_relative(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}
