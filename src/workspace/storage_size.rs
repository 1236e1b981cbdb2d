//! Per-workspace disk usage, reported by the workspace listing endpoint.

use std::io;
use std::path::{Path, PathBuf};

/// Sum the sizes of regular files below a workspace directory.
///
/// The directory itself may be a symlink; nothing below it is followed. A path
/// that is not a directory counts as 0. Entries that disappear mid-walk, such
/// as a graph file's `.tmp` sibling renamed by a concurrent write, are skipped.
pub fn dir_size_bytes(root: &Path) -> io::Result<u64> {
    if !root.is_dir() {
        return Ok(0);
    }
    let mut total = 0u64;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let meta = match entry.path().symlink_metadata() {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if meta.is_dir() {
                pending.push(entry.path());
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }
    Ok(total)
}
