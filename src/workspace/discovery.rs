//! Discovery of workspaces persisted under a storage root.
//!
//! A workspace exists on disk when `{storage_root}/{workspace}/` is a
//! directory. Discovery never consults the in-memory registry; use
//! [`crate::WorkspaceManager::all_workspaces`] for the union with loaded
//! workspaces.

use super::validate::WorkspaceId;
use std::path::Path;

/// List workspace names found directly under `storage_root`, sorted.
///
/// Hidden entries (leading `.`), non-directories and names that are not valid
/// workspace identifiers are skipped. A missing root yields an empty list.
pub fn discover(storage_root: &Path) -> Vec<WorkspaceId> {
    let entries = match std::fs::read_dir(storage_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(
                "Failed to read storage root {}: {}",
                storage_root.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    "Error while scanning {}: {}",
                    storage_root.display(),
                    e
                );
                continue;
            }
        };

        let file_name = entry.file_name();
        let name = match file_name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with('.') {
            continue;
        }
        // Follows symlinks, so a link to a workspace directory still counts.
        if !entry.path().is_dir() {
            continue;
        }

        match WorkspaceId::parse(name) {
            Ok(id) => found.push(id),
            Err(_) => {
                tracing::debug!("Skipping non-workspace directory: {}", name);
            }
        }
    }

    found.sort();
    found
}
