//! Common types for the backend abstraction

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Whether a listing entry is a file or an inferred folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One normalized entry of a prefix listing
///
/// Folders are inferred from common-prefix responses or zero-byte marker
/// objects; both arrive here in the same shape, deduplicated by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Name relative to the listed prefix, without a trailing slash
    pub name: String,

    pub kind: EntryKind,

    /// Size in bytes (0 for folders)
    pub size: u64,

    pub last_modified: Option<DateTime<Utc>>,

    /// Full key (files) or prefix ending in `/` (folders)
    pub full_path: String,
}

/// One container/bucket of the connected backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// Validate a remote object key: non-empty, no leading `/`, no empty segments
pub fn validate_remote_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidName(
            "object key cannot be empty".to_string(),
        ));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidName(format!(
            "{key:?}: keys cannot start with '/'"
        )));
    }
    // A single trailing slash marks a folder; empty interior segments are not allowed.
    let without_marker = key.strip_suffix('/').unwrap_or(key);
    if without_marker.is_empty() || without_marker.split('/').any(str::is_empty) {
        return Err(StorageError::InvalidName(format!(
            "{key:?}: keys cannot contain empty segments"
        )));
    }
    Ok(())
}

/// Name of the entry directly below `prefix`, if `full_path` is one
///
/// Returns `None` for the prefix itself and for entries nested deeper than
/// one level. A trailing slash on the entry is stripped.
pub fn direct_child_name(prefix: &str, full_path: &str) -> Option<String> {
    let relative = full_path.strip_prefix(prefix)?;
    let name = relative.strip_suffix('/').unwrap_or(relative);
    if name.is_empty() || name.contains('/') {
        return None;
    }
    Some(name.to_string())
}

/// Merge folder and file entries into one listing: folders first, each group
/// sorted case-insensitively, duplicates (by name) dropped
pub fn finalize_entries(
    mut folders: Vec<RemoteEntry>,
    mut files: Vec<RemoteEntry>,
) -> Vec<RemoteEntry> {
    folders.sort_by_key(|entry| entry.name.to_lowercase());
    files.sort_by_key(|entry| entry.name.to_lowercase());

    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(folders.len() + files.len());
    for entry in folders.into_iter().chain(files) {
        if seen.insert(entry.name.clone()) {
            entries.push(entry);
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(name: &str) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            kind: EntryKind::Folder,
            size: 0,
            last_modified: None,
            full_path: format!("{name}/"),
        }
    }

    fn file(name: &str, size: u64) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            kind: EntryKind::File,
            size,
            last_modified: None,
            full_path: name.to_string(),
        }
    }

    #[test]
    fn test_validate_remote_key() {
        assert!(validate_remote_key("file.txt").is_ok());
        assert!(validate_remote_key("dir/file.txt").is_ok());
        assert!(validate_remote_key("dir/").is_ok());
        assert!(validate_remote_key("").is_err());
        assert!(validate_remote_key("/leading").is_err());
        assert!(validate_remote_key("a//b").is_err());
        assert!(validate_remote_key("/").is_err());
    }

    #[test]
    fn test_direct_child_name() {
        assert_eq!(
            direct_child_name("photos/", "photos/cat.jpg"),
            Some("cat.jpg".to_string())
        );
        assert_eq!(
            direct_child_name("photos/", "photos/2024/"),
            Some("2024".to_string())
        );
        // Deeper entries are not direct children
        assert_eq!(direct_child_name("photos/", "photos/2024/cat.jpg"), None);
        // The prefix itself is not a child
        assert_eq!(direct_child_name("photos/", "photos/"), None);
        // Unrelated path
        assert_eq!(direct_child_name("photos/", "videos/cat.mp4"), None);
        // Root prefix
        assert_eq!(direct_child_name("", "cat.jpg"), Some("cat.jpg".to_string()));
    }

    #[test]
    fn test_finalize_entries_sorts_and_dedupes() {
        let folders = vec![folder("zeta"), folder("Alpha")];
        let files = vec![file("beta.txt", 10), file("Alpha", 5), file("alpha.txt", 1)];

        let entries = finalize_entries(folders, files);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        // Folders first (sorted), then files; the file shadowed by the
        // "Alpha" folder is dropped.
        assert_eq!(names, vec!["Alpha", "zeta", "alpha.txt", "beta.txt"]);
        assert_eq!(entries[0].kind, EntryKind::Folder);
        assert_eq!(entries[2].kind, EntryKind::File);
    }
}
