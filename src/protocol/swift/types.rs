//! Type definitions for Swift operations

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One object entry from a container listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftObject {
    /// Object name (path within the container)
    pub name: String,

    /// Object size in bytes
    #[serde(default)]
    pub bytes: u64,

    /// Last modified timestamp as reported ("2024-03-01T09:30:00.000000")
    #[serde(default)]
    pub last_modified: Option<String>,

    /// Content type; folder markers report `application/directory`
    #[serde(default)]
    pub content_type: Option<String>,

    /// MD5 of the object content
    #[serde(default)]
    pub hash: Option<String>,
}

impl SwiftObject {
    /// Parse the listing timestamp into a UTC instant
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_modified.as_deref()?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Whether this entry is a folder marker rather than data
    pub fn is_folder_marker(&self) -> bool {
        self.name.ends_with('/')
            || self.content_type.as_deref() == Some(super::DIRECTORY_CONTENT_TYPE)
    }
}

/// One entry of a delimited listing: either a common prefix or an object
///
/// The store returns `{"subdir": "photos/2024/"}` for prefixes and full
/// object records otherwise; `serde(untagged)` picks the right shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SwiftListEntry {
    Subdir { subdir: String },
    Object(SwiftObject),
}

/// One container from an account listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftContainer {
    pub name: String,

    #[serde(default)]
    pub count: Option<u64>,

    #[serde(default)]
    pub bytes: Option<u64>,
}

/// One segment reference inside an SLO manifest
///
/// Serialized exactly as the finalize endpoint expects:
/// `{"path": "/container_segments/obj/000001", "etag": "...", "size_bytes": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub etag: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_entry_subdir_shape() {
        let entry: SwiftListEntry = serde_json::from_str(r#"{"subdir": "photos/2024/"}"#).unwrap();
        assert!(matches!(entry, SwiftListEntry::Subdir { subdir } if subdir == "photos/2024/"));
    }

    #[test]
    fn test_list_entry_object_shape() {
        let raw = r#"{
            "name": "photos/cat.jpg",
            "bytes": 1024,
            "last_modified": "2024-03-01T09:30:00.000000",
            "content_type": "image/jpeg",
            "hash": "abc123"
        }"#;
        let entry: SwiftListEntry = serde_json::from_str(raw).unwrap();
        let SwiftListEntry::Object(object) = entry else {
            panic!("expected object entry");
        };
        assert_eq!(object.name, "photos/cat.jpg");
        assert_eq!(object.bytes, 1024);
        assert!(object.modified_at().is_some());
        assert!(!object.is_folder_marker());
    }

    #[test]
    fn test_folder_marker_detection() {
        let trailing_slash = SwiftObject {
            name: "photos/".to_string(),
            bytes: 0,
            last_modified: None,
            content_type: None,
            hash: None,
        };
        assert!(trailing_slash.is_folder_marker());

        let directory_type = SwiftObject {
            name: "photos".to_string(),
            bytes: 0,
            last_modified: None,
            content_type: Some("application/directory".to_string()),
            hash: None,
        };
        assert!(directory_type.is_folder_marker());
    }

    #[test]
    fn test_manifest_entry_wire_format() {
        let entry = ManifestEntry {
            path: "/backups_segments/vm.img/000001".to_string(),
            etag: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            size_bytes: 104_857_600,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"path":"/backups_segments/vm.img/000001","etag":"d41d8cd98f00b204e9800998ecf8427e","size_bytes":104857600}"#
        );
    }
}
