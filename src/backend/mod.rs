//! Unified backend abstraction over the three storage services
//!
//! One trait, three implementations: the Swift-style archive store and two
//! S3-compatible stores. The orchestrator in `crate::core` only ever talks
//! to [`StorageBackend`]; protocol differences (token auth vs SigV4, SLO
//! manifests vs multipart sessions) stay inside the adapters.

mod archive;
mod ncloud;
mod object;
mod s3_common;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use archive::ArchiveBackend;
pub use ncloud::NcloudBackend;
pub use object::ObjectBackend;
pub use types::{
    direct_child_name, finalize_entries, validate_remote_key, ContainerInfo, EntryKind,
    RemoteEntry,
};

use crate::config::Credentials;
use crate::core::{CancelFlag, ProgressFn};
use crate::error::Result;

/// The three storage services this engine can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Swift-style archive store
    Archive,

    /// S3-compatible object store
    Object,

    /// S3-compatible store with storage-class tiers
    Ncloud,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Archive => "archive",
            BackendKind::Object => "object",
            BackendKind::Ncloud => "ncloud",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = crate::error::StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "archive" => Ok(BackendKind::Archive),
            "object" => Ok(BackendKind::Object),
            "ncloud" => Ok(BackendKind::Ncloud),
            other => Err(crate::error::StorageError::InvalidName(format!(
                "unknown backend kind: {other}"
            ))),
        }
    }
}

/// Uniform contract implemented by all three backends
///
/// Every call names its container and path explicitly; adapters hold no
/// "current location" state. Progress callbacks receive 0–100 and transfers
/// honor the cooperative [`CancelFlag`] between parts.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which service this adapter talks to
    fn kind(&self) -> BackendKind;

    /// Verify the credentials with a round-trip
    async fn test_connection(&self) -> Result<()>;

    /// List the account's containers/buckets
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>>;

    /// Create a container/bucket, validating its name
    async fn create_container(&self, name: &str) -> Result<()>;

    /// Normalized folder-view listing directly below `prefix`
    async fn list_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: &str,
    ) -> Result<Vec<RemoteEntry>>;

    /// Recursive listing of all file objects below `prefix`
    async fn list_all_files(&self, container: &str, prefix: &str) -> Result<Vec<RemoteEntry>>;

    /// Upload a local file; returns bytes uploaded
    async fn upload(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64>;

    /// Download an object to `dest_path`; returns bytes downloaded
    async fn download(
        &self,
        container: &str,
        key: &str,
        dest_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64>;

    /// Delete one object; for a large-object manifest this removes only the
    /// manifest itself
    async fn delete(&self, container: &str, key: &str) -> Result<()>;

    /// Delete a large object together with its segments, where the backend
    /// distinguishes the two (plain delete elsewhere)
    async fn delete_large_object(&self, container: &str, key: &str) -> Result<()>;

    /// Delete every object below `prefix`; returns the number removed
    async fn delete_prefix(&self, container: &str, prefix: &str) -> Result<u64>;

    /// Create a zero-byte folder marker
    async fn create_folder(&self, container: &str, path: &str) -> Result<()>;
}

/// Build the adapter for `kind` from stored credentials
pub fn connect(kind: BackendKind, credentials: Credentials) -> Result<Arc<dyn StorageBackend>> {
    match kind {
        BackendKind::Archive => Ok(Arc::new(ArchiveBackend::new(credentials)?)),
        BackendKind::Object => Ok(Arc::new(ObjectBackend::new(credentials)?)),
        BackendKind::Ncloud => Ok(Arc::new(NcloudBackend::new(credentials)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_round_trip() {
        for kind in [BackendKind::Archive, BackendKind::Object, BackendKind::Ncloud] {
            let parsed: BackendKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("gcs".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_serde_keys() {
        assert_eq!(
            serde_json::to_string(&BackendKind::Archive).unwrap(),
            "\"archive\""
        );
        let kind: BackendKind = serde_json::from_str("\"ncloud\"").unwrap();
        assert_eq!(kind, BackendKind::Ncloud);
    }
}
