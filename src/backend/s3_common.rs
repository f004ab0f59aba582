//! Shared adapter plumbing for the two S3-compatible backends
//!
//! The object and ncloud stores speak the same protocol and differ only in
//! endpoint, transfer tuning, and storage-class handling; both adapters
//! delegate to this core.

use std::path::Path;

use crate::core::{CancelFlag, ProgressFn};
use crate::error::{Result, StorageError};
use crate::protocol::s3::S3Client;

use super::types::{
    direct_child_name, finalize_entries, validate_remote_key, ContainerInfo, EntryKind,
    RemoteEntry,
};

/// Backend-agnostic S3 adapter core
pub(super) struct S3Adapter {
    client: S3Client,
}

impl S3Adapter {
    pub(super) fn new(client: S3Client) -> Self {
        Self { client }
    }

    pub(super) async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await.map_err(Into::into)
    }

    pub(super) async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let buckets = self.client.list_buckets().await?;
        Ok(buckets
            .into_iter()
            .map(|bucket| ContainerInfo {
                name: bucket.name,
                created: bucket.creation_date,
            })
            .collect())
    }

    pub(super) async fn create_container(&self, name: &str) -> Result<()> {
        self.client.create_bucket(name).await.map_err(Into::into)
    }

    pub(super) async fn list_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: &str,
    ) -> Result<Vec<RemoteEntry>> {
        let listing = self
            .client
            .list_prefix(container, prefix, Some(delimiter))
            .await?;

        let mut folders = Vec::new();
        let mut files = Vec::new();

        for common in listing.common_prefixes {
            if let Some(name) = direct_child_name(prefix, &common) {
                folders.push(RemoteEntry {
                    name,
                    kind: EntryKind::Folder,
                    size: 0,
                    last_modified: None,
                    full_path: common,
                });
            }
        }
        for object in listing.objects {
            if object.key.ends_with('/') {
                // Zero-byte folder marker; same shape as a common prefix.
                if let Some(name) = direct_child_name(prefix, &object.key) {
                    folders.push(RemoteEntry {
                        name,
                        kind: EntryKind::Folder,
                        size: 0,
                        last_modified: object.last_modified,
                        full_path: object.key,
                    });
                }
                continue;
            }
            if let Some(name) = direct_child_name(prefix, &object.key) {
                files.push(RemoteEntry {
                    name,
                    kind: EntryKind::File,
                    size: object.size,
                    last_modified: object.last_modified,
                    full_path: object.key,
                });
            }
        }

        Ok(finalize_entries(folders, files))
    }

    pub(super) async fn list_all_files(
        &self,
        container: &str,
        prefix: &str,
    ) -> Result<Vec<RemoteEntry>> {
        let listing = self.client.list_prefix(container, prefix, None).await?;
        Ok(listing
            .objects
            .into_iter()
            .filter(|object| !object.key.ends_with('/'))
            .filter_map(|object| {
                let name = object.key.strip_prefix(prefix)?.to_string();
                if name.is_empty() {
                    return None;
                }
                Some(RemoteEntry {
                    name,
                    kind: EntryKind::File,
                    size: object.size,
                    last_modified: object.last_modified,
                    full_path: object.key,
                })
            })
            .collect())
    }

    pub(super) async fn upload(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64> {
        validate_remote_key(key)?;
        self.client
            .upload_file(container, key, local_path, cancel, &progress)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn download(
        &self,
        container: &str,
        key: &str,
        dest_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64> {
        self.client
            .download_file(container, key, dest_path, cancel, &progress)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn delete(&self, container: &str, key: &str) -> Result<()> {
        self.client
            .delete_object(container, key)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn delete_prefix(&self, container: &str, prefix: &str) -> Result<u64> {
        let prefix = ensure_trailing_slash(prefix);
        self.client
            .delete_prefix(container, &prefix)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn create_folder(&self, container: &str, path: &str) -> Result<()> {
        validate_remote_key(path)?;
        self.client
            .create_folder_marker(container, path)
            .await
            .map_err(Into::into)
    }
}

pub(super) fn ensure_trailing_slash(prefix: &str) -> String {
    if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Reject credentials with empty key material before building a client
pub(super) fn require_keys(credentials: &crate::config::Credentials) -> Result<()> {
    if credentials.access_key.is_empty() || credentials.secret_key.is_empty() {
        return Err(StorageError::NotConnected(
            "access key and secret key are required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_trailing_slash() {
        assert_eq!(ensure_trailing_slash("docs"), "docs/");
        assert_eq!(ensure_trailing_slash("docs/"), "docs/");
    }
}
