//! Swift-style archive store backend

use std::path::Path;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::core::{CancelFlag, ProgressFn, RetryPolicy};
use crate::error::{Result, StorageError};
use crate::protocol::swift::{SwiftClient, SwiftConfig, SwiftListEntry};

use super::s3_common::ensure_trailing_slash;
use super::types::{
    direct_child_name, finalize_entries, validate_remote_key, ContainerInfo, EntryKind,
    RemoteEntry,
};
use super::{BackendKind, StorageBackend};

/// Default identity endpoint of the archive store
pub const DEFAULT_AUTH_ENDPOINT: &str = "https://kr.archive.ncloudstorage.com:5000";

/// Default storage endpoint of the archive store
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://kr.archive.ncloudstorage.com";

/// Adapter for the Swift-style archive store
///
/// Large uploads go through the SLO strategy; deleting such an object fully
/// requires [`StorageBackend::delete_large_object`], since a plain delete
/// removes only the manifest.
pub struct ArchiveBackend {
    client: SwiftClient,
}

impl ArchiveBackend {
    /// Connect with stored credentials
    ///
    /// The archive store needs the Keystone scope identifiers on top of the
    /// key pair; credentials without them are rejected as not connected.
    pub fn new(credentials: Credentials) -> Result<Self> {
        let domain_id = credentials.domain_id.clone().ok_or_else(|| {
            StorageError::NotConnected("archive credentials need a domain id".to_string())
        })?;
        let project_id = credentials.project_id.clone().ok_or_else(|| {
            StorageError::NotConnected("archive credentials need a project id".to_string())
        })?;
        let storage_url = credentials
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_STORAGE_ENDPOINT.to_string());

        let config = SwiftConfig::new(
            DEFAULT_AUTH_ENDPOINT,
            storage_url,
            credentials.access_key,
            credentials.secret_key,
            domain_id,
            project_id,
        );
        Self::with_config(config, RetryPolicy::default())
    }

    /// Connect with explicit protocol configuration
    pub fn with_config(config: SwiftConfig, retry: RetryPolicy) -> Result<Self> {
        let client = SwiftClient::new(config, retry)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StorageBackend for ArchiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Archive
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await.map_err(Into::into)
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        let containers = self.client.list_containers().await?;
        Ok(containers
            .into_iter()
            .map(|container| ContainerInfo {
                name: container.name,
                created: None,
            })
            .collect())
    }

    async fn create_container(&self, name: &str) -> Result<()> {
        self.client.create_container(name).await.map_err(Into::into)
    }

    async fn list_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: &str,
    ) -> Result<Vec<RemoteEntry>> {
        let entries = self
            .client
            .list_prefix(container, prefix, Some(delimiter))
            .await?;

        let mut folders = Vec::new();
        let mut files = Vec::new();

        for entry in entries {
            match entry {
                SwiftListEntry::Subdir { subdir } => {
                    if let Some(name) = direct_child_name(prefix, &subdir) {
                        folders.push(RemoteEntry {
                            name,
                            kind: EntryKind::Folder,
                            size: 0,
                            last_modified: None,
                            full_path: subdir,
                        });
                    }
                }
                SwiftListEntry::Object(object) => {
                    let modified = object.modified_at();
                    if object.is_folder_marker() {
                        if let Some(name) = direct_child_name(prefix, &object.name) {
                            let full_path = ensure_trailing_slash(&object.name);
                            folders.push(RemoteEntry {
                                name,
                                kind: EntryKind::Folder,
                                size: 0,
                                last_modified: modified,
                                full_path,
                            });
                        }
                    } else if let Some(name) = direct_child_name(prefix, &object.name) {
                        files.push(RemoteEntry {
                            name,
                            kind: EntryKind::File,
                            size: object.bytes,
                            last_modified: modified,
                            full_path: object.name,
                        });
                    }
                }
            }
        }

        Ok(finalize_entries(folders, files))
    }

    async fn list_all_files(&self, container: &str, prefix: &str) -> Result<Vec<RemoteEntry>> {
        let entries = self.client.list_prefix(container, prefix, None).await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| match entry {
                SwiftListEntry::Object(object) if !object.is_folder_marker() => {
                    let name = object.name.strip_prefix(prefix)?.to_string();
                    if name.is_empty() {
                        return None;
                    }
                    Some(RemoteEntry {
                        name,
                        kind: EntryKind::File,
                        size: object.bytes,
                        last_modified: object.modified_at(),
                        full_path: object.name,
                    })
                }
                _ => None,
            })
            .collect())
    }

    async fn upload(
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

    async fn download(
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

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        self.client.delete_object(container, key).await.map_err(Into::into)
    }

    async fn delete_large_object(&self, container: &str, key: &str) -> Result<()> {
        self.client
            .delete_with_manifest(container, key)
            .await
            .map_err(Into::into)
    }

    async fn delete_prefix(&self, container: &str, prefix: &str) -> Result<u64> {
        let prefix = ensure_trailing_slash(prefix);
        self.client
            .delete_prefix(container, &prefix)
            .await
            .map_err(Into::into)
    }

    async fn create_folder(&self, container: &str, path: &str) -> Result<()> {
        validate_remote_key(path)?;
        self.client.create_folder(container, path).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_scope_identifiers() {
        let missing_scope = Credentials::new("ak", "sk");
        assert!(matches!(
            ArchiveBackend::new(missing_scope),
            Err(StorageError::NotConnected(_))
        ));

        let complete = Credentials::new("ak", "sk").with_scope("dom", "proj");
        assert!(ArchiveBackend::new(complete).is_ok());
    }
}
