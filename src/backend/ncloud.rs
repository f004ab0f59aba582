//! S3-compatible ncloud store backend with storage-class tiers

use std::path::Path;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::core::{CancelFlag, ProgressFn, RetryPolicy};
use crate::error::Result;
use crate::protocol::s3::{S3Client, S3Config, S3StorageClass};

use super::s3_common::{require_keys, S3Adapter};
use super::types::{ContainerInfo, RemoteEntry};
use super::{BackendKind, StorageBackend};

/// Default endpoint of the ncloud store
pub const DEFAULT_ENDPOINT: &str = "https://kr.ncloudstorage.com";

/// Signing region expected by the ncloud store
pub const DEFAULT_REGION: &str = "kr";

/// Multipart threshold (5 GiB, the single-PUT object limit)
pub const MULTIPART_THRESHOLD: u64 = 5 * 1024 * 1024 * 1024;

/// Part size for multipart uploads (100 MiB)
pub const PART_SIZE: u64 = 100 * 1024 * 1024;

/// Adapter for the ncloud store
///
/// Objects can land in `STANDARD` or `DEEP_ARCHIVE`; the class chosen at
/// construction applies to every upload, including multipart sessions.
pub struct NcloudBackend {
    adapter: S3Adapter,
}

impl NcloudBackend {
    /// Connect with stored credentials, uploading to `STANDARD`
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_storage_class(credentials, S3StorageClass::Standard)
    }

    /// Connect with stored credentials and an explicit storage class
    pub fn with_storage_class(
        credentials: Credentials,
        storage_class: S3StorageClass,
    ) -> Result<Self> {
        require_keys(&credentials)?;
        let endpoint = credentials
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let mut config = S3Config::new(
            endpoint,
            DEFAULT_REGION,
            credentials.access_key,
            credentials.secret_key,
        );
        config.storage_class = storage_class;
        config.multipart_threshold = MULTIPART_THRESHOLD;
        config.part_size = PART_SIZE;
        Self::with_config(config, RetryPolicy::default())
    }

    /// Connect with explicit protocol configuration
    pub fn with_config(config: S3Config, retry: RetryPolicy) -> Result<Self> {
        let client = S3Client::new(config, retry)?;
        Ok(Self {
            adapter: S3Adapter::new(client),
        })
    }
}

#[async_trait]
impl StorageBackend for NcloudBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ncloud
    }

    async fn test_connection(&self) -> Result<()> {
        self.adapter.test_connection().await
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
        self.adapter.list_containers().await
    }

    async fn create_container(&self, name: &str) -> Result<()> {
        self.adapter.create_container(name).await
    }

    async fn list_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: &str,
    ) -> Result<Vec<RemoteEntry>> {
        self.adapter.list_prefix(container, prefix, delimiter).await
    }

    async fn list_all_files(&self, container: &str, prefix: &str) -> Result<Vec<RemoteEntry>> {
        self.adapter.list_all_files(container, prefix).await
    }

    async fn upload(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64> {
        self.adapter
            .upload(container, key, local_path, cancel, progress)
            .await
    }

    async fn download(
        &self,
        container: &str,
        key: &str,
        dest_path: &Path,
        cancel: &CancelFlag,
        progress: ProgressFn,
    ) -> Result<u64> {
        self.adapter
            .download(container, key, dest_path, cancel, progress)
            .await
    }

    async fn delete(&self, container: &str, key: &str) -> Result<()> {
        self.adapter.delete(container, key).await
    }

    async fn delete_large_object(&self, container: &str, key: &str) -> Result<()> {
        self.adapter.delete(container, key).await
    }

    async fn delete_prefix(&self, container: &str, prefix: &str) -> Result<u64> {
        self.adapter.delete_prefix(container, prefix).await
    }

    async fn create_folder(&self, container: &str, path: &str) -> Result<()> {
        self.adapter.create_folder(container, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_with_storage_class() {
        let backend = NcloudBackend::with_storage_class(
            Credentials::new("ak", "sk"),
            S3StorageClass::DeepArchive,
        )
        .unwrap();
        assert_eq!(backend.kind(), BackendKind::Ncloud);
    }

    #[test]
    fn test_missing_keys_rejected() {
        assert!(NcloudBackend::new(Credentials::new("ak", "")).is_err());
    }
}
