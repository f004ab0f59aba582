//! S3-compatible object store backend

use std::path::Path;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::core::{CancelFlag, ProgressFn, RetryPolicy};
use crate::error::Result;
use crate::protocol::s3::{S3Client, S3Config};

use super::s3_common::{require_keys, S3Adapter};
use super::types::{ContainerInfo, RemoteEntry};
use super::{BackendKind, StorageBackend};

/// Default endpoint of the object store
pub const DEFAULT_ENDPOINT: &str = "https://kr.object.ncloudstorage.com";

/// Signing region expected by the object store
pub const DEFAULT_REGION: &str = "kr-standard";

/// Adapter for the S3-compatible object store
///
/// Multipart kicks in at 100 MiB with 16 MiB parts (the store favors many
/// smaller objects over the archive tiers).
pub struct ObjectBackend {
    adapter: S3Adapter,
}

impl ObjectBackend {
    /// Connect with stored credentials and default tuning
    pub fn new(credentials: Credentials) -> Result<Self> {
        require_keys(&credentials)?;
        let endpoint = credentials
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let config = S3Config::new(
            endpoint,
            DEFAULT_REGION,
            credentials.access_key,
            credentials.secret_key,
        );
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
impl StorageBackend for ObjectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Object
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
        // Multipart objects need no manifest handling once completed.
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
    fn test_connect_with_defaults() {
        let backend = ObjectBackend::new(Credentials::new("ak", "sk")).unwrap();
        assert_eq!(backend.kind(), BackendKind::Object);
    }

    #[test]
    fn test_missing_keys_rejected() {
        assert!(ObjectBackend::new(Credentials::new("", "")).is_err());
    }
}
