//! Object-level S3 operations

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::core::progress::single_percent;
use crate::core::{operation_timeout, CancelFlag, ProgressFn};

use super::client::S3Client;
use super::error::{S3Error, S3Result};
use super::types::{S3Listing, S3Object, S3StorageClass};

impl S3Client {
    /// Size of an object in bytes
    pub async fn stat_object(&self, bucket: &str, key: &str) -> S3Result<u64> {
        let response = self
            .retry()
            .run("head object", || async move {
                self.aws_client()
                    .head_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| match S3Error::from(e) {
                        S3Error::Service { code, .. } if code == "NoSuchKey" => S3Error::NotFound {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        },
                        other => other,
                    })
            })
            .await?;
        Ok(response.content_length().unwrap_or(0).max(0) as u64)
    }

    /// List everything below `prefix`, draining all pages
    ///
    /// With a delimiter the result carries common prefixes for the folder
    /// view; without one it is the full recursive listing.
    pub async fn list_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> S3Result<S3Listing> {
        let mut listing = S3Listing::default();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.clone();
            let response = self
                .retry()
                .run("list objects", || {
                    let token = token.clone();
                    async move {
                        let mut request = self
                            .aws_client()
                            .list_objects_v2()
                            .bucket(bucket)
                            .prefix(prefix)
                            .max_keys(1000);
                        if let Some(delimiter) = delimiter {
                            request = request.delimiter(delimiter);
                        }
                        if let Some(token) = token {
                            request = request.continuation_token(token);
                        }
                        request.send().await.map_err(S3Error::from)
                    }
                })
                .await?;

            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                listing.objects.push(S3Object {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|dt| std::time::SystemTime::try_from(*dt).ok())
                        .map(DateTime::<Utc>::from),
                    etag: object.e_tag().map(|s| s.trim_matches('"').to_string()),
                    storage_class: object.storage_class().map(|sc| {
                        S3StorageClass::from_aws(&aws_sdk_s3::types::StorageClass::from(sc.as_str()))
                    }),
                });
            }
            for common in response.common_prefixes() {
                if let Some(prefix) = common.prefix() {
                    listing.common_prefixes.push(prefix.to_string());
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(listing)
    }

    /// Upload a file, choosing single PUT or multipart by size
    ///
    /// Returns the number of bytes uploaded. Progress reaches 100 only on
    /// success.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> S3Result<u64> {
        if key.is_empty() {
            return Err(S3Error::InvalidKey("object key cannot be empty".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(S3Error::Cancelled);
        }

        let size = tokio::fs::metadata(local_path).await?.len();
        if size <= self.config().multipart_threshold {
            self.put_object_file(bucket, key, local_path, size).await?;
            progress(100);
            Ok(size)
        } else {
            self.upload_file_multipart(bucket, key, local_path, size, cancel, progress)
                .await
        }
    }

    /// Single-request PUT of a whole file
    async fn put_object_file(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        size: u64,
    ) -> S3Result<()> {
        debug!("PUT s3://{bucket}/{key} ({size} bytes)");
        let timeout = operation_timeout(size);

        self.retry()
            .run("put object", || async move {
                let body = ByteStream::from_path(local_path)
                    .await
                    .map_err(|e| S3Error::Io(e.to_string()))?;
                let request = self
                    .aws_client()
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .storage_class(self.config().storage_class.to_aws())
                    .body(body)
                    .send();
                match tokio::time::timeout(timeout, request).await {
                    Ok(result) => result.map(|_| ()).map_err(S3Error::from),
                    Err(_) => Err(S3Error::Timeout(format!(
                        "put of {key} exceeded {timeout:?}"
                    ))),
                }
            })
            .await
    }

    /// Download an object to `dest_path`, creating parent directories
    ///
    /// A partial destination file is left in place on failure; the result
    /// still reports the failure.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dest_path: &Path,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> S3Result<u64> {
        if cancel.is_cancelled() {
            return Err(S3Error::Cancelled);
        }
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .retry()
            .run("get object", || async move {
                self.aws_client()
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| match S3Error::from(e) {
                        S3Error::Service { code, .. } if code == "NoSuchKey" => S3Error::NotFound {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        },
                        other => other,
                    })
            })
            .await?;

        let total = response.content_length().unwrap_or(0).max(0) as u64;
        let mut body = response.body;
        let mut writer = BufWriter::new(File::create(dest_path).await?);
        let mut transferred: u64 = 0;

        while let Some(bytes) = body
            .try_next()
            .await
            .map_err(|e| S3Error::Network(format!("download stream failed: {e}")))?
        {
            if cancel.is_cancelled() {
                return Err(S3Error::Cancelled);
            }
            writer.write_all(&bytes).await?;
            transferred += bytes.len() as u64;
            if total > 0 {
                progress(single_percent(transferred, total));
            }
        }
        writer.flush().await?;

        progress(100);
        Ok(transferred)
    }

    /// Delete a single object
    pub async fn delete_object(&self, bucket: &str, key: &str) -> S3Result<()> {
        self.retry()
            .run("delete object", || async move {
                self.aws_client()
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(S3Error::from)
            })
            .await?;
        Ok(())
    }

    /// Delete every object below `prefix` in batched DeleteObjects calls
    ///
    /// Returns the number of objects removed.
    pub async fn delete_prefix(&self, bucket: &str, prefix: &str) -> S3Result<u64> {
        let listing = self.list_prefix(bucket, prefix, None).await?;
        let mut deleted: u64 = 0;

        for chunk in listing.objects.chunks(super::DELETE_BATCH_SIZE) {
            let identifiers: Vec<ObjectIdentifier> = chunk
                .iter()
                .map(|object| {
                    ObjectIdentifier::builder()
                        .key(&object.key)
                        .build()
                        .map_err(|e| S3Error::Sdk(e.to_string()))
                })
                .collect::<S3Result<_>>()?;

            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|e| S3Error::Sdk(e.to_string()))?;

            self.retry()
                .run("delete objects", || {
                    let delete = delete.clone();
                    async move {
                        self.aws_client()
                            .delete_objects()
                            .bucket(bucket)
                            .delete(delete)
                            .send()
                            .await
                            .map_err(S3Error::from)
                    }
                })
                .await?;
            deleted += chunk.len() as u64;
        }

        debug!("deleted {deleted} objects below s3://{bucket}/{prefix}");
        Ok(deleted)
    }

    /// Create a zero-byte folder marker object (`path/`)
    pub async fn create_folder_marker(&self, bucket: &str, path: &str) -> S3Result<()> {
        let key = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        self.retry()
            .run("create folder marker", || {
                let key = key.clone();
                async move {
                    self.aws_client()
                        .put_object()
                        .bucket(bucket)
                        .key(key)
                        .body(ByteStream::from_static(b""))
                        .send()
                        .await
                        .map_err(S3Error::from)
                }
            })
            .await?;
        Ok(())
    }
}
