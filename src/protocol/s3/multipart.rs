//! Multipart upload strategy for large objects
//!
//! Parts are uploaded through a bounded worker pool and may complete out of
//! order; each part's metadata is written into its own slot so the complete
//! call always sends parts in part-number order. Progress accumulates only
//! when a part has fully succeeded, which keeps the reported value monotonic
//! across per-part retries.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::progress::single_percent;
use crate::core::{operation_timeout, CancelFlag, ProgressFn};
use crate::protocol::{plan_parts, PartPlan};

use super::client::S3Client;
use super::error::{S3Error, S3Result};
use super::types::UploadPartInfo;

impl S3Client {
    /// Upload a large file with the multipart lifecycle
    ///
    /// Any part exhausting its retries aborts the whole upload; the abort
    /// call itself is fire-and-forget and its failure is only logged.
    pub(super) async fn upload_file_multipart(
        &self,
        bucket: &str,
        key: &str,
        local_path: &Path,
        size: u64,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> S3Result<u64> {
        let plan = plan_parts(
            size,
            self.config().part_size,
            super::MIN_PART_SIZE,
            super::MAX_PARTS,
        );
        debug!(
            "multipart upload s3://{bucket}/{key}: {} parts of {} bytes",
            plan.count, plan.part_size
        );

        let upload_id = self.create_upload(bucket, key).await?;

        let parts = match self
            .upload_parts(bucket, key, &upload_id, local_path, plan, cancel, progress)
            .await
        {
            Ok(parts) => parts,
            Err(err) => {
                self.abort_upload(bucket, key, &upload_id).await;
                return Err(err);
            }
        };

        if let Err(err) = self.complete_upload(bucket, key, &upload_id, &parts).await {
            self.abort_upload(bucket, key, &upload_id).await;
            return Err(err);
        }

        progress(100);
        Ok(size)
    }

    async fn create_upload(&self, bucket: &str, key: &str) -> S3Result<String> {
        let response = self
            .retry()
            .run("create multipart upload", || async move {
                self.aws_client()
                    .create_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .storage_class(self.config().storage_class.to_aws())
                    .send()
                    .await
                    .map_err(S3Error::from)
            })
            .await?;

        response
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| S3Error::MultipartUpload("no upload ID returned".to_string()))
    }

    /// Upload all parts with bounded concurrency, recording each at its index
    #[allow(clippy::too_many_arguments)]
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        local_path: &Path,
        plan: PartPlan,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> S3Result<Vec<UploadPartInfo>> {
        let semaphore = Arc::new(Semaphore::new(self.config().parallel_parts));
        let completed_bytes = Arc::new(AtomicU64::new(0));
        let mut tasks: JoinSet<(usize, S3Result<UploadPartInfo>)> = JoinSet::new();
        let mut slots: Vec<Option<UploadPartInfo>> = vec![None; plan.count];
        let mut file = tokio::fs::File::open(local_path).await?;
        let mut cancelled = false;

        for index in 0..plan.count {
            // Cooperative cancellation between parts; in-flight parts run on.
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            // The permit bounds both concurrency and buffered memory.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("part semaphore closed");

            let (_, length) = plan.part_range(index);
            let mut buffer = vec![0u8; length as usize];
            file.read_exact(&mut buffer).await?;
            let data = Bytes::from(buffer);

            let client = self.clone();
            let bucket = bucket.to_string();
            let key = key.to_string();
            let upload_id = upload_id.to_string();
            let completed = Arc::clone(&completed_bytes);
            let progress = Arc::clone(progress);
            let total = plan.total_size;

            tasks.spawn(async move {
                let result = client
                    .upload_one_part(&bucket, &key, &upload_id, index, data)
                    .await;
                drop(permit);
                if let Ok(info) = &result {
                    let done = completed.fetch_add(info.size, Ordering::SeqCst) + info.size;
                    progress(single_percent(done, total));
                }
                (index, result)
            });
        }

        let mut first_error: Option<S3Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(info))) => slots[index] = Some(info),
                Ok((_, Err(err))) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                    tasks.abort_all();
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(S3Error::MultipartUpload(format!(
                            "part task failed: {join_err}"
                        )));
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if cancelled {
            return Err(S3Error::Cancelled);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| S3Error::MultipartUpload("part list has a hole".to_string()))
    }

    async fn upload_one_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        index: usize,
        data: Bytes,
    ) -> S3Result<UploadPartInfo> {
        let part_number = (index + 1) as i32;
        let size = data.len() as u64;
        let timeout = operation_timeout(size);

        self.retry()
            .run("upload part", || {
                let data = data.clone();
                async move {
                    let request = self
                        .aws_client()
                        .upload_part()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .body(ByteStream::from(data))
                        .send();
                    let response = match tokio::time::timeout(timeout, request).await {
                        Ok(result) => result.map_err(S3Error::from)?,
                        Err(_) => {
                            return Err(S3Error::Timeout(format!(
                                "part {part_number} exceeded {timeout:?}"
                            )))
                        }
                    };
                    let etag = response.e_tag().ok_or_else(|| {
                        S3Error::MultipartUpload(format!("no ETag for part {part_number}"))
                    })?;
                    Ok(UploadPartInfo::new(part_number, etag.to_string(), size))
                }
            })
            .await
    }

    async fn complete_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadPartInfo],
    ) -> S3Result<()> {
        if parts.is_empty() {
            return Err(S3Error::MultipartUpload(
                "multipart upload produced no parts".to_string(),
            ));
        }

        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.retry()
            .run("complete multipart upload", || {
                let completed = completed.clone();
                async move {
                    self.aws_client()
                        .complete_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .multipart_upload(completed)
                        .send()
                        .await
                        .map_err(S3Error::from)
                }
            })
            .await?;
        Ok(())
    }

    /// Best-effort abort; failure is logged, never escalated
    async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(err) = self
            .aws_client()
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!("abort of multipart upload {upload_id} for {bucket}/{key} failed: {err}");
        }
    }
}
