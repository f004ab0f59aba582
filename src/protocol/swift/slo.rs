//! Static Large Object upload strategy
//!
//! Segments are plain objects in the derived segment container; the store
//! has no upload session, so the "session" is just the manifest list built
//! in memory while segments go up in order. The object only becomes visible
//! once the manifest PUT succeeds. On any unrecoverable failure the already
//! uploaded segments are deleted best-effort; a failed cleanup is logged and
//! never escalated.

use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::core::progress::single_percent;
use crate::core::{operation_timeout, CancelFlag, ProgressFn};
use crate::protocol::{plan_parts, PartPlan};

use super::client::SwiftClient;
use super::error::{SwiftError, SwiftResult};
use super::types::ManifestEntry;
use super::{segment_name, MAX_SEGMENTS, MIN_SEGMENT_SIZE, SEGMENT_CONTAINER_SUFFIX};

/// Header carrying the session token (same as client.rs, kept private there)
const AUTH_HEADER: &str = "X-Auth-Token";

impl SwiftClient {
    /// Upload a large file as segments plus a manifest
    pub(super) async fn upload_large(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        size: u64,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> SwiftResult<u64> {
        let plan = plan_parts(size, self.config().segment_size, MIN_SEGMENT_SIZE, MAX_SEGMENTS);
        let segment_container = format!("{container}{SEGMENT_CONTAINER_SUFFIX}");
        debug!(
            "SLO upload {container}/{key}: {} segments of {} bytes via {segment_container}",
            plan.count, plan.part_size
        );

        self.create_container(&segment_container).await?;

        let manifest = match self
            .upload_segments(&segment_container, key, local_path, plan, cancel, progress)
            .await
        {
            Ok(manifest) => manifest,
            Err((err, uploaded)) => {
                self.cleanup_segments(&segment_container, &uploaded).await;
                return Err(err);
            }
        };

        if let Err(err) = self.put_manifest(container, key, &manifest).await {
            self.cleanup_segments(&segment_container, &manifest).await;
            return Err(err);
        }

        progress(100);
        Ok(size)
    }

    /// Upload all segments in order, returning the manifest entries
    ///
    /// On failure the entries uploaded so far ride along in the error so the
    /// caller can clean them up exactly once.
    async fn upload_segments(
        &self,
        segment_container: &str,
        key: &str,
        local_path: &Path,
        plan: PartPlan,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> Result<Vec<ManifestEntry>, (SwiftError, Vec<ManifestEntry>)> {
        let mut manifest: Vec<ManifestEntry> = Vec::with_capacity(plan.count);
        let mut completed: u64 = 0;

        let mut file = match tokio::fs::File::open(local_path).await {
            Ok(file) => file,
            Err(err) => return Err((SwiftError::from(err), manifest)),
        };

        for index in 0..plan.count {
            // Cooperative cancellation between segments.
            if cancel.is_cancelled() {
                return Err((SwiftError::Cancelled, manifest));
            }

            let (_, length) = plan.part_range(index);
            let mut buffer = vec![0u8; length as usize];
            if let Err(err) = file.read_exact(&mut buffer).await {
                return Err((SwiftError::from(err), manifest));
            }

            let name = segment_name(key, index);
            let etag = match self
                .put_segment(segment_container, &name, Bytes::from(buffer))
                .await
            {
                Ok(etag) => etag,
                Err(err) => return Err((err, manifest)),
            };

            manifest.push(ManifestEntry {
                path: format!("/{segment_container}/{name}"),
                etag,
                size_bytes: length,
            });

            // Progress only advances once the segment fully succeeded.
            completed += length;
            progress(single_percent(completed, plan.total_size));
        }

        Ok(manifest)
    }

    /// PUT one segment with retry; returns its ETag
    async fn put_segment(
        &self,
        segment_container: &str,
        name: &str,
        data: Bytes,
    ) -> SwiftResult<String> {
        let url = self.object_url(segment_container, name);
        let timeout = operation_timeout(data.len() as u64);

        self.retry()
            .run("put segment", || {
                let data = data.clone();
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.put(&url)
                                .timeout(timeout)
                                .header(AUTH_HEADER, token)
                                .body(data.clone())
                        })
                        .await?;

                    match response.status().as_u16() {
                        200 | 201 => response
                            .headers()
                            .get(reqwest::header::ETAG)
                            .and_then(|value| value.to_str().ok())
                            .map(|etag| etag.trim_matches('"').to_string())
                            .ok_or_else(|| {
                                SwiftError::Manifest(format!("segment {name} returned no etag"))
                            }),
                        status => Err(SwiftError::from_status(
                            status,
                            &response.text().await.unwrap_or_default(),
                        )),
                    }
                }
            })
            .await
    }

    /// Finalize: PUT the manifest against the object key
    async fn put_manifest(
        &self,
        container: &str,
        key: &str,
        manifest: &[ManifestEntry],
    ) -> SwiftResult<()> {
        let url = self.object_url(container, key);
        let body = serde_json::to_vec(manifest)
            .map_err(|e| SwiftError::Manifest(format!("manifest encoding: {e}")))?;

        self.retry()
            .run("put manifest", || {
                let body = body.clone();
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.put(&url)
                                .header(AUTH_HEADER, token)
                                .query(&[("multipart-manifest", "put")])
                                .body(body.clone())
                        })
                        .await?;

                    match response.status().as_u16() {
                        200 | 201 => Ok(()),
                        status => Err(SwiftError::from_status(
                            status,
                            &response.text().await.unwrap_or_default(),
                        )),
                    }
                }
            })
            .await
    }

    /// Best-effort deletion of already uploaded segments after an abort
    ///
    /// Cleanup failures are logged only; the primary error has already been
    /// decided by the caller.
    async fn cleanup_segments(&self, segment_container: &str, uploaded: &[ManifestEntry]) {
        if uploaded.is_empty() {
            return;
        }
        debug!(
            "cleaning up {} orphaned segments in {segment_container}",
            uploaded.len()
        );
        let strip = format!("/{segment_container}/");
        for entry in uploaded {
            let name = entry.path.strip_prefix(&strip).unwrap_or(&entry.path);
            if let Err(err) = self.delete_object(segment_container, name).await {
                warn!("failed to delete orphaned segment {}: {err}", entry.path);
            }
        }
    }
}
