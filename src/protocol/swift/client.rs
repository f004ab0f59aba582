//! Swift client: token auth and object operations

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::core::progress::single_percent;
use crate::core::{operation_timeout, CancelFlag, ProgressFn, RetryPolicy};

use super::config::{validate_container_name, SwiftConfig};
use super::error::{SwiftError, SwiftResult};
use super::types::{SwiftContainer, SwiftListEntry};

/// Header carrying the session token on every storage request
const AUTH_HEADER: &str = "X-Auth-Token";

/// Header the identity endpoint returns the token in
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Timeout for small control-plane requests (auth, list, delete)
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Read buffer for streaming uploads
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Characters escaped in object paths; `/` stays a path separator
const OBJECT_PATH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Client for the Swift-style archive store
///
/// The token is fetched lazily on the first request and cached; a 401 on a
/// replayable request refreshes it once.
pub struct SwiftClient {
    http: reqwest::Client,
    config: SwiftConfig,
    retry: RetryPolicy,
    token: RwLock<Option<String>>,
}

impl SwiftClient {
    /// Build a client from configuration
    pub fn new(config: SwiftConfig, retry: RetryPolicy) -> SwiftResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(SwiftError::from)?;
        Ok(Self {
            http,
            config,
            retry,
            token: RwLock::new(None),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &SwiftConfig {
        &self.config
    }

    /// Shared retry policy
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Password-grant body for the identity endpoint
    fn auth_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "domain": { "id": self.config.domain_id },
                            "name": self.config.access_key,
                            "password": self.config.secret_key,
                        }
                    }
                },
                "scope": { "project": { "id": self.config.project_id } }
            }
        })
    }

    /// Obtain a fresh token from the identity endpoint
    async fn authenticate(&self) -> SwiftResult<String> {
        let url = format!(
            "{}/v3/auth/tokens",
            self.config.auth_url.trim_end_matches('/')
        );
        let payload = self.auth_payload();

        let token = self
            .retry
            .run("authenticate", || {
                let payload = payload.clone();
                let url = url.clone();
                async move {
                    let response = self
                        .http
                        .post(&url)
                        .timeout(CONTROL_TIMEOUT)
                        .json(&payload)
                        .send()
                        .await?;
                    let status = response.status().as_u16();
                    if status != 201 {
                        let body = response.text().await.unwrap_or_default();
                        return Err(match status {
                            401 | 403 => SwiftError::Auth(format!("HTTP {status}: {body}")),
                            _ => SwiftError::from_status(status, &body),
                        });
                    }
                    response
                        .headers()
                        .get(SUBJECT_TOKEN_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                        .ok_or_else(|| {
                            SwiftError::Auth("identity response carried no token".to_string())
                        })
                }
            })
            .await?;

        *self.token.write().await = Some(token.clone());
        debug!("obtained archive store token");
        Ok(token)
    }

    /// Cached token, authenticating if necessary
    async fn token(&self) -> SwiftResult<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await
    }

    async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Send a replayable request, refreshing the token once on 401
    pub(super) async fn send_authed<F>(&self, build: F) -> SwiftResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client, String) -> reqwest::RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&self.http, token).send().await?;
        if response.status().as_u16() != 401 {
            return Ok(response);
        }
        // Token expired mid-session: refresh once and replay.
        self.clear_token().await;
        let token = self.token().await?;
        Ok(build(&self.http, token).send().await?)
    }

    /// Turn transient HTTP statuses (429, 5xx) into retryable errors
    ///
    /// Call inside a retry closure so those statuses go back through the
    /// policy; every other status is returned for the caller to interpret.
    pub(super) async fn reject_transient(
        response: reqwest::Response,
    ) -> SwiftResult<reqwest::Response> {
        let status = response.status().as_u16();
        if status == 429 || matches!(status, 500 | 502 | 503 | 504) {
            return Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            ));
        }
        Ok(response)
    }

    /// Account URL (container listing lives here)
    fn account_url(&self) -> String {
        format!(
            "{}{}",
            self.config.storage_url.trim_end_matches('/'),
            self.config.account_path()
        )
    }

    /// URL of a container
    pub(super) fn container_url(&self, container: &str) -> String {
        format!("{}/{container}", self.account_url())
    }

    /// URL of an object, path-encoded with `/` preserved
    pub(super) fn object_url(&self, container: &str, object: &str) -> String {
        format!(
            "{}/{}",
            self.container_url(container),
            utf8_percent_encode(object, OBJECT_PATH_ENCODE)
        )
    }

    /// Authenticate to verify the credentials work
    pub async fn test_connection(&self) -> SwiftResult<()> {
        self.authenticate().await.map(|_| ())
    }

    /// List the account's containers
    pub async fn list_containers(&self) -> SwiftResult<Vec<SwiftContainer>> {
        let url = self.account_url();
        let response = self
            .retry
            .run("list containers", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.get(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                                .query(&[("format", "json")])
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            200 => response
                .json::<Vec<SwiftContainer>>()
                .await
                .map_err(|e| SwiftError::Manifest(format!("container listing: {e}"))),
            204 => Ok(Vec::new()),
            status => Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Create a container (idempotent: 202 on an existing one is success)
    pub async fn create_container(&self, name: &str) -> SwiftResult<()> {
        validate_container_name(name)?;
        let url = self.container_url(name);
        let response = self
            .retry
            .run("create container", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.put(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            201 | 202 => Ok(()),
            status => Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Delimited listing below `prefix`
    ///
    /// `delimiter` of `Some("/")` produces the folder view with `subdir`
    /// entries; `None` drains the full recursive listing.
    pub async fn list_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> SwiftResult<Vec<SwiftListEntry>> {
        let url = self.container_url(container);
        let mut query: Vec<(&str, &str)> = vec![("format", "json")];
        if let Some(delimiter) = delimiter {
            query.push(("delimiter", delimiter));
        }
        if !prefix.is_empty() {
            query.push(("prefix", prefix));
        }

        let response = self
            .retry
            .run("list objects", || {
                let query = query.clone();
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.get(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                                .query(&query)
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            200 => response
                .json::<Vec<SwiftListEntry>>()
                .await
                .map_err(|e| SwiftError::Manifest(format!("object listing: {e}"))),
            204 => Ok(Vec::new()),
            404 => Err(SwiftError::NotFound {
                container: container.to_string(),
                object: String::new(),
            }),
            status => Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Upload a file, choosing single PUT or SLO by size
    pub async fn upload_file(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> SwiftResult<u64> {
        if key.is_empty() {
            return Err(SwiftError::InvalidName(
                "object name cannot be empty".to_string(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(SwiftError::Cancelled);
        }

        let size = tokio::fs::metadata(local_path).await?.len();
        if size <= self.config.slo_threshold {
            self.upload_single(container, key, local_path, size, progress)
                .await?;
            progress(100);
            Ok(size)
        } else {
            self.upload_large(container, key, local_path, size, cancel, progress)
                .await
        }
    }

    /// Single-request PUT with a byte-counting streaming body
    async fn upload_single(
        &self,
        container: &str,
        key: &str,
        local_path: &Path,
        size: u64,
        progress: &ProgressFn,
    ) -> SwiftResult<()> {
        let url = self.object_url(container, key);
        let timeout = operation_timeout(size);
        debug!("PUT {url} ({size} bytes)");

        self.retry
            .run("put object", || {
                let url = url.clone();
                async move {
                    let token = self.token().await?;
                    let file = File::open(local_path).await.map_err(SwiftError::from)?;

                    let sent = Arc::new(AtomicU64::new(0));
                    let progress = Arc::clone(progress);
                    let stream = ReaderStream::with_capacity(file, UPLOAD_CHUNK).inspect(
                        move |chunk: &Result<bytes::Bytes, std::io::Error>| {
                            if let Ok(bytes) = chunk {
                                let done = sent.fetch_add(bytes.len() as u64, Ordering::SeqCst)
                                    + bytes.len() as u64;
                                progress(single_percent(done, size));
                            }
                        },
                    );

                    let response = self
                        .http
                        .put(&url)
                        .timeout(timeout)
                        .header(AUTH_HEADER, token)
                        .header(reqwest::header::CONTENT_LENGTH, size)
                        .body(reqwest::Body::wrap_stream(stream))
                        .send()
                        .await?;

                    match response.status().as_u16() {
                        200 | 201 => Ok(()),
                        401 => {
                            self.clear_token().await;
                            Err(SwiftError::Auth(
                                "token rejected during upload".to_string(),
                            ))
                        }
                        status => Err(SwiftError::from_status(
                            status,
                            &response.text().await.unwrap_or_default(),
                        )),
                    }
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
        container: &str,
        key: &str,
        dest_path: &Path,
        cancel: &CancelFlag,
        progress: &ProgressFn,
    ) -> SwiftResult<u64> {
        if cancel.is_cancelled() {
            return Err(SwiftError::Cancelled);
        }
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = self.object_url(container, key);
        let response = self
            .retry
            .run("get object", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| http.get(&url).header(AUTH_HEADER, token))
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            200 => {}
            404 => {
                return Err(SwiftError::NotFound {
                    container: container.to_string(),
                    object: key.to_string(),
                })
            }
            status => {
                return Err(SwiftError::from_status(
                    status,
                    &response.text().await.unwrap_or_default(),
                ))
            }
        }

        let total = response.content_length().unwrap_or(0);
        let mut stream = response.bytes_stream();
        let mut writer = BufWriter::new(File::create(dest_path).await?);
        let mut transferred: u64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(SwiftError::Cancelled);
            }
            let bytes = chunk.map_err(SwiftError::from)?;
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

    /// Delete a single object (a manifest delete leaves its segments behind)
    pub async fn delete_object(&self, container: &str, key: &str) -> SwiftResult<()> {
        let url = self.object_url(container, key);
        let response = self
            .retry
            .run("delete object", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.delete(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            200 | 204 => Ok(()),
            404 => Err(SwiftError::NotFound {
                container: container.to_string(),
                object: key.to_string(),
            }),
            status => Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Delete an SLO manifest together with all of its segments
    pub async fn delete_with_manifest(&self, container: &str, key: &str) -> SwiftResult<()> {
        let url = self.object_url(container, key);
        let response = self
            .retry
            .run("delete large object", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.delete(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                                .query(&[("multipart-manifest", "delete")])
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
            })
            .await?;

        match response.status().as_u16() {
            200 | 204 => Ok(()),
            404 => Err(SwiftError::NotFound {
                container: container.to_string(),
                object: key.to_string(),
            }),
            status => Err(SwiftError::from_status(
                status,
                &response.text().await.unwrap_or_default(),
            )),
        }
    }

    /// Delete every object below `prefix`; returns the number removed
    pub async fn delete_prefix(&self, container: &str, prefix: &str) -> SwiftResult<u64> {
        let entries = self.list_prefix(container, prefix, None).await?;
        let mut deleted = 0;
        for entry in entries {
            if let SwiftListEntry::Object(object) = entry {
                self.delete_object(container, &object.name).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Create a zero-byte folder marker object
    pub async fn create_folder(&self, container: &str, path: &str) -> SwiftResult<()> {
        let marker = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        let url = self.object_url(container, &marker);
        let response = self
            .retry
            .run("create folder marker", || {
                let url = url.clone();
                async move {
                    let response = self
                        .send_authed(|http, token| {
                            http.put(&url)
                                .timeout(CONTROL_TIMEOUT)
                                .header(AUTH_HEADER, token)
                                .header(CONTENT_TYPE, super::DIRECTORY_CONTENT_TYPE)
                                .body(Vec::new())
                        })
                        .await?;
                    Self::reject_transient(response).await
                }
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RetryPolicy;

    fn test_client() -> SwiftClient {
        let config = SwiftConfig::new(
            "https://kr.archive.example.com:5000",
            "https://kr.archive.example.com",
            "user",
            "pass",
            "dom",
            "proj",
        );
        SwiftClient::new(config, RetryPolicy::default()).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = test_client();
        assert_eq!(
            client.container_url("backups"),
            "https://kr.archive.example.com/v1/AUTH_proj/backups"
        );
        assert_eq!(
            client.object_url("backups", "dir/file.txt"),
            "https://kr.archive.example.com/v1/AUTH_proj/backups/dir/file.txt"
        );
    }

    #[test]
    fn test_object_url_encodes_specials_but_keeps_slashes() {
        let client = test_client();
        assert_eq!(
            client.object_url("c", "dir name/file#1.txt"),
            "https://kr.archive.example.com/v1/AUTH_proj/c/dir%20name/file%231.txt"
        );
    }

    #[test]
    fn test_auth_payload_shape() {
        let client = test_client();
        let payload = client.auth_payload();
        assert_eq!(payload["auth"]["identity"]["methods"][0], "password");
        assert_eq!(
            payload["auth"]["identity"]["password"]["user"]["domain"]["id"],
            "dom"
        );
        assert_eq!(
            payload["auth"]["identity"]["password"]["user"]["name"],
            "user"
        );
        assert_eq!(payload["auth"]["scope"]["project"]["id"], "proj");
    }

    #[test]
    fn test_client_rejects_incomplete_config() {
        let config = SwiftConfig::new("", "", "", "", "", "");
        assert!(SwiftClient::new(config, RetryPolicy::default()).is_err());
    }
}
