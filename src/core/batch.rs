//! Transfer orchestrator
//!
//! A batch is one user-initiated operation: a single file, a multi-file
//! selection, a whole folder tree, a compress-then-upload, or the download
//! counterparts. The orchestrator enumerates the work items up front,
//! processes them strictly in enumeration order, folds per-item progress
//! into one aggregated percentage, and ends every batch with exactly one
//! terminal event. One item's failure never stops the remaining items; the
//! batch result records which names failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::backend::StorageBackend;
use crate::core::progress::{
    compressed_percent, overall_percent, ARCHIVE_BUILDING_PERCENT, ARCHIVE_PHASE_PERCENT,
};
use crate::core::{format_size, BatchEvent, BatchReporter, CancelFlag, ProgressFn};
use crate::error::{Result, StorageError};

/// One unit of work inside a batch, immutable once enumerated
#[derive(Debug, Clone)]
pub struct TransferItem {
    /// Name used in progress logs and failure reports (relative path)
    pub name: String,

    /// Local side of the transfer
    pub local_path: PathBuf,

    /// Remote side of the transfer
    pub remote_key: String,

    /// Size known at enumeration time (0 when only the backend knows)
    pub size_bytes: u64,
}

/// What a batch is doing; fixed when the request is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Single,
    MultiFile,
    Folder,
    Compressed,
    Download,
    FolderDownload,
}

/// Batch lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Items are still being selected; nothing started
    Building,

    /// Items are being processed
    Running,

    /// Every item succeeded (a batch of zero items completes trivially)
    Completed,

    /// At least one but not all items succeeded
    PartiallyFailed,

    /// No item succeeded
    Failed,

    /// Cancelled cooperatively before the last item
    Cancelled,
}

/// A user-initiated batch operation
#[derive(Debug, Clone)]
pub enum BatchRequest {
    /// Upload one file to an explicit key
    UploadFile {
        container: String,
        key: String,
        local_path: PathBuf,
    },

    /// Upload a selection of files under a remote prefix
    UploadFiles {
        container: String,
        remote_prefix: String,
        local_paths: Vec<PathBuf>,
    },

    /// Upload a whole folder tree under a remote base path
    UploadFolder {
        container: String,
        remote_base: String,
        local_folder: PathBuf,
    },

    /// Pack the selection into one ZIP and upload that single object
    UploadCompressed {
        container: String,
        remote_prefix: String,
        archive_name: String,
        files: Vec<PathBuf>,
        folders: Vec<PathBuf>,
    },

    /// Download one object
    DownloadFile {
        container: String,
        key: String,
        dest_path: PathBuf,
    },

    /// Download everything below a remote prefix into a local directory
    DownloadFolder {
        container: String,
        remote_prefix: String,
        dest_dir: PathBuf,
    },
}

impl BatchRequest {
    pub fn mode(&self) -> BatchMode {
        match self {
            BatchRequest::UploadFile { .. } => BatchMode::Single,
            BatchRequest::UploadFiles { .. } => BatchMode::MultiFile,
            BatchRequest::UploadFolder { .. } => BatchMode::Folder,
            BatchRequest::UploadCompressed { .. } => BatchMode::Compressed,
            BatchRequest::DownloadFile { .. } => BatchMode::Download,
            BatchRequest::DownloadFolder { .. } => BatchMode::FolderDownload,
        }
    }
}

/// Terminal summary of a batch
#[derive(Debug)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub mode: BatchMode,
    pub items_total: usize,
    pub items_completed: usize,
    pub bytes_total: u64,
    pub failed_items: Vec<String>,
    pub message: String,
}

impl BatchReport {
    pub fn success(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    /// Fold the report into the error taxonomy
    pub fn into_result(self) -> Result<BatchReport> {
        match self.status {
            BatchStatus::Completed => Ok(self),
            BatchStatus::Cancelled => Err(StorageError::Cancelled),
            _ => Err(StorageError::PartialBatchFailure {
                total: self.items_total,
                failed_items: self.failed_items,
            }),
        }
    }
}

/// Transfer direction of the enumerated items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upload,
    Download,
}

/// Runs batches against one backend
///
/// Knows nothing about which backend it drives; every protocol difference is
/// behind the [`StorageBackend`] trait.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn StorageBackend>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Spawn a batch on a background task
    ///
    /// Returns the cancel flag, the UI event stream, and the join handle for
    /// the final report. The caller's thread of control is never blocked by
    /// the transfer.
    pub fn spawn(
        &self,
        request: BatchRequest,
    ) -> (
        CancelFlag,
        UnboundedReceiver<BatchEvent>,
        JoinHandle<BatchReport>,
    ) {
        let (reporter, receiver) = BatchReporter::new();
        let cancel = CancelFlag::new();
        let orchestrator = self.clone();
        let flag = cancel.clone();
        let handle =
            tokio::spawn(async move { orchestrator.run(request, &reporter, &flag).await });
        (cancel, receiver, handle)
    }

    /// Run a batch to completion, emitting progress and one terminal event
    pub async fn run(
        &self,
        request: BatchRequest,
        reporter: &BatchReporter,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let mode = request.mode();
        debug!("starting {mode:?} batch");

        let report = match request {
            BatchRequest::UploadCompressed {
                container,
                remote_prefix,
                archive_name,
                files,
                folders,
            } => {
                self.run_compressed(
                    &container,
                    &remote_prefix,
                    &archive_name,
                    files,
                    folders,
                    reporter,
                    cancel,
                )
                .await
            }
            request => self.run_itemized(request, reporter, cancel).await,
        };

        reporter.finished(report.success(), report.message.clone());
        report
    }

    /// Enumerate and sequentially process a non-compressed batch
    async fn run_itemized(
        &self,
        request: BatchRequest,
        reporter: &BatchReporter,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let mode = request.mode();
        let (container, direction, items) = match self.enumerate(request).await {
            Ok(plan) => plan,
            Err(err) => {
                return BatchReport {
                    status: BatchStatus::Failed,
                    mode,
                    items_total: 0,
                    items_completed: 0,
                    bytes_total: 0,
                    failed_items: Vec::new(),
                    message: format!("could not enumerate items: {err}"),
                };
            }
        };

        let items_total = items.len();
        let bytes_total: u64 = items.iter().map(|item| item.size_bytes).sum();
        let mut items_completed = 0usize;
        let mut failed_items: Vec<String> = Vec::new();
        let mut cancelled = false;

        for (index, item) in items.iter().enumerate() {
            // Cooperative cancellation between items.
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            reporter.progress(overall_percent(index, items_total, 0));
            let progress = item_progress(reporter, index, items_total);

            let result = match direction {
                Direction::Upload => {
                    self.backend
                        .upload(&container, &item.remote_key, &item.local_path, cancel, progress)
                        .await
                }
                Direction::Download => {
                    self.backend
                        .download(&container, &item.remote_key, &item.local_path, cancel, progress)
                        .await
                }
            };

            match result {
                Ok(_) => {
                    items_completed += 1;
                    reporter.progress(overall_percent(index, items_total, 100));
                }
                Err(StorageError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(err) => {
                    // One failed item does not stop the rest of the batch.
                    warn!("item {} failed: {err}", item.name);
                    failed_items.push(item.name.clone());
                }
            }
        }

        let status = if cancelled {
            BatchStatus::Cancelled
        } else if failed_items.is_empty() {
            reporter.progress(100);
            BatchStatus::Completed
        } else if items_completed == 0 {
            reporter.progress(100);
            BatchStatus::Failed
        } else {
            reporter.progress(100);
            BatchStatus::PartiallyFailed
        };

        let message = batch_message(status, direction, items_total, items_completed, bytes_total, &failed_items);

        BatchReport {
            status,
            mode,
            items_total,
            items_completed,
            bytes_total,
            failed_items,
            message,
        }
    }

    /// Build the ordered work list for a request
    async fn enumerate(
        &self,
        request: BatchRequest,
    ) -> Result<(String, Direction, Vec<TransferItem>)> {
        match request {
            BatchRequest::UploadFile {
                container,
                key,
                local_path,
            } => {
                let size = tokio::fs::metadata(&local_path).await?.len();
                let name = file_display_name(&local_path);
                Ok((
                    container,
                    Direction::Upload,
                    vec![TransferItem {
                        name,
                        local_path,
                        remote_key: key,
                        size_bytes: size,
                    }],
                ))
            }
            BatchRequest::UploadFiles {
                container,
                remote_prefix,
                local_paths,
            } => {
                let mut items = Vec::with_capacity(local_paths.len());
                for local_path in local_paths {
                    let size = tokio::fs::metadata(&local_path).await?.len();
                    let name = file_display_name(&local_path);
                    let remote_key = join_remote(&remote_prefix, &name);
                    items.push(TransferItem {
                        name,
                        local_path,
                        remote_key,
                        size_bytes: size,
                    });
                }
                Ok((container, Direction::Upload, items))
            }
            BatchRequest::UploadFolder {
                container,
                remote_base,
                local_folder,
            } => {
                let items = enumerate_folder(&local_folder, &remote_base)?;
                Ok((container, Direction::Upload, items))
            }
            BatchRequest::DownloadFile {
                container,
                key,
                dest_path,
            } => {
                let name = key.rsplit('/').next().unwrap_or(&key).to_string();
                Ok((
                    container,
                    Direction::Download,
                    vec![TransferItem {
                        name,
                        local_path: dest_path,
                        remote_key: key,
                        size_bytes: 0,
                    }],
                ))
            }
            BatchRequest::DownloadFolder {
                container,
                remote_prefix,
                dest_dir,
            } => {
                let prefix = if remote_prefix.is_empty() || remote_prefix.ends_with('/') {
                    remote_prefix
                } else {
                    format!("{remote_prefix}/")
                };
                let entries = self.backend.list_all_files(&container, &prefix).await?;
                let items = entries
                    .into_iter()
                    .map(|entry| {
                        let local_path =
                            entry.name.split('/').fold(dest_dir.clone(), |path, part| {
                                path.join(part)
                            });
                        TransferItem {
                            name: entry.name,
                            local_path,
                            remote_key: entry.full_path,
                            size_bytes: entry.size,
                        }
                    })
                    .collect();
                Ok((container, Direction::Download, items))
            }
            BatchRequest::UploadCompressed { .. } => unreachable!("handled by run_compressed"),
        }
    }

    /// Compress-then-upload: one archive, two progress phases
    #[allow(clippy::too_many_arguments)]
    async fn run_compressed(
        &self,
        container: &str,
        remote_prefix: &str,
        archive_name: &str,
        files: Vec<PathBuf>,
        folders: Vec<PathBuf>,
        reporter: &BatchReporter,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let file_count = files.len();
        let folder_count = folders.len();
        let failed = |message: String| BatchReport {
            status: BatchStatus::Failed,
            mode: BatchMode::Compressed,
            items_total: 1,
            items_completed: 0,
            bytes_total: 0,
            failed_items: vec![archive_name.to_string()],
            message,
        };

        reporter.progress(ARCHIVE_BUILDING_PERCENT);

        // Scoped resource: dropped (and deleted) on every exit path below.
        let temp_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => return failed(format!("could not create temp directory: {err}")),
        };
        let archive_path = temp_dir.path().join(archive_name);

        let build = {
            let archive_path = archive_path.clone();
            tokio::task::spawn_blocking(move || {
                crate::core::compress::build_archive(&archive_path, &files, &folders)
            })
            .await
        };
        let archive_size = match build {
            Ok(Ok(size)) => size,
            Ok(Err(err)) => return failed(format!("archive build failed: {err}")),
            Err(err) => return failed(format!("archive build task failed: {err}")),
        };

        reporter.progress(ARCHIVE_PHASE_PERCENT);

        if cancel.is_cancelled() {
            return BatchReport {
                status: BatchStatus::Cancelled,
                mode: BatchMode::Compressed,
                items_total: 1,
                items_completed: 0,
                bytes_total: archive_size,
                failed_items: Vec::new(),
                message: "transfer cancelled".to_string(),
            };
        }

        let remote_key = join_remote(remote_prefix, archive_name);
        let progress: ProgressFn = {
            let reporter = reporter.clone();
            Arc::new(move |p| reporter.progress(compressed_percent(p)))
        };

        let result = self
            .backend
            .upload(container, &remote_key, &archive_path, cancel, progress)
            .await;

        match result {
            Ok(_) => {
                reporter.progress(100);
                BatchReport {
                    status: BatchStatus::Completed,
                    mode: BatchMode::Compressed,
                    items_total: 1,
                    items_completed: 1,
                    bytes_total: archive_size,
                    failed_items: Vec::new(),
                    message: format!(
                        "compressed upload complete: {archive_name} ({} files, {} folders, {})",
                        file_count,
                        folder_count,
                        format_size(archive_size)
                    ),
                }
            }
            Err(StorageError::Cancelled) => BatchReport {
                status: BatchStatus::Cancelled,
                mode: BatchMode::Compressed,
                items_total: 1,
                items_completed: 0,
                bytes_total: archive_size,
                failed_items: Vec::new(),
                message: "transfer cancelled".to_string(),
            },
            Err(err) => failed(format!("compressed upload failed: {err}")),
        }
        // temp_dir drops here, removing the archive on success and failure alike
    }
}

/// Per-item progress callback folding into the batch-wide percentage
fn item_progress(reporter: &BatchReporter, index: usize, total: usize) -> ProgressFn {
    let reporter = reporter.clone();
    Arc::new(move |p| reporter.progress(overall_percent(index, total, p)))
}

/// Remote key for `name` under `prefix`
fn join_remote(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), name)
    }
}

fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Walk a local folder into ordered upload items
///
/// Remote keys are `{remote_base}/{relative}` with OS separators normalized
/// to `/`. Empty folders produce no items.
fn enumerate_folder(local_folder: &Path, remote_base: &str) -> Result<Vec<TransferItem>> {
    if !local_folder.is_dir() {
        return Err(StorageError::NotFound(format!(
            "local folder {} does not exist",
            local_folder.display()
        )));
    }

    let mut items = Vec::new();
    for entry in WalkDir::new(local_folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        let relative = entry
            .path()
            .strip_prefix(local_folder)
            .expect("walkdir entry is below its root")
            .to_string_lossy()
            .replace('\\', "/");
        let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
        items.push(TransferItem {
            name: relative.clone(),
            local_path: entry.path().to_path_buf(),
            remote_key: join_remote(remote_base, &relative),
            size_bytes: size,
        });
    }
    Ok(items)
}

/// Human-readable terminal message for an itemized batch
fn batch_message(
    status: BatchStatus,
    direction: Direction,
    items_total: usize,
    items_completed: usize,
    bytes_total: u64,
    failed_items: &[String],
) -> String {
    let verb = match direction {
        Direction::Upload => "uploaded",
        Direction::Download => "downloaded",
    };
    match status {
        BatchStatus::Completed => {
            if items_total == 0 {
                format!("nothing to transfer; {verb} 0 items")
            } else {
                format!(
                    "{verb} {items_total} item(s) ({})",
                    format_size(bytes_total)
                )
            }
        }
        BatchStatus::Cancelled => "transfer cancelled".to_string(),
        _ => format!(
            "{verb} {items_completed}/{items_total} item(s); failed: {}",
            failed_items.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, ContainerInfo, EntryKind, RemoteEntry};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// In-memory backend for orchestrator tests
    #[derive(Default)]
    struct MemoryBackend {
        objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
        fail_keys: HashSet<String>,
    }

    impl MemoryBackend {
        fn failing(keys: &[&str]) -> Self {
            Self {
                objects: Mutex::new(BTreeMap::new()),
                fail_keys: keys.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn insert(&self, container: &str, key: &str, data: &[u8]) {
            self.objects
                .lock()
                .unwrap()
                .insert((container.to_string(), key.to_string()), data.to_vec());
        }

        fn get(&self, container: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(container.to_string(), key.to_string()))
                .cloned()
        }

        fn keys(&self, container: &str) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(c, _)| c == container)
                .map(|(_, k)| k.clone())
                .collect()
        }
    }

    #[async_trait]
    impl StorageBackend for MemoryBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Object
        }

        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        async fn list_containers(&self) -> Result<Vec<ContainerInfo>> {
            Ok(Vec::new())
        }

        async fn create_container(&self, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn list_prefix(
            &self,
            _container: &str,
            _prefix: &str,
            _delimiter: &str,
        ) -> Result<Vec<RemoteEntry>> {
            Ok(Vec::new())
        }

        async fn list_all_files(&self, container: &str, prefix: &str) -> Result<Vec<RemoteEntry>> {
            Ok(self
                .keys(container)
                .into_iter()
                .filter(|key| key.starts_with(prefix) && !key.ends_with('/'))
                .map(|key| {
                    let size = self.get(container, &key).map(|d| d.len() as u64).unwrap_or(0);
                    RemoteEntry {
                        name: key[prefix.len()..].to_string(),
                        kind: EntryKind::File,
                        size,
                        last_modified: None,
                        full_path: key,
                    }
                })
                .collect())
        }

        async fn upload(
            &self,
            container: &str,
            key: &str,
            local_path: &Path,
            _cancel: &CancelFlag,
            progress: ProgressFn,
        ) -> Result<u64> {
            if self.fail_keys.contains(key) {
                return Err(StorageError::PermanentRejected(format!(
                    "authorization denied for {key}"
                )));
            }
            let data = std::fs::read(local_path)?;
            let len = data.len() as u64;
            progress(50);
            self.insert(container, key, &data);
            progress(100);
            Ok(len)
        }

        async fn download(
            &self,
            container: &str,
            key: &str,
            dest_path: &Path,
            _cancel: &CancelFlag,
            progress: ProgressFn,
        ) -> Result<u64> {
            let data = self
                .get(container, key)
                .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
            if let Some(parent) = dest_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest_path, &data)?;
            progress(100);
            Ok(data.len() as u64)
        }

        async fn delete(&self, container: &str, key: &str) -> Result<()> {
            self.objects
                .lock()
                .unwrap()
                .remove(&(container.to_string(), key.to_string()));
            Ok(())
        }

        async fn delete_large_object(&self, container: &str, key: &str) -> Result<()> {
            self.delete(container, key).await
        }

        async fn delete_prefix(&self, container: &str, prefix: &str) -> Result<u64> {
            let mut objects = self.objects.lock().unwrap();
            let doomed: Vec<_> = objects
                .keys()
                .filter(|(c, k)| c == container && k.starts_with(prefix))
                .cloned()
                .collect();
            let count = doomed.len() as u64;
            for key in doomed {
                objects.remove(&key);
            }
            Ok(count)
        }

        async fn create_folder(&self, container: &str, path: &str) -> Result<()> {
            let marker = format!("{}/", path.trim_end_matches('/'));
            self.insert(container, &marker, b"");
            Ok(())
        }
    }

    fn drain(receiver: &mut UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn assert_monotonic(events: &[BatchEvent]) {
        let mut last = 0u8;
        let mut terminals = 0;
        for event in events {
            match event {
                BatchEvent::Progress(p) => {
                    assert!(*p >= last, "progress regressed: {p} after {last}");
                    last = *p;
                }
                BatchEvent::Finished { .. } => terminals += 1,
            }
        }
        assert_eq!(terminals, 1, "exactly one terminal event per batch");
        assert!(matches!(events.last(), Some(BatchEvent::Finished { .. })));
    }

    fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
        for (relative, data) in files {
            let path = root.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, data).unwrap();
        }
    }

    #[tokio::test]
    async fn test_single_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hello.bin");
        std::fs::write(&source, b"round trip payload").unwrap();

        let backend = Arc::new(MemoryBackend::default());
        let orchestrator = Orchestrator::new(backend.clone());

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFile {
                    container: "bucket".to_string(),
                    key: "docs/hello.bin".to_string(),
                    local_path: source,
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;
        assert_eq!(report.status, BatchStatus::Completed);
        assert_monotonic(&drain(&mut receiver));

        let dest = dir.path().join("restored.bin");
        let (reporter, _receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::DownloadFile {
                    container: "bucket".to_string(),
                    key: "docs/hello.bin".to_string(),
                    dest_path: dest.clone(),
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;
        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(std::fs::read(dest).unwrap(), b"round trip payload");
    }

    #[tokio::test]
    async fn test_folder_upload_partial_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("a.txt", b"aaa".as_slice()),
                ("sub/b.txt", b"bbb".as_slice()),
                ("sub/c.txt", b"ccc".as_slice()),
            ],
        );

        // The middle item (enumeration order: a.txt, sub/b.txt, sub/c.txt)
        // is rejected permanently.
        let backend = Arc::new(MemoryBackend::failing(&["base/sub/b.txt"]));
        let orchestrator = Orchestrator::new(backend.clone());

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFolder {
                    container: "bucket".to_string(),
                    remote_base: "base".to_string(),
                    local_folder: dir.path().to_path_buf(),
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::PartiallyFailed);
        assert_eq!(report.items_total, 3);
        assert_eq!(report.items_completed, 2);
        assert_eq!(report.failed_items, vec!["sub/b.txt".to_string()]);
        assert!(report.message.contains("sub/b.txt"));

        // Progress still reaches 100 after all items were attempted.
        let events = drain(&mut receiver);
        assert_monotonic(&events);
        assert!(events.contains(&BatchEvent::Progress(100)));

        // The other items landed with normalized keys.
        assert!(backend.get("bucket", "base/a.txt").is_some());
        assert!(backend.get("bucket", "base/sub/c.txt").is_some());
        assert!(backend.get("bucket", "base/sub/b.txt").is_none());
    }

    #[tokio::test]
    async fn test_empty_folder_completes_trivially() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::default());
        let orchestrator = Orchestrator::new(backend);

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFolder {
                    container: "bucket".to_string(),
                    remote_base: "base".to_string(),
                    local_folder: dir.path().to_path_buf(),
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(report.items_total, 0);
        let events = drain(&mut receiver);
        assert!(events.contains(&BatchEvent::Progress(100)));
        assert_monotonic(&events);
    }

    #[tokio::test]
    async fn test_seven_files_one_permanent_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 1..=7 {
            let path = dir.path().join(format!("file{i}.dat"));
            std::fs::write(&path, vec![i as u8; 64]).unwrap();
            paths.push(path);
        }

        let backend = Arc::new(MemoryBackend::failing(&["file4.dat"]));
        let orchestrator = Orchestrator::new(backend);

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFiles {
                    container: "bucket".to_string(),
                    remote_prefix: String::new(),
                    local_paths: paths,
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::PartiallyFailed);
        assert_eq!(report.failed_items, vec!["file4.dat".to_string()]);
        assert_eq!(report.items_completed, 6);

        let events = drain(&mut receiver);
        assert_monotonic(&events);
        assert!(events.contains(&BatchEvent::Progress(100)));
    }

    #[tokio::test]
    async fn test_all_items_failing_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("only.txt");
        std::fs::write(&path, b"x").unwrap();

        let backend = Arc::new(MemoryBackend::failing(&["only.txt"]));
        let orchestrator = Orchestrator::new(backend);

        let (reporter, _receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFiles {
                    container: "bucket".to_string(),
                    remote_prefix: String::new(),
                    local_paths: vec![path],
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::Failed);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, b"x").unwrap();

        let backend = Arc::new(MemoryBackend::default());
        let orchestrator = Orchestrator::new(backend.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadFile {
                    container: "bucket".to_string(),
                    key: "file.txt".to_string(),
                    local_path: path,
                },
                &reporter,
                &cancel,
            )
            .await;

        assert_eq!(report.status, BatchStatus::Cancelled);
        assert!(backend.get("bucket", "file.txt").is_none());
        let events = drain(&mut receiver);
        assert!(matches!(
            events.last(),
            Some(BatchEvent::Finished { success: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_folder_download_recreates_tree() {
        let backend = Arc::new(MemoryBackend::default());
        backend.insert("bucket", "base/a.txt", b"aaa");
        backend.insert("bucket", "base/sub/b.txt", b"bbb");
        backend.insert("bucket", "base/", b"");

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(backend);

        let (reporter, _receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::DownloadFolder {
                    container: "bucket".to_string(),
                    remote_prefix: "base".to_string(),
                    dest_dir: dir.path().to_path_buf(),
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(report.items_total, 2);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"aaa");
        assert_eq!(
            std::fs::read(dir.path().join("sub").join("b.txt")).unwrap(),
            b"bbb"
        );
    }

    #[tokio::test]
    async fn test_compressed_upload_lands_single_archive() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("loose.txt", b"loose".as_slice()),
                ("proj/x.txt", b"xxx".as_slice()),
            ],
        );

        let backend = Arc::new(MemoryBackend::default());
        let orchestrator = Orchestrator::new(backend.clone());

        let (reporter, mut receiver) = BatchReporter::new();
        let report = orchestrator
            .run(
                BatchRequest::UploadCompressed {
                    container: "bucket".to_string(),
                    remote_prefix: "uploads".to_string(),
                    archive_name: "bundle.zip".to_string(),
                    files: vec![dir.path().join("loose.txt")],
                    folders: vec![dir.path().join("proj")],
                },
                &reporter,
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(backend.keys("bucket"), vec!["uploads/bundle.zip"]);

        // The uploaded object really is a ZIP with the expected entries.
        let data = backend.get("bucket", "uploads/bundle.zip").unwrap();
        let reader = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(reader).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"loose.txt".to_string()));
        assert!(names.contains(&"proj/x.txt".to_string()));

        // Two-phase progress: build band first, then the scaled upload band.
        let events = drain(&mut receiver);
        assert_monotonic(&events);
        assert!(events.contains(&BatchEvent::Progress(ARCHIVE_BUILDING_PERCENT)));
        assert!(events.contains(&BatchEvent::Progress(100)));
    }

    #[tokio::test]
    async fn test_spawned_batch_reports_through_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.txt");
        std::fs::write(&path, b"background").unwrap();

        let backend = Arc::new(MemoryBackend::default());
        let orchestrator = Orchestrator::new(backend);

        let (_cancel, mut receiver, handle) = orchestrator.spawn(BatchRequest::UploadFile {
            container: "bucket".to_string(),
            key: "bg.txt".to_string(),
            local_path: path,
        });

        let report = handle.await.unwrap();
        assert_eq!(report.status, BatchStatus::Completed);

        let mut saw_finished = false;
        while let Some(event) = receiver.recv().await {
            if let BatchEvent::Finished { success, .. } = event {
                assert!(success);
                saw_finished = true;
            }
        }
        assert!(saw_finished);
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("", "file.txt"), "file.txt");
        assert_eq!(join_remote("docs", "file.txt"), "docs/file.txt");
        assert_eq!(join_remote("docs/", "file.txt"), "docs/file.txt");
    }
}
