/*!
 * Stratus - large-object transfer engine for cloud object storage
 *
 * A desktop storage manager's core: move files and folders between local
 * disk and three storage services with:
 * - One `StorageBackend` contract over a Swift-style archive store and two
 *   S3-compatible stores
 * - Segmented large-object uploads (SLO manifests on Swift, multipart
 *   sessions on S3) with per-part retry and abort cleanup
 * - Batch orchestration: single file, multi-file, folder trees, and
 *   compress-then-upload, with monotonic aggregated progress
 * - Shared exponential-backoff retry policy and payload-scaled timeouts
 * - Message-passing progress delivery; no UI state touched from workers
 */

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;

// Re-export commonly used types
pub use backend::{
    connect, ArchiveBackend, BackendKind, ContainerInfo, EntryKind, NcloudBackend, ObjectBackend,
    RemoteEntry, StorageBackend,
};
pub use config::{CredentialStore, Credentials};
pub use core::{
    format_size, BatchEvent, BatchMode, BatchReport, BatchReporter, BatchRequest, BatchStatus,
    CancelFlag, Orchestrator, RetryPolicy, TransferItem,
};
pub use error::{Result, StorageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
