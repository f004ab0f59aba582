//! S3 protocol client for the two S3-compatible stores
//!
//! Built on the official AWS SDK for Rust with custom endpoints. The same
//! client serves both the "object" store and the "ncloud" store; they differ
//! only in endpoint, transfer tuning, and whether a `StorageClass` is applied
//! (see `crate::backend`).
//!
//! Uploads below [`S3Config::multipart_threshold`] are a single PUT; larger
//! payloads go through the multipart lifecycle in `multipart.rs` with
//! per-part retry and an abort on unrecoverable failure.
//!
//! SDK-internal retries are disabled when the client is built: the shared
//! [`crate::core::RetryPolicy`] is the single retry authority, so attempt
//! counts observed by callers match the configured policy.

mod client;
mod config;
mod error;
mod multipart;
mod operations;
mod types;

pub use client::S3Client;
pub use config::{validate_bucket_name, S3Config};
pub use error::{S3Error, S3Result};
pub use types::{S3BucketInfo, S3Listing, S3Object, S3StorageClass, UploadPartInfo};

/// Default multipart threshold (100 MiB)
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Default part size (16 MiB)
pub const DEFAULT_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Minimum part size accepted by S3 (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of parts per upload (S3 hard limit is 10000; this engine
/// keeps the count an order of magnitude lower to bound per-part overhead)
pub const MAX_PARTS: usize = 1000;

/// Default bounded worker-pool width for part uploads
pub const DEFAULT_PARALLEL_PARTS: usize = 4;

/// Upper bound on the worker-pool width
pub const MAX_PARALLEL_PARTS: usize = 16;

/// Keys deleted per `DeleteObjects` request
pub const DELETE_BATCH_SIZE: usize = 1000;
