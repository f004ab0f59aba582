//! Type definitions for S3 operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One object entry from a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Object {
    /// Object key (path within the bucket)
    pub key: String,

    /// Object size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,

    /// ETag reported by the store
    pub etag: Option<String>,

    /// Storage class, when the store reports one
    pub storage_class: Option<S3StorageClass>,
}

/// Result of a (fully drained) prefix listing
#[derive(Debug, Clone, Default)]
pub struct S3Listing {
    /// Objects directly below the prefix
    pub objects: Vec<S3Object>,

    /// Common prefixes ("folders") when a delimiter was used
    pub common_prefixes: Vec<String>,
}

/// Bucket name plus creation metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Metadata of one successfully uploaded part
///
/// Recorded at the part's own index while parts complete out of order, then
/// sent in part-number order on complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPartInfo {
    /// Part number, 1-based
    pub part_number: i32,

    /// ETag returned by the store for this part
    pub etag: String,

    /// Part size in bytes
    pub size: u64,
}

impl UploadPartInfo {
    pub fn new(part_number: i32, etag: String, size: u64) -> Self {
        Self {
            part_number,
            etag,
            size,
        }
    }
}

/// Storage classes offered by the ncloud-style store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum S3StorageClass {
    /// Standard online storage
    #[default]
    Standard,

    /// Cold archive tier
    DeepArchive,
}

impl S3StorageClass {
    /// Convert to the AWS SDK storage class
    pub fn to_aws(self) -> aws_sdk_s3::types::StorageClass {
        match self {
            S3StorageClass::Standard => aws_sdk_s3::types::StorageClass::Standard,
            S3StorageClass::DeepArchive => aws_sdk_s3::types::StorageClass::DeepArchive,
        }
    }

    /// Convert from the AWS SDK storage class; unknown tiers map to Standard
    pub fn from_aws(sc: &aws_sdk_s3::types::StorageClass) -> Self {
        match sc {
            aws_sdk_s3::types::StorageClass::DeepArchive => S3StorageClass::DeepArchive,
            _ => S3StorageClass::Standard,
        }
    }
}

impl std::fmt::Display for S3StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            S3StorageClass::Standard => write!(f, "STANDARD"),
            S3StorageClass::DeepArchive => write!(f, "DEEP_ARCHIVE"),
        }
    }
}
