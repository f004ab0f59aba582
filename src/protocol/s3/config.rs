//! Configuration types for the S3 protocol client

use serde::{Deserialize, Serialize};

use super::error::{S3Error, S3Result};
use super::types::S3StorageClass;

/// S3 client configuration
///
/// One config per connected store; the bucket is *not* part of it — every
/// operation names its bucket explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Service endpoint URL (S3-compatible stores always use one)
    pub endpoint: String,

    /// Region name expected by the signing process
    pub region: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Path-style addressing instead of virtual-host buckets
    pub force_path_style: bool,

    /// Storage class applied to uploads
    pub storage_class: S3StorageClass,

    /// Payload size at which uploads switch to multipart
    pub multipart_threshold: u64,

    /// Part size for multipart uploads
    pub part_size: u64,

    /// Bounded worker-pool width for part uploads
    pub parallel_parts: usize,

    /// Backstop request timeout in seconds (individual transfers get a
    /// payload-scaled timeout on top of this)
    pub timeout_seconds: u64,
}

impl S3Config {
    /// Config for an endpoint with the default transfer tuning
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: region.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            force_path_style: false,
            storage_class: S3StorageClass::Standard,
            multipart_threshold: super::DEFAULT_MULTIPART_THRESHOLD,
            part_size: super::DEFAULT_PART_SIZE,
            parallel_parts: super::DEFAULT_PARALLEL_PARTS,
            timeout_seconds: 3600,
        }
    }

    /// Validate the configuration before building a client
    pub fn validate(&self) -> S3Result<()> {
        if self.endpoint.is_empty() {
            return Err(S3Error::InvalidConfig("endpoint cannot be empty".to_string()));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(S3Error::InvalidConfig(
                "access key and secret key are required".to_string(),
            ));
        }
        if self.part_size < super::MIN_PART_SIZE {
            return Err(S3Error::InvalidConfig(format!(
                "part size {} is below the {} minimum",
                self.part_size,
                super::MIN_PART_SIZE
            )));
        }
        if self.multipart_threshold < self.part_size {
            return Err(S3Error::InvalidConfig(format!(
                "multipart threshold {} is below the part size {}",
                self.multipart_threshold, self.part_size
            )));
        }
        if self.parallel_parts == 0 || self.parallel_parts > super::MAX_PARALLEL_PARTS {
            return Err(S3Error::InvalidConfig(format!(
                "parallel parts must be between 1 and {}",
                super::MAX_PARALLEL_PARTS
            )));
        }
        Ok(())
    }
}

/// Validate a bucket name against the S3 rules: 3–63 characters, lowercase
/// letters, digits, and hyphens, with no leading or trailing hyphen.
pub fn validate_bucket_name(name: &str) -> S3Result<()> {
    if name.len() < 3 || name.len() > 63 {
        return Err(S3Error::InvalidBucketName(format!(
            "{name:?}: must be 3-63 characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(S3Error::InvalidBucketName(format!(
            "{name:?}: only lowercase letters, digits, and hyphens are allowed"
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(S3Error::InvalidBucketName(format!(
            "{name:?}: must not start or end with a hyphen"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config::new("https://kr.object.example.com", "kr-standard", "ak", "sk")
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let mut config = test_config();
        config.secret_key.clear();
        assert!(matches!(
            config.validate(),
            Err(S3Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_part_size_below_minimum_rejected() {
        let mut config = test_config();
        config.part_size = 1024;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_below_part_size_rejected() {
        let mut config = test_config();
        config.multipart_threshold = config.part_size - 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_bucket_names() {
        assert!(validate_bucket_name("my-bucket").is_ok());
        assert!(validate_bucket_name("abc").is_ok());
        assert!(validate_bucket_name("bucket-123").is_ok());
        assert!(validate_bucket_name(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_invalid_bucket_names() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
        assert!(validate_bucket_name("My-Bucket").is_err());
        assert!(validate_bucket_name("bucket_name").is_err());
        assert!(validate_bucket_name("bucket.name").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket-").is_err());
    }
}
