//! S3 client construction and bucket-level operations

use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client as AwsS3Client;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::core::RetryPolicy;

use super::config::{validate_bucket_name, S3Config};
use super::error::{S3Error, S3Result};
use super::types::S3BucketInfo;

/// Client for one S3-compatible store
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct S3Client {
    client: AwsS3Client,
    config: S3Config,
    retry: RetryPolicy,
}

impl S3Client {
    /// Build a client from configuration
    pub fn new(config: S3Config, retry: RetryPolicy) -> S3Result<Self> {
        config.validate()?;
        let client = Self::build_aws_client(&config);
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn build_aws_client(config: &S3Config) -> AwsS3Client {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "stratus-explicit",
        );

        let timeout_config = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_seconds))
            .build();

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .timeout_config(timeout_config)
            // The shared RetryPolicy is the single retry authority.
            .retry_config(RetryConfig::disabled())
            .build();

        AwsS3Client::from_conf(sdk_config)
    }

    /// Client configuration
    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Shared retry policy
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Underlying AWS SDK client
    pub fn aws_client(&self) -> &AwsS3Client {
        &self.client
    }

    /// Test the connection by listing buckets
    pub async fn test_connection(&self) -> S3Result<()> {
        self.retry
            .run("list buckets", || async move {
                self.client
                    .list_buckets()
                    .send()
                    .await
                    .map_err(S3Error::from)
            })
            .await?;
        Ok(())
    }

    /// List all buckets with their creation dates
    pub async fn list_buckets(&self) -> S3Result<Vec<S3BucketInfo>> {
        let response = self
            .retry
            .run("list buckets", || async move {
                self.client
                    .list_buckets()
                    .send()
                    .await
                    .map_err(S3Error::from)
            })
            .await?;

        let buckets = response
            .buckets()
            .iter()
            .filter_map(|bucket| {
                Some(S3BucketInfo {
                    name: bucket.name()?.to_string(),
                    creation_date: bucket
                        .creation_date()
                        .and_then(|dt| std::time::SystemTime::try_from(*dt).ok())
                        .map(DateTime::<Utc>::from),
                })
            })
            .collect();

        Ok(buckets)
    }

    /// Create a bucket after validating its name
    pub async fn create_bucket(&self, name: &str) -> S3Result<()> {
        validate_bucket_name(name)?;
        self.retry
            .run("create bucket", || async move {
                self.client
                    .create_bucket()
                    .bucket(name)
                    .send()
                    .await
                    .map_err(S3Error::from)
            })
            .await?;
        Ok(())
    }
}
