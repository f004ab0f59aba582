//! Configuration types for the Swift client

use serde::{Deserialize, Serialize};

use super::error::{SwiftError, SwiftResult};

/// Swift client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwiftConfig {
    /// Keystone identity endpoint (token requests)
    pub auth_url: String,

    /// Storage endpoint (object requests)
    pub storage_url: String,

    /// User name for the password grant
    pub access_key: String,

    /// Password for the password grant
    pub secret_key: String,

    /// Keystone domain id scoping the user
    pub domain_id: String,

    /// Keystone project id; also part of the account path (`AUTH_{id}`)
    pub project_id: String,

    /// Payload size at which uploads switch to the SLO strategy
    pub slo_threshold: u64,

    /// Segment size for SLO uploads
    pub segment_size: u64,
}

impl SwiftConfig {
    pub fn new(
        auth_url: impl Into<String>,
        storage_url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        domain_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            storage_url: storage_url.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            domain_id: domain_id.into(),
            project_id: project_id.into(),
            slo_threshold: super::DEFAULT_SLO_THRESHOLD,
            segment_size: super::DEFAULT_SEGMENT_SIZE,
        }
    }

    /// Validate the configuration before building a client
    pub fn validate(&self) -> SwiftResult<()> {
        for (field, value) in [
            ("auth_url", &self.auth_url),
            ("storage_url", &self.storage_url),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("domain_id", &self.domain_id),
            ("project_id", &self.project_id),
        ] {
            if value.is_empty() {
                return Err(SwiftError::Auth(format!("{field} is required")));
            }
        }
        if self.segment_size < super::MIN_SEGMENT_SIZE {
            return Err(SwiftError::InvalidName(format!(
                "segment size {} is below the {} minimum",
                self.segment_size,
                super::MIN_SEGMENT_SIZE
            )));
        }
        Ok(())
    }

    /// Account path under the storage endpoint
    pub fn account_path(&self) -> String {
        format!("/v1/AUTH_{}", self.project_id)
    }
}

/// Validate a container name: non-empty, no slash, at most 256 characters
pub fn validate_container_name(name: &str) -> SwiftResult<()> {
    if name.is_empty() {
        return Err(SwiftError::InvalidName(
            "container name cannot be empty".to_string(),
        ));
    }
    if name.contains('/') {
        return Err(SwiftError::InvalidName(format!(
            "{name:?}: container names cannot contain '/'"
        )));
    }
    if name.len() > 256 {
        return Err(SwiftError::InvalidName(format!(
            "{name:?}: container names are limited to 256 characters"
        )));
    }
    Ok(())
}
