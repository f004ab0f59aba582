/*!
 * Credential persistence for the three storage backends
 *
 * Credentials are stored as a single JSON document keyed by backend kind:
 *
 * ```json
 * {
 *   "archive": { "access_key": "...", "secret_key": "...", "domain_id": "...", "project_id": "..." },
 *   "object":  { "access_key": "...", "secret_key": "..." },
 *   "ncloud":  { "access_key": "...", "secret_key": "...", "endpoint": "https://..." }
 * }
 * ```
 *
 * The engine only reads and writes this document; prompting for credentials
 * and deciding where the file lives belongs to the embedding application.
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::Result;

/// Credentials for one backend
///
/// `domain_id` and `project_id` are only meaningful for the archive (Swift)
/// backend; `endpoint` overrides the backend's default service URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Credentials {
    /// Create credentials with just an access/secret key pair
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            domain_id: None,
            project_id: None,
            endpoint: None,
        }
    }

    /// Attach the Keystone scope identifiers used by the archive backend
    pub fn with_scope(
        mut self,
        domain_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        self.domain_id = Some(domain_id.into());
        self.project_id = Some(project_id.into());
        self
    }

    /// Override the backend's default endpoint URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// File-backed credential store keyed by backend kind
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given JSON file (which may not exist yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials for one backend, `None` if absent
    pub fn load_credentials(&self, kind: BackendKind) -> Result<Option<Credentials>> {
        let mut document = self.read_document()?;
        Ok(document.remove(kind.as_str()))
    }

    /// Save credentials for one backend, preserving the other entries
    pub fn save_credentials(&self, kind: BackendKind, credentials: &Credentials) -> Result<()> {
        let mut document = self.read_document()?;
        document.insert(kind.as_str().to_string(), credentials.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&document)
            .expect("credential document serializes to JSON");
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn read_document(&self) -> Result<BTreeMap<String, Credentials>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            crate::error::StorageError::NotConnected(format!(
                "credential store {} is not valid JSON: {e}",
                self.path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));
        assert!(store
            .load_credentials(BackendKind::Object)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));

        let archive = Credentials::new("ak", "sk").with_scope("dom", "proj");
        store
            .save_credentials(BackendKind::Archive, &archive)
            .unwrap();

        let object = Credentials::new("ak2", "sk2");
        store.save_credentials(BackendKind::Object, &object).unwrap();

        assert_eq!(
            store.load_credentials(BackendKind::Archive).unwrap(),
            Some(archive)
        );
        assert_eq!(
            store.load_credentials(BackendKind::Object).unwrap(),
            Some(object)
        );
        assert!(store
            .load_credentials(BackendKind::Ncloud)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_preserves_other_backends() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("credentials.json"));

        store
            .save_credentials(BackendKind::Object, &Credentials::new("a", "b"))
            .unwrap();
        store
            .save_credentials(BackendKind::Ncloud, &Credentials::new("c", "d"))
            .unwrap();

        let object = store.load_credentials(BackendKind::Object).unwrap();
        assert_eq!(object.unwrap().access_key, "a");
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();

        let store = CredentialStore::new(&path);
        assert!(store.load_credentials(BackendKind::Object).is_err());
    }
}
