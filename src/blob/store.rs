//! # Content-Addressed Blob Store
//!
//! One namespace per table. Each unique payload is stored once at
//! `<namespace>/<sha256-hex>.bin`; records keep only the digest and a
//! [`BlobMetadata`] copy.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::backend::BlobBackend;
use super::errors::{BlobError, BlobResult};
use super::mime::sniff_mime;
use crate::observability::{log_event_with_fields, Event};

/// Extension of every stored blob file
pub const BLOB_EXTENSION: &str = "bin";

/// Per-record description of a stored payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// Payload length in bytes
    pub size: u64,
    /// Sniffed MIME type
    pub mime_type: String,
    /// SHA-256 hex digest; authoritative for equality
    pub hash: String,
}

impl BlobMetadata {
    /// Describe a payload without storing it
    pub fn describe(bytes: &[u8]) -> Self {
        Self {
            size: bytes.len() as u64,
            mime_type: sniff_mime(bytes).to_string(),
            hash: BlobStore::digest(bytes),
        }
    }
}

/// Blob store for one namespace
#[derive(Debug, Clone)]
pub struct BlobStore {
    backend: Arc<dyn BlobBackend>,
    namespace: String,
    default_max_size: u64,
}

impl BlobStore {
    pub fn new(
        backend: Arc<dyn BlobBackend>,
        namespace: impl Into<String>,
        default_max_size: u64,
    ) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            default_max_size,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// SHA-256 hex digest of a payload
    pub fn digest(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Field limit if declared, else the store-wide default
    pub fn effective_limit(&self, field_limit: Option<u64>) -> u64 {
        field_limit.unwrap_or(self.default_max_size)
    }

    /// `SizeLimit` if `size` exceeds the effective limit
    pub fn check_size(&self, size: u64, field_limit: Option<u64>) -> BlobResult<()> {
        let limit = self.effective_limit(field_limit);
        if size > limit {
            return Err(BlobError::SizeLimit { size, limit });
        }
        Ok(())
    }

    fn path(&self, digest: &str) -> BlobResult<String> {
        let valid = digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(BlobError::NotFound(digest.to_string()));
        }
        Ok(format!("{}/{}.{}", self.namespace, digest, BLOB_EXTENSION))
    }

    /// Store a payload, deduplicated by digest.
    ///
    /// Identical bytes always return the same metadata and are written once.
    pub fn put(&self, bytes: &[u8], field_limit: Option<u64>) -> BlobResult<BlobMetadata> {
        self.check_size(bytes.len() as u64, field_limit)?;
        let metadata = BlobMetadata::describe(bytes);
        self.write_if_absent(&metadata.hash, bytes)?;
        Ok(metadata)
    }

    /// Write `bytes` under `digest` unless already present.
    ///
    /// Returns true if a new file was written. The caller guarantees that
    /// `digest` is the digest of `bytes`.
    pub fn write_if_absent(&self, digest: &str, bytes: &[u8]) -> BlobResult<bool> {
        let path = self.path(digest)?;
        let size = bytes.len().to_string();

        if self.backend.exists(&path)? {
            log_event_with_fields(
                Event::BlobDeduplicated,
                &[("hash", digest), ("namespace", self.namespace.as_str())],
            );
            return Ok(false);
        }

        self.backend.write(&path, bytes)?;
        log_event_with_fields(
            Event::BlobStored,
            &[
                ("hash", digest),
                ("namespace", self.namespace.as_str()),
                ("size", size.as_str()),
            ],
        );
        Ok(true)
    }

    /// Stored bytes for a digest
    pub fn get(&self, digest: &str) -> BlobResult<Vec<u8>> {
        let path = self.path(digest)?;
        self.backend.read(&path).map_err(|e| match e {
            BlobError::NotFound(_) => BlobError::NotFound(digest.to_string()),
            other => other,
        })
    }

    pub fn exists(&self, digest: &str) -> BlobResult<bool> {
        match self.path(digest) {
            Ok(path) => self.backend.exists(&path),
            Err(_) => Ok(false),
        }
    }

    /// Digests of every blob in this namespace, sorted
    pub fn digests(&self) -> BlobResult<Vec<String>> {
        let suffix = format!(".{}", BLOB_EXTENSION);
        Ok(self
            .backend
            .list(&self.namespace)?
            .into_iter()
            .filter_map(|name| name.strip_suffix(&suffix).map(str::to_string))
            .collect())
    }
}
