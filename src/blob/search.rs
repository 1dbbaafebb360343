//! Blob search criteria and size-based similarity

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::BlobMetadata;

/// Substring to look for inside a payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlobPattern {
    /// Matched against the payload decoded as (lossy) UTF-8
    Text(String),
    /// Matched as a raw byte substring
    Bytes(Vec<u8>),
}

impl BlobPattern {
    pub fn is_found_in(&self, bytes: &[u8]) -> bool {
        match self {
            BlobPattern::Text(text) => String::from_utf8_lossy(bytes).contains(text.as_str()),
            BlobPattern::Bytes(needle) => {
                needle.is_empty() || bytes.windows(needle.len()).any(|w| w == needle.as_slice())
            }
        }
    }
}

/// Search criteria for one binary field.
///
/// Criteria combine with OR: a record matches when any supplied criterion
/// holds. No criteria match nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<BlobPattern>,
}

impl BlobCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    pub fn min_size(mut self, bytes: u64) -> Self {
        self.min_size = Some(bytes);
        self
    }

    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn pattern(mut self, pattern: BlobPattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mime_type.is_none()
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.pattern.is_none()
    }

    /// Evaluate against one record's metadata.
    ///
    /// `load` fetches the payload and is only called when the pattern is
    /// the last criterion left to decide the match. A `None` payload makes
    /// the pattern criterion false.
    pub fn matches<F>(&self, metadata: &BlobMetadata, load: F) -> bool
    where
        F: FnOnce() -> Option<Vec<u8>>,
    {
        if let Some(mime) = &self.mime_type {
            if &metadata.mime_type == mime {
                return true;
            }
        }
        if let Some(min) = self.min_size {
            if metadata.size >= min {
                return true;
            }
        }
        if let Some(max) = self.max_size {
            if metadata.size <= max {
                return true;
            }
        }
        match &self.pattern {
            Some(pattern) => load().map(|bytes| pattern.is_found_in(&bytes)).unwrap_or(false),
            None => false,
        }
    }
}

/// A record returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    /// Record in stored form
    pub record: Value,
    /// True when the digest equals the reference digest
    pub exact: bool,
}

/// Size-based near-match test.
///
/// `Some(true)` for an exact digest match, `Some(false)` for a size within
/// tolerance, `None` otherwise. Payload bytes are never inspected.
pub fn similarity(
    metadata: &BlobMetadata,
    reference_hash: &str,
    reference_size: u64,
    size_tolerance: u64,
) -> Option<bool> {
    if metadata.hash == reference_hash {
        return Some(true);
    }
    if metadata.size.abs_diff(reference_size) <= size_tolerance {
        return Some(false);
    }
    None
}
