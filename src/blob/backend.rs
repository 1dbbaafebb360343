//! # Blob Backend Trait

use super::errors::BlobResult;

/// Byte storage addressed by relative paths such as `users/<digest>.bin`
pub trait BlobBackend: Send + Sync + std::fmt::Debug {
    /// Write data to path, creating parents as needed
    fn write(&self, path: &str, data: &[u8]) -> BlobResult<()>;

    /// Read data from path; `NotFound` if absent
    fn read(&self, path: &str) -> BlobResult<Vec<u8>>;

    /// Check if path exists
    fn exists(&self, path: &str) -> BlobResult<bool>;

    /// File names directly under a directory prefix
    fn list(&self, prefix: &str) -> BlobResult<Vec<String>>;
}

/// Reject absolute paths and parent-directory components
pub(crate) fn check_relative(path: &str) -> BlobResult<()> {
    use super::errors::BlobError;

    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|part| part == ".." || part.is_empty());
    if bad {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    Ok(())
}
