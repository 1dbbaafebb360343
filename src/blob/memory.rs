//! # In-Memory Backend
//!
//! Used by in-memory databases and tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::backend::{check_relative, BlobBackend};
use super::errors::{BlobError, BlobResult};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files across all namespaces
    pub fn file_count(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    /// Drop a file, simulating loss outside the engine
    pub fn remove(&self, path: &str) -> bool {
        self.files
            .write()
            .map(|mut f| f.remove(path).is_some())
            .unwrap_or(false)
    }
}

impl BlobBackend for MemoryBackend {
    fn write(&self, path: &str, data: &[u8]) -> BlobResult<()> {
        check_relative(path)?;
        let mut files = self
            .files
            .write()
            .map_err(|_| BlobError::Internal("Lock poisoned".into()))?;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> BlobResult<Vec<u8>> {
        check_relative(path)?;
        let files = self
            .files
            .read()
            .map_err(|_| BlobError::Internal("Lock poisoned".into()))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> BlobResult<bool> {
        check_relative(path)?;
        let files = self
            .files
            .read()
            .map_err(|_| BlobError::Internal("Lock poisoned".into()))?;
        Ok(files.contains_key(path))
    }

    fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        check_relative(prefix)?;
        let files = self
            .files
            .read()
            .map_err(|_| BlobError::Internal("Lock poisoned".into()))?;

        let dir = format!("{}/", prefix);
        Ok(files
            .keys()
            .filter_map(|k| k.strip_prefix(&dir))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_list() {
        let backend = MemoryBackend::new();
        backend.write("t/a.bin", b"1").unwrap();
        backend.write("t/b.bin", b"2").unwrap();
        backend.write("u/c.bin", b"3").unwrap();

        assert_eq!(backend.read("t/a.bin").unwrap(), b"1");
        assert_eq!(backend.list("t").unwrap(), vec!["a.bin", "b.bin"]);
        assert_eq!(backend.file_count(), 3);

        assert!(backend.remove("t/a.bin"));
        assert!(matches!(backend.read("t/a.bin"), Err(BlobError::NotFound(_))));
    }
}
