//! # Local Filesystem Backend

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::backend::{check_relative, BlobBackend};
use super::errors::{BlobError, BlobResult};

/// Stores each blob as a file under a root directory
#[derive(Debug)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn full_path(&self, path: &str) -> BlobResult<PathBuf> {
        check_relative(path)?;
        Ok(self.root.join(path))
    }
}

impl BlobBackend for LocalBackend {
    fn write(&self, path: &str, data: &[u8]) -> BlobResult<()> {
        let full_path = self.full_path(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BlobError::Io(e.to_string()))?;
        }

        fs::write(&full_path, data).map_err(|e| BlobError::Io(e.to_string()))
    }

    fn read(&self, path: &str) -> BlobResult<Vec<u8>> {
        let full_path = self.full_path(path)?;

        fs::read(&full_path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BlobError::NotFound(path.to_string())
            } else {
                BlobError::Io(e.to_string())
            }
        })
    }

    fn exists(&self, path: &str) -> BlobResult<bool> {
        Ok(self.full_path(path)?.is_file())
    }

    fn list(&self, prefix: &str) -> BlobResult<Vec<String>> {
        let dir = self.full_path(prefix)?;
        let mut names = Vec::new();

        if dir.is_dir() {
            for entry in fs::read_dir(&dir).map_err(|e| BlobError::Io(e.to_string()))? {
                let entry = entry.map_err(|e| BlobError::Io(e.to_string()))?;
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
