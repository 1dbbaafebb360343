//! Snapshot persistence providers
//!
//! Snapshots are stored inside a checksummed envelope:
//!
//! ```json
//! {"version": 1, "checksum": "crc32:deadbeef", "body": "{\"tables\":{...}}"}
//! ```
//!
//! `body` is the snapshot serialized as a JSON string; `checksum` is the
//! CRC32 (IEEE) of its bytes. A mismatch on load is an error, never a
//! silent reset.

use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use super::errors::{DbError, DbResult};
use super::snapshot::Snapshot;

/// Envelope format version
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Where the database keeps its snapshot
pub trait SnapshotStore: Send + Sync + fmt::Debug {
    /// Last saved snapshot; `None` if nothing was saved yet
    fn load(&self) -> DbResult<Option<Snapshot>>;

    /// Replace the saved snapshot
    fn save(&self, snapshot: &Snapshot) -> DbResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    body: String,
}

/// CRC32 of `data`
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// `crc32:xxxxxxxx`, lowercase, zero-padded
pub fn format_checksum(checksum: u32) -> String {
    format!("crc32:{:08x}", checksum)
}

pub fn parse_checksum(formatted: &str) -> Option<u32> {
    let hex = formatted.strip_prefix("crc32:")?;
    u32::from_str_radix(hex, 16).ok()
}

fn persistence(context: &str, e: impl fmt::Display) -> DbError {
    DbError::Persistence(format!("{}: {}", context, e))
}

/// Serialize a snapshot into an envelope
pub fn seal(snapshot: &Snapshot) -> DbResult<String> {
    let body = serde_json::to_string(snapshot).map_err(|e| persistence("serialize snapshot", e))?;
    let envelope = Envelope {
        version: SNAPSHOT_FORMAT_VERSION,
        checksum: format_checksum(compute_checksum(body.as_bytes())),
        body,
    };
    serde_json::to_string(&envelope).map_err(|e| persistence("serialize envelope", e))
}

/// Verify an envelope and decode its snapshot
pub fn unseal(text: &str) -> DbResult<Snapshot> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| persistence("malformed envelope", e))?;

    if envelope.version != SNAPSHOT_FORMAT_VERSION {
        return Err(DbError::Persistence(format!(
            "unsupported snapshot version {}",
            envelope.version
        )));
    }

    let expected = parse_checksum(&envelope.checksum).ok_or_else(|| {
        DbError::Persistence(format!("malformed checksum {:?}", envelope.checksum))
    })?;
    let actual = compute_checksum(envelope.body.as_bytes());
    if expected != actual {
        return Err(DbError::Persistence(format!(
            "checksum mismatch: expected {}, found {}",
            format_checksum(expected),
            format_checksum(actual)
        )));
    }

    serde_json::from_str(&envelope.body).map_err(|e| persistence("malformed snapshot body", e))
}

/// Snapshot in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> DbResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| persistence(&format!("read {}", self.path.display()), e))?;
        unseal(&text).map(Some)
    }

    /// Write to a sibling temp file, fsync, then rename over the target
    fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        let text = seal(snapshot)?;
        let temp = self.temp_path();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| persistence(&format!("create {}", parent.display()), e))?;
            }
        }

        let mut file = File::create(&temp)
            .map_err(|e| persistence(&format!("create {}", temp.display()), e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| persistence(&format!("write {}", temp.display()), e))?;
        file.sync_all()
            .map_err(|e| persistence(&format!("fsync {}", temp.display()), e))?;
        drop(file);

        fs::rename(&temp, &self.path)
            .map_err(|e| persistence(&format!("rename to {}", self.path.display()), e))
    }
}

/// Snapshot envelope held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    envelope: RwLock<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw envelope text of the last save
    pub fn contents(&self) -> Option<String> {
        self.envelope.read().ok().and_then(|e| e.clone())
    }

    /// Replace the raw envelope text
    pub fn set_contents(&self, text: impl Into<String>) {
        if let Ok(mut envelope) = self.envelope.write() {
            *envelope = Some(text.into());
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> DbResult<Option<Snapshot>> {
        match self.contents() {
            Some(text) => unseal(&text).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> DbResult<()> {
        let text = seal(snapshot)?;
        let mut envelope = self
            .envelope
            .write()
            .map_err(|_| DbError::Persistence("lock poisoned".to_string()))?;
        *envelope = Some(text);
        Ok(())
    }
}
