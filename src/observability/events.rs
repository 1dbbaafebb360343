//! Lifecycle events emitted by the engine
//!
//! Events are explicit and typed; the logger only ever sees their
//! upper-case names.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Database lifecycle
    /// Database opened and snapshot applied
    DbOpen,
    /// Configuration file loaded
    ConfigLoaded,
    /// Snapshot read from the persistence provider
    SnapshotLoaded,
    /// Snapshot written to the persistence provider
    SnapshotSaved,
    /// Snapshot write failed
    SnapshotFailed,

    // Tables
    /// Table created on first reference
    TableCreated,

    // Writes
    /// One or more records appended
    RecordsInserted,
    /// Records merged with a patch
    RecordsUpdated,
    /// Records removed
    RecordsDeleted,
    /// Write rejected before any mutation
    WriteRejected,

    // Indexes
    /// Index built from current records
    IndexBuilt,
    /// All indexes rebuilt after a structural change
    IndexRebuilt,

    // Blobs
    /// New blob written to the backend
    BlobStored,
    /// Blob already present, write skipped
    BlobDeduplicated,
    /// Blob referenced by a record could not be read
    BlobMissing,

    // Aggregation
    /// Pipeline stage with no recognized operator skipped
    PipelineStageIgnored,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DbOpen => "DB_OPEN",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SnapshotLoaded => "SNAPSHOT_LOADED",
            Event::SnapshotSaved => "SNAPSHOT_SAVED",
            Event::SnapshotFailed => "SNAPSHOT_FAILED",
            Event::TableCreated => "TABLE_CREATED",
            Event::RecordsInserted => "RECORDS_INSERTED",
            Event::RecordsUpdated => "RECORDS_UPDATED",
            Event::RecordsDeleted => "RECORDS_DELETED",
            Event::WriteRejected => "WRITE_REJECTED",
            Event::IndexBuilt => "INDEX_BUILT",
            Event::IndexRebuilt => "INDEX_REBUILT",
            Event::BlobStored => "BLOB_STORED",
            Event::BlobDeduplicated => "BLOB_DEDUPLICATED",
            Event::BlobMissing => "BLOB_MISSING",
            Event::PipelineStageIgnored => "PIPELINE_STAGE_IGNORED",
        }
    }

    /// Severity an event is logged at
    pub fn severity(&self) -> super::Severity {
        use super::Severity;
        match self {
            Event::SnapshotFailed => Severity::Error,
            Event::BlobMissing | Event::PipelineStageIgnored | Event::WriteRejected => {
                Severity::Warn
            }
            Event::BlobDeduplicated | Event::IndexRebuilt | Event::SnapshotSaved => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Severity;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::DbOpen,
            Event::ConfigLoaded,
            Event::SnapshotLoaded,
            Event::SnapshotSaved,
            Event::SnapshotFailed,
            Event::TableCreated,
            Event::RecordsInserted,
            Event::RecordsUpdated,
            Event::RecordsDeleted,
            Event::WriteRejected,
            Event::IndexBuilt,
            Event::IndexRebuilt,
            Event::BlobStored,
            Event::BlobDeduplicated,
            Event::BlobMissing,
            Event::PipelineStageIgnored,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::SnapshotFailed.severity(), Severity::Error);
        assert_eq!(Event::BlobMissing.severity(), Severity::Warn);
        assert_eq!(Event::TableCreated.severity(), Severity::Info);
    }
}
