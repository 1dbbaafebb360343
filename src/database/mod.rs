//! Database: table ownership and snapshot persistence

mod db;
mod errors;
mod persistence;
mod snapshot;

pub use db::Database;
pub use errors::{DbError, DbResult};
pub use persistence::{
    compute_checksum, format_checksum, parse_checksum, seal, unseal, JsonFileStore, MemoryStore,
    SnapshotStore, SNAPSHOT_FORMAT_VERSION,
};
pub use snapshot::{Snapshot, TableSnapshot};
