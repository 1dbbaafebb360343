//! Index Manager subsystem
//!
//! Indexes are derived, in-memory-only state: they are never persisted,
//! only the list of indexed fields is. They are rebuilt on load.
//!
//! # Invariants
//!
//! - For every record at position `p` with indexable value `v` on an
//!   indexed field, `p` is under key `v` and under no other key
//! - Updates occur AFTER the record sequence changes
//! - Lookups return positions sorted ascending

mod btree;
mod manager;

pub use btree::{IndexKey, IndexTree, Position};
pub use manager::{IndexManager, ID_FIELD};
