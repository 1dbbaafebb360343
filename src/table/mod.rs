//! Record engine
//!
//! One [`Table`] per collection. Tables compose the schema validator, the
//! index manager, the matcher and a blob namespace into
//! insert/find/update/delete.

mod engine;
mod errors;
mod foreign_key;
mod record;

pub use engine::{AccessPath, Table};
pub use errors::{TableError, TableResult};
pub use foreign_key::{ForeignKeyRef, NoTables, ReferenceCheck};
pub use record::{encode_binary, metadata_field, Record, CREATED_AT, METADATA_SUFFIX, UPDATED_AT};
