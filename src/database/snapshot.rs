//! Whole-database snapshot
//!
//! ```json
//! {
//!   "tables": {
//!     "users": {
//!       "records": [...],
//!       "indexes": ["email"],
//!       "foreignKeys": {"teamId": {"table": "teams", "field": "_id"}},
//!       "binaryFields": ["avatar"],
//!       "schema": {"avatar": {"type": "binary", "maxSize": 65536}}
//!     }
//!   }
//! }
//! ```
//!
//! Index contents are not stored; only the indexed field names are, and
//! indexes are rebuilt on restore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::table::{ForeignKeyRef, Record, Table};

/// Persisted state of every table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tables: BTreeMap<String, TableSnapshot>,
}

/// Persisted state of one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, ForeignKeyRef>,
    #[serde(default)]
    pub binary_fields: Vec<String>,
    #[serde(default)]
    pub schema: Schema,
}

impl Snapshot {
    /// Capture the current state of `tables`
    pub fn capture<'a>(tables: impl IntoIterator<Item = (&'a String, &'a Table)>) -> Self {
        let tables = tables
            .into_iter()
            .map(|(name, table)| (name.clone(), TableSnapshot::capture(table)))
            .collect();
        Self { tables }
    }

    /// Total records across all tables
    pub fn record_count(&self) -> usize {
        self.tables.values().map(|t| t.records.len()).sum()
    }
}

impl TableSnapshot {
    pub fn capture(table: &Table) -> Self {
        Self {
            records: table.records().to_vec(),
            indexes: table.indexed_fields(),
            foreign_keys: table.foreign_keys().clone(),
            binary_fields: table
                .schema()
                .binary_fields()
                .map(|(f, _)| f.to_string())
                .collect(),
            schema: table.schema().clone(),
        }
    }
}
