//! Foreign-key constraints
//!
//! A table declares `field -> (table, target_field)` pairs. On insert, a
//! present non-null value must equal `target_field` of at least one record
//! in the target table. Lookups go through [`ReferenceCheck`] so a table
//! never holds references to other tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub field: String,
}

impl ForeignKeyRef {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

/// Point lookup into other tables
pub trait ReferenceCheck {
    /// Whether `table` holds a record whose `field` equals `value`
    fn exists(&self, table: &str, field: &str, value: &Value) -> bool;
}

impl<F> ReferenceCheck for F
where
    F: Fn(&str, &str, &Value) -> bool,
{
    fn exists(&self, table: &str, field: &str, value: &Value) -> bool {
        self(table, field, value)
    }
}

/// Reference check with no other tables
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTables;

impl ReferenceCheck for NoTables {
    fn exists(&self, _table: &str, _field: &str, _value: &Value) -> bool {
        false
    }
}
