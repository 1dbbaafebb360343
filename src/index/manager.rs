//! Index Manager
//!
//! Owns the `_id` map and every secondary index of one table.
//!
//! # API
//!
//! - `create_index(field, records)` - Build one field's index
//! - `apply_insert(position, record)` - Record appended at `position`
//! - `apply_update(position, old, new)` - Record at `position` changed
//! - `rebuild(records)` - Positions shifted, rebuild everything
//! - `lookup_eq(field, value)` - Exact match lookup
//! - `lookup_id(id)` - Position of a record id

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::btree::{IndexKey, IndexTree, Position};

/// Field every record carries and the manager always maps
pub const ID_FIELD: &str = "_id";

/// In-memory indexes for one table
#[derive(Debug, Default, Clone)]
pub struct IndexManager {
    /// Record id -> position
    ids: HashMap<String, Position>,

    /// Secondary indexes (field -> IndexTree)
    field_indexes: HashMap<String, IndexTree>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index for `field` from the current records.
    ///
    /// Returns false if the field was already indexed.
    pub fn create_index(&mut self, field: &str, records: &[Map<String, Value>]) -> bool {
        if field == ID_FIELD || self.field_indexes.contains_key(field) {
            return false;
        }

        let mut tree = IndexTree::new();
        for (position, record) in records.iter().enumerate() {
            if let Some(key) = record.get(field).and_then(IndexKey::from_json) {
                tree.insert(key, position);
            }
        }
        self.field_indexes.insert(field.to_string(), tree);
        true
    }

    /// Drop the index for `field`. Returns false if there was none.
    pub fn drop_index(&mut self, field: &str) -> bool {
        self.field_indexes.remove(field).is_some()
    }

    /// Whether equality on `field` can be answered from an index
    pub fn has_index(&self, field: &str) -> bool {
        field == ID_FIELD || self.field_indexes.contains_key(field)
    }

    /// Secondary indexed fields, sorted
    pub fn indexed_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.field_indexes.keys().cloned().collect();
        fields.sort();
        fields
    }

    /// Index a record appended at `position`.
    ///
    /// Called after the append.
    pub fn apply_insert(&mut self, position: Position, record: &Map<String, Value>) {
        if let Some(id) = record.get(ID_FIELD).and_then(Value::as_str) {
            self.ids.insert(id.to_string(), position);
        }

        for (field, tree) in self.field_indexes.iter_mut() {
            if let Some(key) = record.get(field).and_then(IndexKey::from_json) {
                tree.insert(key, position);
            }
        }
    }

    /// Move `position` between keys for every field whose value changed.
    pub fn apply_update(
        &mut self,
        position: Position,
        old: &Map<String, Value>,
        new: &Map<String, Value>,
    ) {
        for (field, tree) in self.field_indexes.iter_mut() {
            let old_key = old.get(field).and_then(IndexKey::from_json);
            let new_key = new.get(field).and_then(IndexKey::from_json);
            if old_key == new_key {
                continue;
            }
            if let Some(key) = old_key {
                tree.remove(&key, position);
            }
            if let Some(key) = new_key {
                tree.insert(key, position);
            }
        }
    }

    /// Rebuild the id map and every index from scratch.
    ///
    /// Required whenever positions shift (after a delete).
    pub fn rebuild(&mut self, records: &[Map<String, Value>]) {
        self.ids.clear();
        for tree in self.field_indexes.values_mut() {
            tree.clear();
        }
        for (position, record) in records.iter().enumerate() {
            self.apply_insert(position, record);
        }
    }

    /// Positions of records whose `field` equals `value`.
    ///
    /// `None` when the field is not indexed or the value is not indexable;
    /// callers fall back to a scan.
    pub fn lookup_eq(&self, field: &str, value: &Value) -> Option<Vec<Position>> {
        if field == ID_FIELD {
            let id = value.as_str()?;
            return Some(self.lookup_id(id).into_iter().collect());
        }

        let tree = self.field_indexes.get(field)?;
        let key = IndexKey::from_json(value)?;
        Some(tree.lookup_eq(&key))
    }

    /// Position of the record with the given id
    pub fn lookup_id(&self, id: &str) -> Option<Position> {
        self.ids.get(id).copied()
    }

    /// Index for one field
    pub fn tree(&self, field: &str) -> Option<&IndexTree> {
        self.field_indexes.get(field)
    }

    /// Check every index against the records.
    ///
    /// True when, for each indexed field, the positions under each key are
    /// exactly the positions of the records holding that key, and the id
    /// map points at the right records.
    pub fn is_consistent(&self, records: &[Map<String, Value>]) -> bool {
        if self.ids.len() != records.len() {
            return false;
        }
        for (position, record) in records.iter().enumerate() {
            let id = record.get(ID_FIELD).and_then(Value::as_str);
            if id.and_then(|id| self.lookup_id(id)) != Some(position) {
                return false;
            }
        }

        for (field, tree) in &self.field_indexes {
            let mut expected = IndexTree::new();
            for (position, record) in records.iter().enumerate() {
                if let Some(key) = record.get(field).and_then(IndexKey::from_json) {
                    expected.insert(key, position);
                }
            }
            if !tree.entries().eq(expected.entries()) {
                return false;
            }
        }
        true
    }
}
