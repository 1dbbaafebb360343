//! # Record Engine
//!
//! A [`Table`] owns an ordered sequence of records and keeps its indexes,
//! foreign keys, schema and blob namespace consistent with it.
//!
//! ## Write path
//!
//! ```text
//! validate → foreign keys → decode binaries → write blobs → append → index
//! ```
//!
//! Every fallible step runs before the append. Index updates happen only
//! after the record sequence changed and cannot fail.
//!
//! ## Read path
//!
//! `find` uses an index when exactly one indexed field (or `_id`) carries a
//! plain equality. Candidates are re-checked by the full [`Matcher`], so the
//! index only narrows, never decides.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::errors::{TableError, TableResult};
use super::foreign_key::{ForeignKeyRef, ReferenceCheck};
use super::record::{
    decode_binary, encode_binary, is_managed_key, metadata_field, new_id, timestamp, Record,
    CREATED_AT, UPDATED_AT,
};
use crate::aggregate::Pipeline;
use crate::blob::{
    similarity, BlobBackend, BlobCriteria, BlobMetadata, BlobStore, MemoryBackend, SimilarMatch,
};
use crate::config::DEFAULT_MAX_BINARY_SIZE;
use crate::index::{IndexManager, Position, ID_FIELD};
use crate::observability::{log_event_with_fields, Event};
use crate::query::{Matcher, Query};
use crate::schema::{Schema, SchemaValidator};

/// How `find` reaches its candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPath {
    /// Equality lookup on an indexed field
    Index(String),
    /// Every record is checked
    Scan,
}

/// A document ready to append: stored form plus the payloads to write
struct Prepared {
    record: Record,
    blobs: Vec<(String, Vec<u8>)>,
}

/// One named collection of records
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    records: Vec<Record>,
    indexes: IndexManager,
    foreign_keys: BTreeMap<String, ForeignKeyRef>,
    schema: Schema,
    blobs: BlobStore,
}

impl Table {
    /// Create an empty table whose blobs live in `blobs`
    pub fn new(name: impl Into<String>, blobs: BlobStore) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            indexes: IndexManager::new(),
            foreign_keys: BTreeMap::new(),
            schema: Schema::new(),
            blobs,
        }
    }

    /// Table with an in-memory blob namespace and the default size limit
    pub fn in_memory(name: impl Into<String>) -> Self {
        let name = name.into();
        let backend: Arc<dyn BlobBackend> = Arc::new(MemoryBackend::new());
        let blobs = BlobStore::new(backend, name.clone(), DEFAULT_MAX_BINARY_SIZE);
        Self::new(name, blobs)
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Replace the schema. Existing records are not revalidated.
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = schema;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in table order, stored form
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn foreign_keys(&self) -> &BTreeMap<String, ForeignKeyRef> {
        &self.foreign_keys
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Whether every index and the id map agree with the records
    pub fn is_consistent(&self) -> bool {
        self.indexes.is_consistent(&self.records)
    }

    /// Replace all records and rebuild the indexes.
    ///
    /// Used when restoring a snapshot; records are taken as stored.
    pub(crate) fn load_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.indexes.rebuild(&self.records);
    }

    // ==================================================================
    // Insert
    // ==================================================================

    /// Insert one document. Returns the stored record.
    pub fn insert(&mut self, doc: Value, refs: &dyn ReferenceCheck) -> TableResult<Value> {
        let prepared = self.prepare(doc, refs)?;
        self.write_blobs(&prepared.blobs)?;

        let record = prepared.record;
        let stored = Value::Object(record.clone());
        self.append(record);

        log_event_with_fields(
            Event::RecordsInserted,
            &[("count", "1"), ("table", self.name.as_str())],
        );
        Ok(stored)
    }

    /// Insert every document or none of them.
    ///
    /// All documents are validated and prepared before any blob is written,
    /// and all blobs are written before any record is appended.
    pub fn insert_many(
        &mut self,
        docs: Vec<Value>,
        refs: &dyn ReferenceCheck,
    ) -> TableResult<Vec<Value>> {
        let prepared = docs
            .into_iter()
            .map(|doc| self.prepare(doc, refs))
            .collect::<TableResult<Vec<_>>>()?;

        for p in &prepared {
            self.write_blobs(&p.blobs)?;
        }

        let mut stored = Vec::with_capacity(prepared.len());
        for p in prepared {
            stored.push(Value::Object(p.record.clone()));
            self.append(p.record);
        }

        let count = stored.len().to_string();
        log_event_with_fields(
            Event::RecordsInserted,
            &[("count", count.as_str()), ("table", self.name.as_str())],
        );
        Ok(stored)
    }

    fn prepare(&self, doc: Value, refs: &dyn ReferenceCheck) -> TableResult<Prepared> {
        let Value::Object(mut record) = doc else {
            return Err(TableError::InvalidDocument(
                "document must be a JSON object".to_string(),
            ));
        };
        record.retain(|key, _| !is_managed_key(key, &self.schema));

        let violations = SchemaValidator::new(&self.schema).validate(&record);
        if !violations.is_empty() {
            self.reject("validation");
            return Err(TableError::Validation(violations));
        }

        self.check_foreign_keys(&record, refs)?;

        let blobs = self.encode_binaries(&mut record)?;

        record.insert(ID_FIELD.to_string(), Value::String(new_id()));
        record.insert(CREATED_AT.to_string(), timestamp());
        Ok(Prepared { record, blobs })
    }

    fn check_foreign_keys(&self, record: &Record, refs: &dyn ReferenceCheck) -> TableResult<()> {
        for (field, target) in &self.foreign_keys {
            let value = match record.get(field) {
                None | Some(Value::Null) => continue,
                Some(v) => v,
            };

            let found = if target.table == self.name {
                self.contains(&target.field, value)
            } else {
                refs.exists(&target.table, &target.field, value)
            };

            if !found {
                self.reject("foreign_key");
                return Err(TableError::ForeignKey {
                    field: field.clone(),
                    table: target.table.clone(),
                    target_field: target.field.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Replace binary payloads in `record` with digests and metadata.
    ///
    /// Returns the payloads to write. Nothing is written here.
    fn encode_binaries(&self, record: &mut Record) -> TableResult<Vec<(String, Vec<u8>)>> {
        let mut blobs = Vec::new();

        for (field, rule) in self.schema.binary_fields() {
            let bytes = match record.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => decode_binary(field, value)?,
            };
            if let Err(e) = self.blobs.check_size(bytes.len() as u64, rule.max_size) {
                self.reject("size_limit");
                return Err(e.into());
            }

            let metadata = BlobMetadata::describe(&bytes);
            let metadata_value = serde_json::to_value(&metadata)
                .map_err(|e| TableError::InvalidDocument(e.to_string()))?;

            record.insert(field.to_string(), Value::String(metadata.hash.clone()));
            record.insert(metadata_field(field), metadata_value);
            blobs.push((metadata.hash, bytes));
        }

        Ok(blobs)
    }

    fn write_blobs(&self, blobs: &[(String, Vec<u8>)]) -> TableResult<()> {
        for (digest, bytes) in blobs {
            self.blobs.write_if_absent(digest, bytes)?;
        }
        Ok(())
    }

    fn append(&mut self, record: Record) {
        let position = self.records.len();
        self.records.push(record);
        self.indexes.apply_insert(position, &self.records[position]);
    }

    fn reject(&self, reason: &str) {
        log_event_with_fields(
            Event::WriteRejected,
            &[("reason", reason), ("table", self.name.as_str())],
        );
    }

    // ==================================================================
    // Read
    // ==================================================================

    /// How `find` would answer `query`
    pub fn access_path(&self, query: &Query) -> AccessPath {
        match query.index_candidate(|f| self.indexes.has_index(f)) {
            Some((field, value)) if self.indexes.lookup_eq(field, value).is_some() => {
                AccessPath::Index(field.to_string())
            }
            _ => AccessPath::Scan,
        }
    }

    fn find_positions(&self, query: &Query) -> Vec<Position> {
        if query.is_empty() {
            return (0..self.records.len()).collect();
        }

        if let Some((field, value)) = query.index_candidate(|f| self.indexes.has_index(f)) {
            if let Some(mut candidates) = self.indexes.lookup_eq(field, value) {
                candidates.sort_unstable();
                return candidates
                    .into_iter()
                    .filter(|&p| Matcher::matches(&self.records[p], query))
                    .collect();
            }
        }

        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| Matcher::matches(r, query))
            .map(|(p, _)| p)
            .collect()
    }

    /// Matching records in table order, stored form
    pub fn find(&self, query: &Query) -> Vec<Value> {
        self.find_positions(query)
            .into_iter()
            .map(|p| Value::Object(self.records[p].clone()))
            .collect()
    }

    pub fn find_one(&self, query: &Query) -> Option<Value> {
        self.find_positions(query)
            .first()
            .map(|&p| Value::Object(self.records[p].clone()))
    }

    /// Whether any record's `field` equals `value`
    pub fn contains(&self, field: &str, value: &Value) -> bool {
        !self
            .find_positions(&Query::all().eq(field, value.clone()))
            .is_empty()
    }

    /// Record by id with binary fields resolved to base64 payloads.
    ///
    /// A blob that cannot be read is logged and returned as null.
    pub fn find_by_id(&self, id: &str) -> Option<Value> {
        let position = self.indexes.lookup_id(id)?;
        let mut record = self.records[position].clone();

        for (field, _) in self.schema.binary_fields() {
            let digest = match record.get(field) {
                Some(Value::String(d)) => d.clone(),
                _ => continue,
            };
            let resolved = match self.blobs.get(&digest) {
                Ok(bytes) => Value::String(encode_binary(&bytes)),
                Err(e) => {
                    let reason = e.to_string();
                    log_event_with_fields(
                        Event::BlobMissing,
                        &[
                            ("error", reason.as_str()),
                            ("field", field),
                            ("hash", digest.as_str()),
                            ("table", self.name.as_str()),
                        ],
                    );
                    Value::Null
                }
            };
            record.insert(field.to_string(), resolved);
        }

        Some(Value::Object(record))
    }

    /// Raw bytes of one binary field. Errors are propagated.
    pub fn read_binary(&self, id: &str, field: &str) -> TableResult<Vec<u8>> {
        self.require_binary(field)?;
        let position = self
            .indexes
            .lookup_id(id)
            .ok_or_else(|| TableError::RecordNotFound(id.to_string()))?;

        match self.records[position].get(field) {
            Some(Value::String(digest)) => Ok(self.blobs.get(digest)?),
            _ => Err(crate::blob::BlobError::NotFound(format!("{}.{}", id, field)).into()),
        }
    }

    /// Number of matching records; O(1) for the empty query
    pub fn count(&self, query: &Query) -> usize {
        if query.is_empty() {
            return self.records.len();
        }
        self.find_positions(query).len()
    }

    // ==================================================================
    // Update / delete
    // ==================================================================

    /// Merge `patch` into every matching record. Returns the number updated.
    pub fn update(&mut self, query: &Query, patch: &Value) -> TableResult<usize> {
        let positions = self.find_positions(query);
        self.update_positions(positions, patch)
    }

    /// Merge `patch` into the first matching record
    pub fn update_one(&mut self, query: &Query, patch: &Value) -> TableResult<usize> {
        let positions = self.find_positions(query).into_iter().take(1).collect();
        self.update_positions(positions, patch)
    }

    fn update_positions(&mut self, positions: Vec<Position>, patch: &Value) -> TableResult<usize> {
        let Value::Object(patch) = patch else {
            return Err(TableError::InvalidDocument(
                "patch must be a JSON object".to_string(),
            ));
        };
        let patch: Map<String, Value> = patch
            .iter()
            .filter(|(k, _)| !is_managed_key(k, &self.schema))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if positions.is_empty() {
            return Ok(0);
        }

        let validator = SchemaValidator::new(&self.schema);
        let mut violations = Vec::new();
        for &p in &positions {
            let mut candidate = self.records[p].clone();
            candidate.extend(patch.clone());
            violations.extend(validator.validate(&candidate));
        }
        if !violations.is_empty() {
            self.reject("validation");
            return Err(TableError::Validation(violations));
        }

        let mut patch = patch;
        let blobs = self.encode_binaries(&mut patch)?;
        self.write_blobs(&blobs)?;

        let cleared: Vec<String> = self
            .schema
            .binary_fields()
            .filter(|(f, _)| matches!(patch.get(*f), Some(Value::Null)))
            .map(|(f, _)| metadata_field(f))
            .collect();

        let updated_at = timestamp();
        for &p in &positions {
            let old = self.records[p].clone();
            let record = &mut self.records[p];
            record.extend(patch.clone());
            for key in &cleared {
                record.remove(key);
            }
            record.insert(UPDATED_AT.to_string(), updated_at.clone());
            self.indexes.apply_update(p, &old, &self.records[p]);
        }

        let count = positions.len().to_string();
        log_event_with_fields(
            Event::RecordsUpdated,
            &[("count", count.as_str()), ("table", self.name.as_str())],
        );
        Ok(positions.len())
    }

    /// Remove every matching record. Returns the number removed.
    pub fn delete(&mut self, query: &Query) -> usize {
        let positions = self.find_positions(query);
        self.delete_positions(positions)
    }

    /// Remove the first matching record
    pub fn delete_one(&mut self, query: &Query) -> usize {
        let positions = self.find_positions(query).into_iter().take(1).collect();
        self.delete_positions(positions)
    }

    fn delete_positions(&mut self, positions: Vec<Position>) -> usize {
        if positions.is_empty() {
            return 0;
        }

        let mut doomed = positions.iter().copied().peekable();
        let mut position = 0;
        self.records.retain(|_| {
            let keep = doomed.peek() != Some(&position);
            if !keep {
                doomed.next();
            }
            position += 1;
            keep
        });
        self.indexes.rebuild(&self.records);

        let count = positions.len().to_string();
        log_event_with_fields(
            Event::RecordsDeleted,
            &[("count", count.as_str()), ("table", self.name.as_str())],
        );
        log_event_with_fields(Event::IndexRebuilt, &[("table", self.name.as_str())]);
        positions.len()
    }

    // ==================================================================
    // Indexes and constraints
    // ==================================================================

    /// Index `field`. Returns false if it was already indexed.
    pub fn create_index(&mut self, field: &str) -> bool {
        let created = self.indexes.create_index(field, &self.records);
        if created {
            log_event_with_fields(
                Event::IndexBuilt,
                &[("field", field), ("table", self.name.as_str())],
            );
        }
        created
    }

    pub fn drop_index(&mut self, field: &str) -> bool {
        self.indexes.drop_index(field)
    }

    /// Secondary indexed fields, sorted
    pub fn indexed_fields(&self) -> Vec<String> {
        self.indexes.indexed_fields()
    }

    /// Require `field` to reference `target_field` of `table` on insert
    pub fn add_foreign_key(
        &mut self,
        field: impl Into<String>,
        table: impl Into<String>,
        target_field: impl Into<String>,
    ) {
        self.foreign_keys
            .insert(field.into(), ForeignKeyRef::new(table, target_field));
    }

    // ==================================================================
    // Aggregation and binary search
    // ==================================================================

    /// Run `pipeline` over a copy of the records
    pub fn aggregate(&self, pipeline: &Pipeline) -> Vec<Value> {
        let records = self.records.iter().cloned().map(Value::Object).collect();
        pipeline.execute(records)
    }

    fn require_binary(&self, field: &str) -> TableResult<()> {
        if self.schema.is_binary(field) {
            Ok(())
        } else {
            Err(TableError::FieldType {
                field: field.to_string(),
                expected: "binary".to_string(),
            })
        }
    }

    fn metadata_of(record: &Record, field: &str) -> Option<BlobMetadata> {
        let value = record.get(&metadata_field(field))?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Records whose payload in `field` meets any of `criteria`
    pub fn search_binary(&self, field: &str, criteria: &BlobCriteria) -> TableResult<Vec<Value>> {
        self.require_binary(field)?;
        if criteria.is_empty() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for record in &self.records {
            let Some(metadata) = Self::metadata_of(record, field) else {
                continue;
            };
            let load = || match self.blobs.get(&metadata.hash) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    let reason = e.to_string();
                    log_event_with_fields(
                        Event::BlobMissing,
                        &[
                            ("error", reason.as_str()),
                            ("field", field),
                            ("hash", metadata.hash.as_str()),
                            ("table", self.name.as_str()),
                        ],
                    );
                    None
                }
            };
            if criteria.matches(&metadata, load) {
                found.push(Value::Object(record.clone()));
            }
        }
        Ok(found)
    }

    /// Records whose payload in `field` is identical to `reference` or
    /// within `size_tolerance` bytes of its length
    pub fn find_similar(
        &self,
        field: &str,
        reference: &[u8],
        size_tolerance: u64,
    ) -> TableResult<Vec<SimilarMatch>> {
        self.require_binary(field)?;
        let reference_hash = BlobStore::digest(reference);
        let reference_size = reference.len() as u64;

        Ok(self
            .records
            .iter()
            .filter_map(|record| {
                let metadata = Self::metadata_of(record, field)?;
                let exact = similarity(&metadata, &reference_hash, reference_size, size_tolerance)?;
                Some(SimilarMatch {
                    record: Value::Object(record.clone()),
                    exact,
                })
            })
            .collect())
    }
}
