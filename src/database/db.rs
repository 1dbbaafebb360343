//! # Database
//!
//! Owns every table, routes foreign-key lookups between them and saves a
//! snapshot after each successful mutation.
//!
//! Queries and pipelines arrive as JSON and are parsed here; a parse error
//! fails the call before any table is touched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{DbError, DbResult};
use super::persistence::{JsonFileStore, MemoryStore, SnapshotStore};
use super::snapshot::Snapshot;
use crate::aggregate::Pipeline;
use crate::blob::{BlobBackend, BlobCriteria, BlobStore, LocalBackend, MemoryBackend, SimilarMatch};
use crate::config::{DatabaseConfig, DEFAULT_MAX_BINARY_SIZE};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::query::Query;
use crate::schema::Schema;
use crate::table::{ReferenceCheck, Table, TableError, TableResult};

/// Foreign-key lookups against every table but the one being written
struct TableRefs<'a>(&'a BTreeMap<String, Table>);

impl ReferenceCheck for TableRefs<'_> {
    fn exists(&self, table: &str, field: &str, value: &Value) -> bool {
        self.0
            .get(table)
            .map(|t| t.contains(field, value))
            .unwrap_or(false)
    }
}

/// Table names double as blob namespaces
fn check_table_name(name: &str) -> DbResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(DbError::InvalidTableName(name.to_string()));
    }
    Ok(())
}

/// An embedded document database
#[derive(Debug)]
pub struct Database {
    tables: BTreeMap<String, Table>,
    store: Box<dyn SnapshotStore>,
    blob_backend: Arc<dyn BlobBackend>,
    max_binary_size: u64,
}

impl Database {
    /// Open (or create) the database described by `config`.
    ///
    /// Applies the configured log level, creates the data directory and
    /// restores the last snapshot if one exists.
    pub fn open(config: &DatabaseConfig) -> DbResult<Self> {
        config.validate()?;
        Logger::set_min_severity(config.severity()?);

        fs::create_dir_all(&config.data_dir).map_err(|e| {
            DbError::Persistence(format!("create {}: {}", config.data_dir.display(), e))
        })?;

        let data_dir = config.data_dir.display().to_string();
        let db = Self::with_providers(
            Box::new(JsonFileStore::new(config.snapshot_path())),
            Arc::new(LocalBackend::new(config.blob_root())),
            config.max_binary_size,
        )?;
        log_event_with_fields(Event::DbOpen, &[("data_dir", data_dir.as_str())]);
        Ok(db)
    }

    /// Load a config file and open the database it describes
    pub fn open_config_file(path: &Path) -> DbResult<Self> {
        let config = DatabaseConfig::load(path)?;
        Self::open(&config)
    }

    /// Database with in-memory snapshot and blob storage
    pub fn in_memory() -> Self {
        Self {
            tables: BTreeMap::new(),
            store: Box::new(MemoryStore::new()),
            blob_backend: Arc::new(MemoryBackend::new()),
            max_binary_size: DEFAULT_MAX_BINARY_SIZE,
        }
    }

    /// Database over explicit providers, restored from `store`
    pub fn with_providers(
        store: Box<dyn SnapshotStore>,
        blob_backend: Arc<dyn BlobBackend>,
        max_binary_size: u64,
    ) -> DbResult<Self> {
        let mut db = Self {
            tables: BTreeMap::new(),
            store,
            blob_backend,
            max_binary_size,
        };

        if let Some(snapshot) = db.store.load()? {
            db.restore(snapshot)?;
        }
        Ok(db)
    }

    fn restore(&mut self, snapshot: Snapshot) -> DbResult<()> {
        let records = snapshot.record_count().to_string();
        let tables = snapshot.tables.len().to_string();

        for (name, saved) in snapshot.tables {
            check_table_name(&name)?;
            let mut table = self.new_table(&name).with_schema(saved.schema);
            table.load_records(saved.records);
            for field in &saved.indexes {
                table.create_index(field);
            }
            for (field, target) in saved.foreign_keys {
                table.add_foreign_key(field, target.table, target.field);
            }
            self.tables.insert(name, table);
        }

        log_event_with_fields(
            Event::SnapshotLoaded,
            &[("records", records.as_str()), ("tables", tables.as_str())],
        );
        Ok(())
    }

    fn new_table(&self, name: &str) -> Table {
        let blobs = BlobStore::new(self.blob_backend.clone(), name, self.max_binary_size);
        Table::new(name, blobs)
    }

    // ==================================================================
    // Tables
    // ==================================================================

    /// Create `name` with `schema`, or replace the schema of an existing
    /// table. Existing records are not revalidated.
    pub fn define_table(&mut self, name: &str, schema: Schema) -> DbResult<&Table> {
        self.table_mut(name)?.set_schema(schema);
        self.persist()?;
        self.table(name)
            .ok_or_else(|| DbError::InvalidTableName(name.to_string()))
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Table by name, created on first reference.
    ///
    /// Changes made directly through the returned table skip foreign-key
    /// routing to other tables and are saved with the next mutation or
    /// [`Database::save`].
    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut Table> {
        check_table_name(name)?;
        if !self.tables.contains_key(name) {
            let table = self.new_table(name);
            self.tables.insert(name.to_string(), table);
            log_event_with_fields(Event::TableCreated, &[("table", name)]);
        }
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::InvalidTableName(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Run `op` on `name` with the other tables visible for foreign keys.
    ///
    /// A table that does not exist yet is kept only if `op` succeeds.
    fn write<T>(
        &mut self,
        name: &str,
        op: impl FnOnce(&mut Table, &TableRefs<'_>) -> TableResult<T>,
    ) -> DbResult<T> {
        check_table_name(name)?;
        let (mut table, created) = match self.tables.remove(name) {
            Some(table) => (table, false),
            None => (self.new_table(name), true),
        };

        let result = op(&mut table, &TableRefs(&self.tables));
        if result.is_ok() || !created {
            self.tables.insert(name.to_string(), table);
        }
        let value = result?;

        if created {
            log_event_with_fields(Event::TableCreated, &[("table", name)]);
        }
        self.persist()?;
        Ok(value)
    }

    // ==================================================================
    // Records
    // ==================================================================

    pub fn insert(&mut self, table: &str, doc: Value) -> DbResult<Value> {
        self.write(table, |t, refs| t.insert(doc, refs))
    }

    /// Insert every document or none
    pub fn insert_many(&mut self, table: &str, docs: Vec<Value>) -> DbResult<Vec<Value>> {
        self.write(table, |t, refs| t.insert_many(docs, refs))
    }

    /// Matching records; an unknown table has none
    pub fn find(&self, table: &str, query: &Value) -> DbResult<Vec<Value>> {
        let query = Query::from_json(query)?;
        Ok(self.tables.get(table).map(|t| t.find(&query)).unwrap_or_default())
    }

    pub fn find_one(&self, table: &str, query: &Value) -> DbResult<Option<Value>> {
        let query = Query::from_json(query)?;
        Ok(self.tables.get(table).and_then(|t| t.find_one(&query)))
    }

    /// Record by id with binary fields resolved to base64
    pub fn find_by_id(&self, table: &str, id: &str) -> Option<Value> {
        self.tables.get(table)?.find_by_id(id)
    }

    pub fn count(&self, table: &str, query: &Value) -> DbResult<usize> {
        let query = Query::from_json(query)?;
        Ok(self.tables.get(table).map(|t| t.count(&query)).unwrap_or(0))
    }

    pub fn update(&mut self, table: &str, query: &Value, patch: &Value) -> DbResult<usize> {
        let query = Query::from_json(query)?;
        self.write(table, |t, _| t.update(&query, patch))
    }

    pub fn update_one(&mut self, table: &str, query: &Value, patch: &Value) -> DbResult<usize> {
        let query = Query::from_json(query)?;
        self.write(table, |t, _| t.update_one(&query, patch))
    }

    pub fn delete(&mut self, table: &str, query: &Value) -> DbResult<usize> {
        let query = Query::from_json(query)?;
        self.write(table, |t, _| Ok(t.delete(&query)))
    }

    pub fn delete_one(&mut self, table: &str, query: &Value) -> DbResult<usize> {
        let query = Query::from_json(query)?;
        self.write(table, |t, _| Ok(t.delete_one(&query)))
    }

    // ==================================================================
    // Indexes and constraints
    // ==================================================================

    pub fn create_index(&mut self, table: &str, field: &str) -> DbResult<bool> {
        self.write(table, |t, _| Ok(t.create_index(field)))
    }

    pub fn drop_index(&mut self, table: &str, field: &str) -> DbResult<bool> {
        self.write(table, |t, _| Ok(t.drop_index(field)))
    }

    pub fn add_foreign_key(
        &mut self,
        table: &str,
        field: &str,
        target_table: &str,
        target_field: &str,
    ) -> DbResult<()> {
        self.write(table, |t, _| {
            t.add_foreign_key(field, target_table, target_field);
            Ok(())
        })
    }

    // ==================================================================
    // Aggregation and binaries
    // ==================================================================

    /// Run a JSON pipeline over a copy of `table`
    pub fn aggregate(&self, table: &str, pipeline: &Value) -> DbResult<Vec<Value>> {
        let pipeline = Pipeline::from_json(pipeline)?;
        Ok(self.aggregate_with(table, &pipeline))
    }

    /// Run a pipeline built in code
    pub fn aggregate_with(&self, table: &str, pipeline: &Pipeline) -> Vec<Value> {
        self.tables
            .get(table)
            .map(|t| t.aggregate(pipeline))
            .unwrap_or_default()
    }

    /// Raw bytes of one binary field
    pub fn read_binary(&self, table: &str, id: &str, field: &str) -> DbResult<Vec<u8>> {
        match self.tables.get(table) {
            Some(t) => Ok(t.read_binary(id, field)?),
            None => Err(TableError::RecordNotFound(id.to_string()).into()),
        }
    }

    pub fn search_binary(
        &self,
        table: &str,
        field: &str,
        criteria: &BlobCriteria,
    ) -> DbResult<Vec<Value>> {
        Ok(self.binary_table(table, field)?.search_binary(field, criteria)?)
    }

    pub fn find_similar(
        &self,
        table: &str,
        field: &str,
        reference: &[u8],
        size_tolerance: u64,
    ) -> DbResult<Vec<SimilarMatch>> {
        Ok(self
            .binary_table(table, field)?
            .find_similar(field, reference, size_tolerance)?)
    }

    /// An unknown table declares no binary fields
    fn binary_table(&self, name: &str, field: &str) -> DbResult<&Table> {
        self.tables.get(name).ok_or_else(|| {
            TableError::FieldType {
                field: field.to_string(),
                expected: "binary".to_string(),
            }
            .into()
        })
    }

    // ==================================================================
    // Persistence
    // ==================================================================

    /// Current state of every table
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.tables)
    }

    /// Save a snapshot now
    pub fn save(&self) -> DbResult<()> {
        self.persist()
    }

    fn persist(&self) -> DbResult<()> {
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save(&snapshot) {
            let reason = e.to_string();
            log_event_with_fields(Event::SnapshotFailed, &[("error", reason.as_str())]);
            return Err(e);
        }

        let records = snapshot.record_count().to_string();
        log_event_with_fields(Event::SnapshotSaved, &[("records", records.as_str())]);
        Ok(())
    }
}
