//! Binary Store Tests
//!
//! Binary fields end to end:
//! - Size limits (field maxSize over the store default)
//! - Deduplication by digest
//! - Search and similarity
//! - Missing blobs surface as null in find_by_id

use std::sync::Arc;

use emberdb::blob::{BlobBackend, BlobCriteria, BlobPattern, BlobStore, LocalBackend, MemoryBackend};
use emberdb::config::DEFAULT_MAX_BINARY_SIZE;
use emberdb::database::MemoryStore;
use emberdb::schema::{FieldRule, Schema};
use emberdb::table::encode_binary;
use emberdb::Database;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn files_db(backend: Arc<dyn BlobBackend>, default_limit: u64) -> Database {
    let mut db =
        Database::with_providers(Box::new(MemoryStore::new()), backend, default_limit).unwrap();
    let schema = Schema::new()
        .field("name", FieldRule::string())
        .field("small", FieldRule::binary().max_size(100))
        .field("large", FieldRule::binary());
    db.define_table("files", schema).unwrap();
    db
}

// =============================================================================
// Size Enforcement
// =============================================================================

/// 150 bytes against maxSize 100 fails; 50 bytes round-trips.
#[test]
fn test_field_size_limit() {
    let mut db = files_db(Arc::new(MemoryBackend::new()), DEFAULT_MAX_BINARY_SIZE);

    let err = db.insert("files", json!({"small": vec![1u8; 150]})).unwrap_err();
    assert_eq!(err.code(), "EMBER_SIZE_LIMIT");
    assert_eq!(db.count("files", &json!({})).unwrap(), 0);

    let payload: Vec<u8> = (0..50).collect();
    let stored = db.insert("files", json!({"small": payload.clone()})).unwrap();
    let id = stored["_id"].as_str().unwrap();

    let fetched = db.find_by_id("files", id).unwrap();
    assert_eq!(fetched["small"], json!(encode_binary(&payload)));
    assert_eq!(db.read_binary("files", id, "small").unwrap(), payload);
}

/// Boundary: exactly the limit succeeds, one more byte fails.
#[test]
fn test_size_boundary_and_default_limit() {
    let mut db = files_db(Arc::new(MemoryBackend::new()), 64);

    assert!(db.insert("files", json!({"small": vec![0u8; 100]})).is_ok());
    assert!(db.insert("files", json!({"small": vec![0u8; 101]})).is_err());

    // Field without maxSize uses the store-wide default
    assert!(db.insert("files", json!({"large": vec![0u8; 64]})).is_ok());
    let err = db.insert("files", json!({"large": vec![0u8; 65]})).unwrap_err();
    assert_eq!(err.to_string(), "Binary payload too large: 65 bytes (max: 64)");
}

// =============================================================================
// Deduplication
// =============================================================================

/// Same bytes twice produce one file and one digest.
#[test]
fn test_dedup_on_disk() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(LocalBackend::new(temp.path()));
    let mut db = files_db(backend, DEFAULT_MAX_BINARY_SIZE);

    let bytes = b"%PDF-1.7 same document".to_vec();
    let a = db.insert("files", json!({"large": encode_binary(&bytes)})).unwrap();
    let b = db.insert("files", json!({"large": bytes.clone()})).unwrap();

    let digest = BlobStore::digest(&bytes);
    assert_eq!(a["large"], json!(digest));
    assert_eq!(b["large"], json!(digest));
    assert_eq!(a["large_metadata"]["mimeType"], "application/pdf");
    assert_eq!(a["large_metadata"]["hash"], json!(digest));

    let dir = temp.path().join("files");
    let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(entries.len(), 1);
    assert!(dir.join(format!("{}.bin", digest)).exists());
    assert_eq!(db.table("files").unwrap().blob_store().digests().unwrap(), vec![digest]);
}

// =============================================================================
// Missing Blobs
// =============================================================================

/// A lost blob reads as null in find_by_id and as an error in read_binary.
#[test]
fn test_missing_blob() {
    let backend = Arc::new(MemoryBackend::new());
    let mut db = files_db(backend.clone(), DEFAULT_MAX_BINARY_SIZE);

    let stored = db.insert("files", json!({"name": "x", "large": [1, 2, 3]})).unwrap();
    let id = stored["_id"].as_str().unwrap();
    let digest = stored["large"].as_str().unwrap();
    assert!(backend.remove(&format!("files/{}.bin", digest)));

    let fetched = db.find_by_id("files", id).unwrap();
    assert!(fetched["large"].is_null());
    assert_eq!(fetched["name"], "x");

    let err = db.read_binary("files", id, "large").unwrap_err();
    assert_eq!(err.code(), "EMBER_BLOB_NOT_FOUND");
}

// =============================================================================
// Search and Similarity
// =============================================================================

#[test]
fn test_search_binary() {
    let mut db = files_db(Arc::new(MemoryBackend::new()), DEFAULT_MAX_BINARY_SIZE);
    db.insert("files", json!({"name": "jpeg", "large": [0xFF, 0xD8, 0xFF, 0xE0]})).unwrap();
    db.insert("files", json!({"name": "gif", "large": encode_binary(b"GIF89a....")})).unwrap();
    db.insert("files", json!({"name": "text", "large": encode_binary(b"plain text body")})).unwrap();

    let search = |criteria: BlobCriteria| -> Vec<String> {
        db.search_binary("files", "large", &criteria)
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(search(BlobCriteria::new().mime_type("image/gif")), vec!["gif"]);
    assert_eq!(search(BlobCriteria::new().max_size(4)), vec!["jpeg"]);
    assert_eq!(search(BlobCriteria::new().pattern(BlobPattern::Text("text".into()))), vec!["text"]);
    assert_eq!(
        search(BlobCriteria::new().pattern(BlobPattern::Bytes(vec![0xD8, 0xFF]))),
        vec!["jpeg"]
    );
    assert_eq!(
        search(BlobCriteria::new().mime_type("image/jpeg").min_size(15)),
        vec!["jpeg", "text"]
    );
    assert!(search(BlobCriteria::new()).is_empty());

    let err = db.search_binary("files", "name", &BlobCriteria::new()).unwrap_err();
    assert_eq!(err.code(), "EMBER_FIELD_TYPE");
}

#[test]
fn test_find_similar() {
    let mut db = files_db(Arc::new(MemoryBackend::new()), DEFAULT_MAX_BINARY_SIZE);
    let reference = vec![9u8; 40];
    db.insert("files", json!({"name": "copy", "large": reference.clone()})).unwrap();
    db.insert("files", json!({"name": "near", "large": vec![1u8; 38]})).unwrap();
    db.insert("files", json!({"name": "far", "large": vec![1u8; 10]})).unwrap();
    db.insert("files", json!({"name": "copy2", "large": reference.clone()})).unwrap();

    let similar = db.find_similar("files", "large", &reference, 2).unwrap();
    let found: Vec<(&str, bool)> = similar
        .iter()
        .map(|m| (m.record["name"].as_str().unwrap(), m.exact))
        .collect();
    assert_eq!(found, vec![("copy", true), ("near", false), ("copy2", true)]);

    let exact_only = db.find_similar("files", "large", &reference, 0).unwrap();
    assert_eq!(exact_only.len(), 2);
    assert!(exact_only.iter().all(|m| m.exact));
}
