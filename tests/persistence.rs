//! Persistence Tests
//!
//! - Every mutation saves a snapshot
//! - Reopening restores records, indexes, foreign keys and schemas
//! - A corrupted snapshot is refused

use std::fs;

use emberdb::config::DatabaseConfig;
use emberdb::database::{unseal, JsonFileStore, SnapshotStore};
use emberdb::schema::{FieldRule, Schema};
use emberdb::table::encode_binary;
use emberdb::Database;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(temp: &TempDir) -> DatabaseConfig {
    DatabaseConfig::new(temp.path().join("data"))
}

// =============================================================================
// Save and Reopen
// =============================================================================

#[test]
fn test_reopen_restores_everything() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    let (user_id, doc_id) = {
        let mut db = Database::open(&config).unwrap();
        db.define_table(
            "docs",
            Schema::new()
                .field("title", FieldRule::string().required())
                .field("body", FieldRule::binary().max_size(1024)),
        )
        .unwrap();
        let user = db.insert("users", json!({"name": "A"})).unwrap();
        db.create_index("users", "name").unwrap();
        db.add_foreign_key("docs", "owner", "users", "_id").unwrap();
        let doc = db
            .insert("docs", json!({"title": "t", "owner": user["_id"].clone(), "body": encode_binary(b"hello")}))
            .unwrap();
        (
            user["_id"].as_str().unwrap().to_string(),
            doc["_id"].as_str().unwrap().to_string(),
        )
    };

    let mut db = Database::open(&config).unwrap();
    assert_eq!(db.table_names(), vec!["docs", "users"]);

    let users = db.table("users").unwrap();
    assert_eq!(users.indexed_fields(), vec!["name".to_string()]);
    assert!(users.is_consistent());
    assert!(db.find_by_id("users", &user_id).is_some());

    assert_eq!(db.read_binary("docs", &doc_id, "body").unwrap(), b"hello".to_vec());

    // Constraints survive the restart
    assert_eq!(db.insert("docs", json!({"owner": user_id})).unwrap_err().code(), "EMBER_VALIDATION");
    assert_eq!(
        db.insert("docs", json!({"title": "x", "owner": "ghost"})).unwrap_err().code(),
        "EMBER_FOREIGN_KEY"
    );
    assert_eq!(
        db.insert("docs", json!({"title": "x", "body": vec![0u8; 2000]})).unwrap_err().code(),
        "EMBER_SIZE_LIMIT"
    );
}

#[test]
fn test_every_mutation_is_saved() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    let store = JsonFileStore::new(config.snapshot_path());

    let mut db = Database::open(&config).unwrap();
    db.insert("t", json!({"v": 1})).unwrap();
    assert_eq!(store.load().unwrap().unwrap().record_count(), 1);

    db.update("t", &json!({"v": 1}), &json!({"v": 2})).unwrap();
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.tables["t"].records[0]["v"], 2);

    db.delete("t", &json!({})).unwrap();
    assert_eq!(store.load().unwrap().unwrap().record_count(), 0);
}

#[test]
fn test_failed_write_is_not_saved() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);

    let mut db = Database::open(&config).unwrap();
    db.define_table("t", Schema::new().field("v", FieldRule::number().required()))
        .unwrap();
    db.insert("t", json!({"v": 1})).unwrap();
    let before = fs::read_to_string(config.snapshot_path()).unwrap();

    assert!(db.insert("t", json!({"v": "no"})).is_err());
    assert_eq!(fs::read_to_string(config.snapshot_path()).unwrap(), before);
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corrupted_snapshot_is_refused() {
    let temp = TempDir::new().unwrap();
    let config = config(&temp);
    {
        let mut db = Database::open(&config).unwrap();
        db.insert("t", json!({"secret": 1234})).unwrap();
    }

    let path = config.snapshot_path();
    let text = fs::read_to_string(&path).unwrap();
    assert!(unseal(&text).is_ok());
    fs::write(&path, text.replace("1234", "4321")).unwrap();

    let err = Database::open(&config).unwrap_err();
    assert_eq!(err.code(), "EMBER_PERSISTENCE");
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_open_from_config_file() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("db");
    let config_path = temp.path().join("emberdb.config.json");
    fs::write(
        &config_path,
        json!({"data_dir": data_dir, "max_binary_size": 8, "log_level": "error"}).to_string(),
    )
    .unwrap();

    let mut db = Database::open_config_file(&config_path).unwrap();
    db.define_table("f", Schema::new().field("b", FieldRule::binary())).unwrap();
    assert_eq!(db.insert("f", json!({"b": vec![1u8; 9]})).unwrap_err().code(), "EMBER_SIZE_LIMIT");
    assert!(data_dir.join("emberdb.json").exists());

    emberdb::observability::Logger::set_min_severity(emberdb::observability::Severity::Info);
}

#[test]
fn test_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("bad.json");
    fs::write(&config_path, r#"{"data_dir": "x", "max_binary_size": 0}"#).unwrap();

    let err = Database::open_config_file(&config_path).unwrap_err();
    assert_eq!(err.code(), "EMBER_CONFIG_INVALID");

    let err = Database::open_config_file(&temp.path().join("missing.json")).unwrap_err();
    assert_eq!(err.code(), "EMBER_CONFIG_UNREADABLE");
}
