//! Index Consistency Tests
//!
//! After any sequence of insert/update/delete, every index holds exactly
//! the positions of the records carrying each key, and indexed lookups
//! agree with full scans.

use emberdb::index::{IndexKey, IndexManager};
use emberdb::query::Query;
use emberdb::table::{NoTables, Table};
use serde_json::{json, Map, Value};

// =============================================================================
// Helper Functions
// =============================================================================

/// Deterministic pseudo-random sequence
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn value_for(n: u64) -> Value {
    match n % 5 {
        0 => json!(n % 7),
        1 => json!((n % 7) as f64),
        2 => json!(format!("s{}", n % 3)),
        3 => Value::Null,
        _ => json!([n]),
    }
}

fn scan(table: &Table, field: &str, value: &Value) -> Vec<Value> {
    table
        .records()
        .iter()
        .filter(|r| match (r.get(field), value) {
            (Some(v), want) => emberdb::query::values_equal(v, want),
            _ => false,
        })
        .cloned()
        .map(Value::Object)
        .collect()
}

// =============================================================================
// Randomized Sequences
// =============================================================================

#[test]
fn test_consistent_after_mixed_operations() {
    let mut table = Table::in_memory("mixed");
    table.create_index("k");
    table.create_index("tag");
    let mut rng = Lcg(42);

    for step in 0..400 {
        match rng.below(10) {
            0..=4 => {
                let doc = json!({"k": value_for(rng.below(100)), "tag": format!("t{}", rng.below(4))});
                table.insert(doc, &NoTables).unwrap();
            }
            5..=7 => {
                let query = Query::all().eq("tag", json!(format!("t{}", rng.below(4))));
                let patch = json!({"k": value_for(rng.below(100))});
                table.update_one(&query, &patch).unwrap();
            }
            _ => {
                let query = Query::all().eq("k", value_for(rng.below(100)));
                table.delete_one(&query);
            }
        }
        assert!(table.is_consistent(), "inconsistent after step {}", step);
    }

    for n in 0..20 {
        let value = value_for(n);
        if IndexKey::from_json(&value).is_none() {
            continue;
        }
        let indexed = table.find(&Query::all().eq("k", value.clone()));
        assert_eq!(indexed, scan(&table, "k", &value), "lookup of {}", value);
    }
}

/// Index created after the data matches one maintained incrementally.
#[test]
fn test_late_index_matches_incremental() {
    let mut early = Table::in_memory("early");
    early.create_index("k");
    let mut late = Table::in_memory("late");

    for i in 0..50u64 {
        let doc = json!({"k": value_for(i)});
        early.insert(doc.clone(), &NoTables).unwrap();
        late.insert(doc, &NoTables).unwrap();
    }
    late.create_index("k");

    for n in 0..10 {
        let query = Query::all().eq("k", value_for(n));
        assert_eq!(early.find(&query).len(), late.find(&query).len());
    }
    assert!(early.is_consistent());
    assert!(late.is_consistent());
}

/// Integers beyond f64 precision: indexed and unindexed tables agree.
#[test]
fn test_large_numbers_index_agrees_with_scan() {
    let values = [
        json!(9_007_199_254_740_992_i64),
        json!(9_007_199_254_740_993_i64),
        json!(9_007_199_254_740_992.0),
        json!(-9_223_372_036_854_775_808_i64),
        json!(9_223_372_036_854_775_808_u64),
        json!(u64::MAX),
        json!(u64::MAX - 1),
        json!(1.8446744073709552e19),
        json!(0.5),
    ];

    let mut indexed = Table::in_memory("indexed");
    indexed.create_index("n");
    let mut plain = Table::in_memory("plain");
    for value in &values {
        indexed.insert(json!({"n": value}), &NoTables).unwrap();
        plain.insert(json!({"n": value}), &NoTables).unwrap();
    }

    for value in &values {
        let query = Query::all().eq("n", value.clone());
        assert_eq!(
            indexed.count(&query),
            plain.count(&query),
            "count of {}",
            value
        );
        assert_eq!(indexed.find(&query).len(), scan(&plain, "n", value).len(), "find of {}", value);
    }

    let near = Query::all().eq("n", json!(9_007_199_254_740_992.0));
    assert_eq!(indexed.count(&near), 2);
    assert!(indexed.is_consistent());
}

// =============================================================================
// Index Manager
// =============================================================================

#[test]
fn test_manager_normalizes_numbers() {
    let records: Vec<Map<String, Value>> = [json!({"_id": "a", "v": 40}), json!({"_id": "b", "v": 40.0})]
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect();

    let mut manager = IndexManager::new();
    manager.rebuild(&records);
    assert!(manager.create_index("v", &records));

    assert_eq!(manager.lookup_eq("v", &json!(40)), Some(vec![0, 1]));
    assert_eq!(manager.lookup_eq("v", &json!([40])), None);
    assert_eq!(manager.lookup_eq("_id", &json!("b")), Some(vec![1]));
    assert!(manager.is_consistent(&records));
}
