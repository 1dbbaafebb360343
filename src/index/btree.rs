//! BTreeMap-based index structures
//!
//! Each index maps an [`IndexKey`] to the positions of the records holding
//! that value. Positions are always sorted ascending.

use std::collections::BTreeMap;

use serde_json::Value;

/// Record position inside a table's record sequence
pub type Position = usize;

/// Index key representing a scalar field value.
///
/// Ordering is deterministic: Bool < Int < UInt < Float < String.
/// Floats that hold an integer exactly are keyed as that integer, so `40`
/// and `40.0` share a key while `2^53 + 1` and `2^53 as f64` do not. This is
/// the same equality the query engine applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Integer above `i64::MAX`
    UInt(u64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// String value
    String(String),
}

impl IndexKey {
    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_float(v: f64) -> Self {
        // i64::MIN is -2^63 and u64::MAX + 1 is 2^64, both exact as f64
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            return IndexKey::Int(v as i64);
        }
        if v.fract() == 0.0 && v >= i64::MAX as f64 && v < u64::MAX as f64 {
            return IndexKey::UInt(v as u64);
        }
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits // Negative: flip all bits
        } else {
            bits ^ (1 << 63) // Positive: flip sign bit
        };
        IndexKey::Float(ordered)
    }

    /// Create a key from a JSON value.
    ///
    /// Null, arrays and objects are not indexable.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(IndexKey::UInt(u))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            Value::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

/// A single field index
#[derive(Debug, Default, Clone)]
pub struct IndexTree {
    tree: BTreeMap<IndexKey, Vec<Position>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a position for a key, keeping positions sorted.
    pub fn insert(&mut self, key: IndexKey, position: Position) {
        let positions = self.tree.entry(key).or_default();
        match positions.binary_search(&position) {
            Ok(_) => {}
            Err(at) => positions.insert(at, position),
        }
    }

    /// Remove a position for a key.
    ///
    /// If the key has no more positions, removes the key entirely.
    pub fn remove(&mut self, key: &IndexKey, position: Position) {
        if let Some(positions) = self.tree.get_mut(key) {
            if let Ok(at) = positions.binary_search(&position) {
                positions.remove(at);
            }
            if positions.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// All positions for an exact key match, sorted ascending.
    pub fn lookup_eq(&self, key: &IndexKey) -> Vec<Position> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Iterate `(key, positions)` in key order
    pub fn entries(&self) -> impl Iterator<Item = (&IndexKey, &[Position])> {
        self.tree.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Total number of positions
    pub fn position_count(&self) -> usize {
        self.tree.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Bool(false),
            IndexKey::Bool(true),
            IndexKey::Int(-100),
            IndexKey::Int(100),
            IndexKey::from_float(0.5),
            IndexKey::String("aaa".into()),
            IndexKey::String("zzz".into()),
        ];
        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i]);
        }
    }

    #[test]
    fn test_integral_floats_share_int_key() {
        assert_eq!(IndexKey::from_json(&json!(40.0)), Some(IndexKey::Int(40)));
        assert_eq!(IndexKey::from_json(&json!(40)), Some(IndexKey::Int(40)));
        assert_ne!(IndexKey::from_json(&json!(40.5)), Some(IndexKey::Int(40)));
    }

    #[test]
    fn test_large_integers_keyed_exactly() {
        let above_f64 = json!(9_007_199_254_740_993_i64);
        let rounded = json!(9_007_199_254_740_992.0);
        assert_ne!(IndexKey::from_json(&above_f64), IndexKey::from_json(&rounded));
        assert_eq!(
            IndexKey::from_json(&rounded),
            Some(IndexKey::Int(9_007_199_254_740_992))
        );

        assert_eq!(IndexKey::from_json(&json!(u64::MAX)), Some(IndexKey::UInt(u64::MAX)));
        assert_ne!(
            IndexKey::from_json(&json!(u64::MAX - 1)),
            IndexKey::from_json(&json!(u64::MAX))
        );
        assert_eq!(
            IndexKey::from_float(9_223_372_036_854_775_808.0),
            IndexKey::UInt(1 << 63)
        );
        assert!(matches!(IndexKey::from_float(1.8446744073709552e19), IndexKey::Float(_)));
    }

    #[test]
    fn test_unindexable_values() {
        assert_eq!(IndexKey::from_json(&json!(null)), None);
        assert_eq!(IndexKey::from_json(&json!([1, 2])), None);
        assert_eq!(IndexKey::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_positions_sorted() {
        let mut tree = IndexTree::new();
        tree.insert(IndexKey::Int(42), 3);
        tree.insert(IndexKey::Int(42), 1);
        tree.insert(IndexKey::Int(42), 2);
        tree.insert(IndexKey::Int(42), 2);

        assert_eq!(tree.lookup_eq(&IndexKey::Int(42)), vec![1, 2, 3]);
        assert_eq!(tree.position_count(), 3);
    }

    #[test]
    fn test_remove_drops_empty_key() {
        let mut tree = IndexTree::new();
        tree.insert(IndexKey::Int(1), 0);
        tree.insert(IndexKey::Int(1), 4);

        tree.remove(&IndexKey::Int(1), 0);
        assert_eq!(tree.lookup_eq(&IndexKey::Int(1)), vec![4]);

        tree.remove(&IndexKey::Int(1), 4);
        assert_eq!(tree.key_count(), 0);
    }
}
