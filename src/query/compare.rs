//! Value comparison rules shared by the matcher, the index and the
//! aggregation engine.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Equality with numbers compared by value (`40 == 40.0`).
///
/// Integers and floats compare exactly, without rounding the integer to
/// f64. Arrays and objects compare element-wise under the same rule.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Whether float `f` holds exactly the integer `i`
fn float_is_integer(f: f64, i: i128) -> bool {
    // Bounds are -2^63 and 2^64, both exact as f64
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < u64::MAX as f64 && f as i128 == i
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    match (as_integer(x), as_integer(y)) {
        (Some(xi), Some(yi)) => xi == yi,
        (Some(i), None) => y.as_f64().map(|f| float_is_integer(f, i)).unwrap_or(false),
        (None, Some(i)) => x.as_f64().map(|f| float_is_integer(f, i)).unwrap_or(false),
        (None, None) => match (x.as_f64(), y.as_f64()) {
            (Some(xf), Some(yf)) => xf == yf,
            _ => false,
        },
    }
}

/// Ordered comparison for `$gt`/`$gte`/`$lt`/`$lte`.
///
/// Only number/number and string/string pairs are comparable; every other
/// pair yields `None`, which the matcher treats as a non-match.
pub fn compare_ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (as_integer(x), as_integer(y)) {
                return Some(xi.cmp(&yi));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total ordering used for sorting and `$min`/`$max`.
///
/// missing = null < bool < number < string < array < object. Within a
/// type, natural ordering; arrays and objects compare equal.
pub fn compare_total(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Number(_)), Some(y @ Value::Number(_))) => {
            compare_ordered(x, y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
