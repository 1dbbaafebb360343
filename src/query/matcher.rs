//! Predicate evaluation
//!
//! Pure function of (record, query). AND across fields and across the
//! operators of one operator object. No type coercion beyond numeric
//! equality by value.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::ast::{Condition, FieldPredicate, Operator, Query};
use super::compare::{compare_ordered, values_equal};

/// Evaluates queries against records
pub struct Matcher;

impl Matcher {
    /// Checks if a record matches every predicate of the query
    pub fn matches(record: &Map<String, Value>, query: &Query) -> bool {
        query
            .predicates()
            .iter()
            .all(|pred| Self::matches_predicate(record, pred))
    }

    /// Same as [`Matcher::matches`] for an arbitrary JSON value.
    ///
    /// A non-object only matches the empty query.
    pub fn matches_value(value: &Value, query: &Query) -> bool {
        match value {
            Value::Object(record) => Self::matches(record, query),
            _ => query.is_empty(),
        }
    }

    fn matches_predicate(record: &Map<String, Value>, predicate: &FieldPredicate) -> bool {
        let field_value = record.get(&predicate.field);

        match &predicate.condition {
            Condition::Equals(expected) => field_value
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false),
            Condition::Operators(ops) => ops.iter().all(|op| Self::eval(field_value, op)),
        }
    }

    fn eval(field_value: Option<&Value>, op: &Operator) -> bool {
        match op {
            Operator::Gt(bound) => Self::ordered(field_value, bound, |o| o == Ordering::Greater),
            Operator::Gte(bound) => Self::ordered(field_value, bound, |o| o != Ordering::Less),
            Operator::Lt(bound) => Self::ordered(field_value, bound, |o| o == Ordering::Less),
            Operator::Lte(bound) => Self::ordered(field_value, bound, |o| o != Ordering::Greater),
            Operator::Ne(other) => field_value
                .map(|actual| !values_equal(actual, other))
                .unwrap_or(true),
            Operator::In(values) => field_value
                .map(|actual| values.iter().any(|v| values_equal(actual, v)))
                .unwrap_or(false),
            Operator::Nin(values) => field_value
                .map(|actual| !values.iter().any(|v| values_equal(actual, v)))
                .unwrap_or(true),
            Operator::Exists(expected) => field_value.is_some() == *expected,
            Operator::Regex(re) => field_value
                .and_then(Value::as_str)
                .map(|s| re.is_match(s))
                .unwrap_or(false),
            // Fail closed
            Operator::Invalid(_) => false,
        }
    }

    fn ordered<F>(field_value: Option<&Value>, bound: &Value, accept: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        field_value
            .and_then(|actual| compare_ordered(actual, bound))
            .map(accept)
            .unwrap_or(false)
    }
}
