//! Document validation against a schema
//!
//! Every rule of every declared field is checked and all violations are
//! returned; an empty list means the document is valid. Undeclared fields
//! are accepted as-is. A null value counts as absent.

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};

use super::types::{FieldRule, FieldType, Schema};

/// Validates documents against one schema.
///
/// The validator does not mutate documents.
pub struct SchemaValidator<'a> {
    schema: &'a Schema,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Returns one human-readable message per violated rule
    pub fn validate(&self, document: &Map<String, Value>) -> Vec<String> {
        let mut violations = Vec::new();

        for (field, rule) in self.schema.rules() {
            match document.get(field) {
                None | Some(Value::Null) => {
                    if rule.required {
                        violations.push(format!("{} is required", field));
                    }
                }
                Some(value) => check_field(field, rule, value, &mut violations),
            }
        }

        violations
    }
}

fn check_field(field: &str, rule: &FieldRule, value: &Value, violations: &mut Vec<String>) {
    if !type_matches(rule.field_type, value) {
        violations.push(format!(
            "{} must be of type {}",
            field,
            rule.field_type.type_name()
        ));
        // Remaining rules assume the declared type
        return;
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = rule.min {
            if n < min {
                violations.push(format!("{} must be >= {}", field, min));
            }
        }
        if let Some(max) = rule.max {
            if n > max {
                violations.push(format!("{} must be <= {}", field, max));
            }
        }
    }

    let length = match (rule.field_type, value) {
        (FieldType::Binary, _) => None,
        (_, Value::String(s)) => Some(s.chars().count()),
        (_, Value::Array(a)) => Some(a.len()),
        _ => None,
    };
    if let Some(len) = length {
        if let Some(min_len) = rule.min_length {
            if len < min_len {
                violations.push(format!("{} length must be >= {}", field, min_len));
            }
        }
        if let Some(max_len) = rule.max_length {
            if len > max_len {
                violations.push(format!("{} length must be <= {}", field, max_len));
            }
        }
    }

    if let (Some(pattern), Value::String(s)) = (&rule.pattern, value) {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(s) {
                    violations.push(format!("{} must match pattern {}", field, pattern));
                }
            }
            Err(_) => violations.push(format!("{} has invalid pattern {}", field, pattern)),
        }
    }

    if let Some(allowed) = &rule.enum_values {
        if !allowed.contains(value) {
            let list = serde_json::to_string(allowed).unwrap_or_default();
            violations.push(format!("{} must be one of {}", field, list));
        }
    }
}

fn type_matches(field_type: FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Object => value.is_object(),
        FieldType::Array => value.is_array(),
        FieldType::Date => value.as_str().map(is_date).unwrap_or(false),
        // base64 payload, stored digest, or an array of byte values
        FieldType::Binary => match value {
            Value::String(_) => true,
            Value::Array(items) => items
                .iter()
                .all(|v| v.as_u64().map(|b| b <= u8::MAX as u64).unwrap_or(false)),
            _ => false,
        },
    }
}

fn is_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
