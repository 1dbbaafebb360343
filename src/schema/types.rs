//! Schema type definitions
//!
//! A schema is a table of per-field rules. Serialized form:
//!
//! ```json
//! {
//!   "name":  {"type": "string", "required": true, "minLength": 1},
//!   "age":   {"type": "number", "min": 0},
//!   "photo": {"type": "binary", "maxSize": 1048576}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Supported field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Any JSON number
    Number,
    /// Boolean
    Boolean,
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// RFC 3339 timestamp or `YYYY-MM-DD` string
    Date,
    /// Raw bytes, stored through the blob store
    Binary,
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Date => "date",
            FieldType::Binary => "binary",
        }
    }
}

/// Rules for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    /// Field data type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether field must be present and non-null
    #[serde(default)]
    pub required: bool,
    /// Inclusive numeric lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum string/array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string/array length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Regular expression a string value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Binary payload limit in bytes; overrides the store-wide default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

impl FieldRule {
    /// Optional field of the given type with no further rules
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            enum_values: None,
            max_size: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn binary() -> Self {
        Self::new(FieldType::Binary)
    }

    /// Mark the field required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set numeric bounds
    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set length bounds
    pub fn length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Set a regex the value must match
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Restrict to a set of values
    pub fn one_of(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Set the binary payload limit
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }
}

/// Per-table schema: field name to rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldRule>,
}

impl Schema {
    /// Empty schema (every document valid)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field rule
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    /// Rule for one field
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.get(name)
    }

    /// All rules in field-name order
    pub fn rules(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fields declared `binary`
    pub fn binary_fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.rules()
            .filter(|(_, rule)| rule.field_type == FieldType::Binary)
    }

    /// Whether `name` is declared `binary`
    pub fn is_binary(&self, name: &str) -> bool {
        self.rule(name)
            .map(|r| r.field_type == FieldType::Binary)
            .unwrap_or(false)
    }

    pub fn has_binary_fields(&self) -> bool {
        self.binary_fields().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_from_json() {
        let schema: Schema = serde_json::from_value(json!({
            "name": {"type": "string", "required": true, "minLength": 1},
            "role": {"type": "string", "enum": ["admin", "user"]},
            "avatar": {"type": "binary", "maxSize": 100}
        }))
        .unwrap();

        let name = schema.rule("name").unwrap();
        assert!(name.required);
        assert_eq!(name.min_length, Some(1));
        assert_eq!(
            schema.rule("role").unwrap().enum_values,
            Some(vec![json!("admin"), json!("user")])
        );
        assert_eq!(schema.rule("avatar").unwrap().max_size, Some(100));
        assert!(schema.is_binary("avatar"));
        assert!(!schema.is_binary("name"));
    }

    #[test]
    fn test_binary_fields() {
        let schema = Schema::new()
            .field("doc", FieldRule::binary())
            .field("title", FieldRule::string())
            .field("thumb", FieldRule::binary().max_size(10));

        let names: Vec<&str> = schema.binary_fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["doc", "thumb"]);
        assert!(schema.has_binary_fields());
        assert!(!Schema::new().has_binary_fields());
    }

    #[test]
    fn test_serialization_skips_unset_rules() {
        let schema = Schema::new().field("age", FieldRule::number());
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value, json!({"age": {"type": "number", "required": false}}));
    }

    #[test]
    fn test_field_type_names() {
        assert_eq!(FieldType::String.type_name(), "string");
        assert_eq!(FieldType::Number.type_name(), "number");
        assert_eq!(FieldType::Date.type_name(), "date");
        assert_eq!(FieldType::Binary.type_name(), "binary");
    }
}
