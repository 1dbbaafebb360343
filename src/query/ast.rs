//! Query AST
//!
//! A query is a JSON object mapping field names to either a literal
//! (equality) or an operator object:
//!
//! ```json
//! {"name": "Ann", "age": {"$gte": 18, "$lt": 65}, "email": {"$exists": true}}
//! ```
//!
//! An object value is an operator object as soon as one of its keys starts
//! with `$`. Operators that are unknown or carry a malformed operand parse
//! to [`Operator::Invalid`] and never match.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::errors::{QueryError, QueryResult};

/// One operator inside an operator object
#[derive(Debug, Clone)]
pub enum Operator {
    /// field > value
    Gt(Value),
    /// field >= value
    Gte(Value),
    /// field < value
    Lt(Value),
    /// field <= value
    Lte(Value),
    /// field != value (missing fields match)
    Ne(Value),
    /// field is one of values
    In(Vec<Value>),
    /// field is none of values (missing fields match)
    Nin(Vec<Value>),
    /// field presence equals operand
    Exists(bool),
    /// string field matches pattern
    Regex(Regex),
    /// Unknown operator or malformed operand
    Invalid(String),
}

impl Operator {
    /// Returns the operator name for diagnostics
    pub fn op_name(&self) -> &'static str {
        match self {
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::Ne(_) => "$ne",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Exists(_) => "$exists",
            Operator::Regex(_) => "$regex",
            Operator::Invalid(_) => "invalid",
        }
    }

    fn parse(name: &str, operand: &Value, options: Option<&Value>) -> Operator {
        match name {
            "$gt" => Operator::Gt(operand.clone()),
            "$gte" => Operator::Gte(operand.clone()),
            "$lt" => Operator::Lt(operand.clone()),
            "$lte" => Operator::Lte(operand.clone()),
            "$ne" => Operator::Ne(operand.clone()),
            "$in" | "$nin" => match operand.as_array() {
                Some(values) if name == "$in" => Operator::In(values.clone()),
                Some(values) => Operator::Nin(values.clone()),
                None => Operator::Invalid(format!("{} requires an array", name)),
            },
            "$exists" => match operand.as_bool() {
                Some(b) => Operator::Exists(b),
                None => Operator::Invalid("$exists requires a boolean".into()),
            },
            "$regex" => Self::parse_regex(operand, options),
            other => Operator::Invalid(format!("unknown operator {}", other)),
        }
    }

    fn parse_regex(pattern: &Value, options: Option<&Value>) -> Operator {
        let Some(pattern) = pattern.as_str() else {
            return Operator::Invalid("$regex requires a string".into());
        };

        let mut builder = RegexBuilder::new(pattern);
        if let Some(options) = options {
            let Some(flags) = options.as_str() else {
                return Operator::Invalid("$options requires a string".into());
            };
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    'm' => builder.multi_line(true),
                    's' => builder.dot_matches_new_line(true),
                    'x' => builder.ignore_whitespace(true),
                    other => return Operator::Invalid(format!("unknown regex option {}", other)),
                };
            }
        }

        match builder.build() {
            Ok(re) => Operator::Regex(re),
            Err(e) => Operator::Invalid(format!("invalid regex: {}", e)),
        }
    }
}

/// What a field must satisfy
#[derive(Debug, Clone)]
pub enum Condition {
    /// Plain literal: field equals value
    Equals(Value),
    /// Operator object: every operator must hold
    Operators(Vec<Operator>),
}

impl Condition {
    fn parse(value: &Value) -> Condition {
        match value {
            Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
                Condition::Operators(Self::parse_operators(map))
            }
            literal => Condition::Equals(literal.clone()),
        }
    }

    fn parse_operators(map: &Map<String, Value>) -> Vec<Operator> {
        let options = map.get("$options");
        let mut ops = Vec::with_capacity(map.len());

        for (name, operand) in map {
            if name == "$options" {
                if !map.contains_key("$regex") {
                    ops.push(Operator::Invalid("$options without $regex".into()));
                }
                continue;
            }
            ops.push(Operator::parse(name, operand, options));
        }

        ops
    }

    /// Returns true if this is a plain equality
    pub fn is_equality(&self) -> bool {
        matches!(self, Condition::Equals(_))
    }
}

/// A single field predicate
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    /// Field name
    pub field: String,
    /// What the field must satisfy
    pub condition: Condition,
}

impl FieldPredicate {
    /// Equality value if this predicate is a plain equality
    pub fn equality_value(&self) -> Option<&Value> {
        match &self.condition {
            Condition::Equals(v) => Some(v),
            Condition::Operators(_) => None,
        }
    }
}

/// A parsed query: AND across all predicates
#[derive(Debug, Clone, Default)]
pub struct Query {
    predicates: Vec<FieldPredicate>,
}

impl Query {
    /// Query that matches every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a JSON query.
    ///
    /// `null` is accepted as the empty query. Any other non-object is an
    /// error.
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(Self::all()),
            Value::Object(map) => Ok(Self {
                predicates: map
                    .iter()
                    .map(|(field, v)| FieldPredicate {
                        field: field.clone(),
                        condition: Condition::parse(v),
                    })
                    .collect(),
            }),
            other => Err(QueryError::InvalidQuery(format!(
                "expected an object, found {}",
                json_type_name(other)
            ))),
        }
    }

    /// Add an equality predicate
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(FieldPredicate {
            field: field.into(),
            condition: Condition::Equals(value),
        });
        self
    }

    /// Add an operator predicate
    pub fn with(mut self, field: impl Into<String>, operators: Vec<Operator>) -> Self {
        self.predicates.push(FieldPredicate {
            field: field.into(),
            condition: Condition::Operators(operators),
        });
        self
    }

    pub fn predicates(&self) -> &[FieldPredicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// The equality predicate usable for an index lookup.
    ///
    /// Returns `Some` only when exactly one predicate targets a field for
    /// which `is_indexed` holds and that predicate is a plain equality.
    pub fn index_candidate<F>(&self, is_indexed: F) -> Option<(&str, &Value)>
    where
        F: Fn(&str) -> bool,
    {
        let mut indexed = self.predicates.iter().filter(|p| is_indexed(&p.field));
        let first = indexed.next()?;
        if indexed.next().is_some() {
            return None;
        }
        first.equality_value().map(|v| (first.field.as_str(), v))
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
