//! Pipeline stage definitions
//!
//! Stages are parsed once from JSON into [`Stage`] variants:
//!
//! ```json
//! [
//!   {"$match": {"status": "active"}},
//!   {"$sort": {"age": -1}},
//!   {"$skip": 10},
//!   {"$limit": 5},
//!   {"$group": {"_id": "$city", "total": {"$sum": "$amount"}, "n": {"$count": {}}}}
//! ]
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::query::{json_type_name, Query, QueryError, QueryResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort specification: one field, one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Key function supplied in code for `$group`
pub type KeyFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// How `$group` partitions records
#[derive(Clone)]
pub enum GroupKey {
    /// Value of a named field (missing reads as null)
    Field(String),
    /// Result of a caller-supplied function
    Computed(KeyFn),
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Field(name) => f.debug_tuple("Field").field(name).finish(),
            GroupKey::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// Operand of `$sum`
#[derive(Debug, Clone, PartialEq)]
pub enum SumSource {
    /// Sum a field's numeric values
    Field(String),
    /// Add a constant per member (`{"$sum": 1}` counts)
    Constant(f64),
}

/// Accumulator applied within each partition
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorOp {
    Sum(SumSource),
    Avg(String),
    Min(String),
    Max(String),
    Count,
}

/// Named accumulator output
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub name: String,
    pub op: AccumulatorOp,
}

/// `$group` stage specification
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub key: GroupKey,
    pub accumulators: Vec<Accumulator>,
}

impl GroupSpec {
    /// Group by a field's value
    pub fn by_field(field: impl Into<String>) -> Self {
        Self {
            key: GroupKey::Field(field.into()),
            accumulators: Vec::new(),
        }
    }

    /// Group by the result of `key`
    pub fn by<F>(key: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            key: GroupKey::Computed(Arc::new(key)),
            accumulators: Vec::new(),
        }
    }

    /// Add an accumulator
    pub fn accumulate(mut self, name: impl Into<String>, op: AccumulatorOp) -> Self {
        self.accumulators.push(Accumulator {
            name: name.into(),
            op,
        });
        self
    }
}

/// One pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Query),
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
    Group(GroupSpec),
    /// No recognized operator; skipped at execution
    Unknown(String),
}

const STAGE_NAMES: [&str; 5] = ["$match", "$sort", "$skip", "$limit", "$group"];

impl Stage {
    /// Parse one stage object.
    ///
    /// An object with no recognized key becomes [`Stage::Unknown`]. More
    /// than one recognized key, or a malformed operand, is an error.
    pub fn from_json(value: &Value) -> QueryResult<Stage> {
        let Some(map) = value.as_object() else {
            return Err(invalid(format!(
                "stage must be an object, found {}",
                json_type_name(value)
            )));
        };

        let mut recognized = map.iter().filter(|(k, _)| STAGE_NAMES.contains(&k.as_str()));
        let Some((name, operand)) = recognized.next() else {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            return Ok(Stage::Unknown(keys.join(",")));
        };
        if let Some((other, _)) = recognized.next() {
            return Err(invalid(format!("stage combines {} and {}", name, other)));
        }

        match name.as_str() {
            "$match" => Ok(Stage::Match(
                Query::from_json(operand).map_err(|e| invalid(e.to_string()))?,
            )),
            "$sort" => parse_sort(operand).map(Stage::Sort),
            "$skip" => parse_count("$skip", operand).map(Stage::Skip),
            "$limit" => parse_count("$limit", operand).map(Stage::Limit),
            _ => parse_group(operand).map(Stage::Group),
        }
    }

    /// Returns the stage name for diagnostics
    pub fn name(&self) -> &str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Group(_) => "$group",
            Stage::Unknown(keys) => keys.as_str(),
        }
    }
}

fn invalid(reason: impl Into<String>) -> QueryError {
    QueryError::InvalidPipeline(reason.into())
}

fn field_ref(value: &Value) -> Option<String> {
    let s = value.as_str()?;
    let name = s.strip_prefix('$').unwrap_or(s);
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

fn parse_sort(operand: &Value) -> QueryResult<SortSpec> {
    let map = operand
        .as_object()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| invalid("$sort takes exactly one field"))?;

    let (field, dir) = map.iter().next().ok_or_else(|| invalid("$sort is empty"))?;
    match dir.as_f64() {
        Some(d) if d == 1.0 => Ok(SortSpec::asc(field.clone())),
        Some(d) if d == -1.0 => Ok(SortSpec::desc(field.clone())),
        _ => Err(invalid(format!("$sort direction for {} must be 1 or -1", field))),
    }
}

fn parse_count(name: &str, operand: &Value) -> QueryResult<usize> {
    operand
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(format!("{} requires a non-negative integer", name)))
}

/// Fields every group output carries besides `_id`
const RESERVED_GROUP_FIELDS: [&str; 2] = ["count", "items"];

fn parse_group(operand: &Value) -> QueryResult<GroupSpec> {
    let map = operand
        .as_object()
        .ok_or_else(|| invalid("$group requires an object"))?;

    let key = map
        .get("_id")
        .and_then(field_ref)
        .ok_or_else(|| invalid("$group requires an _id field name"))?;

    let mut spec = GroupSpec::by_field(key);
    for (name, acc) in map.iter().filter(|(k, _)| k.as_str() != "_id") {
        if RESERVED_GROUP_FIELDS.contains(&name.as_str()) {
            return Err(invalid(format!("accumulator name {} is reserved", name)));
        }
        spec = spec.accumulate(name.clone(), parse_accumulator(name, acc)?);
    }
    Ok(spec)
}

fn parse_accumulator(name: &str, value: &Value) -> QueryResult<AccumulatorOp> {
    let map: &Map<String, Value> = value
        .as_object()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| invalid(format!("accumulator {} takes exactly one operator", name)))?;
    let (op, operand) = map
        .iter()
        .next()
        .ok_or_else(|| invalid(format!("accumulator {} is empty", name)))?;

    let field = || {
        field_ref(operand).ok_or_else(|| invalid(format!("{} in {} requires a field", op, name)))
    };

    match op.as_str() {
        "$sum" => match operand.as_f64() {
            Some(c) => Ok(AccumulatorOp::Sum(SumSource::Constant(c))),
            None => Ok(AccumulatorOp::Sum(SumSource::Field(field()?))),
        },
        "$avg" => Ok(AccumulatorOp::Avg(field()?)),
        "$min" => Ok(AccumulatorOp::Min(field()?)),
        "$max" => Ok(AccumulatorOp::Max(field()?)),
        "$count" => Ok(AccumulatorOp::Count),
        other => Err(invalid(format!("unknown accumulator {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_stages() {
        assert!(matches!(Stage::from_json(&json!({"$skip": 2})).unwrap(), Stage::Skip(2)));
        assert!(matches!(Stage::from_json(&json!({"$limit": 0})).unwrap(), Stage::Limit(0)));
        match Stage::from_json(&json!({"$sort": {"age": -1}})).unwrap() {
            Stage::Sort(spec) => assert_eq!(spec, SortSpec::desc("age")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            Stage::from_json(&json!({"$match": {"a": 1}})).unwrap(),
            Stage::Match(_)
        ));
    }

    #[test]
    fn test_unknown_stage() {
        match Stage::from_json(&json!({"$project": {"a": 1}})).unwrap() {
            Stage::Unknown(keys) => assert_eq!(keys, "$project"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_stages_rejected() {
        for bad in [
            json!({"$skip": -1}),
            json!({"$limit": "3"}),
            json!({"$sort": {"a": 2}}),
            json!({"$sort": {"a": 1, "b": 1}}),
            json!({"$match": 5}),
            json!({"$skip": 1, "$limit": 2}),
            json!({"$group": {"total": {"$sum": "$x"}}}),
            json!({"$group": {"_id": "$k", "t": {"$median": "$x"}}}),
            json!({"$group": {"_id": "$k", "count": {"$sum": 1}}}),
            json!({"$group": {"_id": "$k", "items": {"$max": "$x"}}}),
            json!(3),
        ] {
            let err = Stage::from_json(&bad).unwrap_err();
            assert_eq!(err.code(), "EMBER_INVALID_PIPELINE", "{}", bad);
        }
    }

    #[test]
    fn test_parse_group() {
        let stage = Stage::from_json(&json!({"$group": {
            "_id": "$city",
            "total": {"$sum": "$amount"},
            "n": {"$sum": 1},
            "avg": {"$avg": "amount"},
            "lo": {"$min": "$amount"},
            "hi": {"$max": "$amount"},
            "c": {"$count": {}}
        }}))
        .unwrap();

        let Stage::Group(spec) = stage else {
            panic!("expected group");
        };
        assert!(matches!(&spec.key, GroupKey::Field(f) if f == "city"));

        let op = |name: &str| {
            spec.accumulators
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.op.clone())
                .unwrap()
        };
        assert_eq!(op("total"), AccumulatorOp::Sum(SumSource::Field("amount".into())));
        assert_eq!(op("n"), AccumulatorOp::Sum(SumSource::Constant(1.0)));
        assert_eq!(op("avg"), AccumulatorOp::Avg("amount".into()));
        assert_eq!(op("lo"), AccumulatorOp::Min("amount".into()));
        assert_eq!(op("hi"), AccumulatorOp::Max("amount".into()));
        assert_eq!(op("c"), AccumulatorOp::Count);
    }
}
