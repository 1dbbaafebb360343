//! `$group` partitioning and accumulators

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use super::stage::{AccumulatorOp, GroupKey, GroupSpec, SumSource};
use crate::index::IndexKey;
use crate::query::compare_total;

/// Partition `records` by the group key and compute accumulators.
///
/// Groups appear in order of first appearance. Each output carries `_id`,
/// `count` and `items` (members in input order) plus one field per
/// accumulator.
pub(crate) fn group(records: Vec<Value>, spec: &GroupSpec) -> Vec<Value> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();

    for record in records {
        let key = match &spec.key {
            GroupKey::Field(field) => record.get(field).cloned().unwrap_or(Value::Null),
            GroupKey::Computed(f) => (**f)(&record),
        };
        let slot = *slots.entry(identity(&key)).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }

    groups
        .into_iter()
        .map(|(key, items)| {
            let mut out = Map::new();
            for acc in &spec.accumulators {
                out.insert(acc.name.clone(), accumulate(&acc.op, &items));
            }
            out.insert("_id".to_string(), key);
            out.insert("count".to_string(), Value::from(items.len()));
            out.insert("items".to_string(), Value::Array(items));
            Value::Object(out)
        })
        .collect()
}

/// Grouping identity: numerically equal keys share a group
fn identity(key: &Value) -> String {
    match IndexKey::from_json(key) {
        Some(k) => format!("{:?}", k),
        None => format!("json:{}", key),
    }
}

fn accumulate(op: &AccumulatorOp, items: &[Value]) -> Value {
    match op {
        AccumulatorOp::Count => Value::from(items.len()),
        AccumulatorOp::Sum(SumSource::Constant(c)) => number(c * items.len() as f64),
        AccumulatorOp::Sum(SumSource::Field(field)) => sum(numbers(items, field)),
        AccumulatorOp::Avg(field) => {
            let values: Vec<&Number> = numbers(items, field).collect();
            if values.is_empty() {
                return Value::Null;
            }
            let total: f64 = values.iter().filter_map(|n| n.as_f64()).sum();
            number(total / values.len() as f64)
        }
        AccumulatorOp::Min(field) => extreme(items, field, |a, b| compare_total(a, b).is_lt()),
        AccumulatorOp::Max(field) => extreme(items, field, |a, b| compare_total(a, b).is_gt()),
    }
}

fn numbers<'a>(items: &'a [Value], field: &'a str) -> impl Iterator<Item = &'a Number> + 'a {
    items.iter().filter_map(move |item| match item.get(field) {
        Some(Value::Number(n)) => Some(n),
        _ => None,
    })
}

/// Integer sum while every addend is an integer, float otherwise
fn sum<'a>(values: impl Iterator<Item = &'a Number>) -> Value {
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    for n in values {
        int_total = match (int_total, n.as_i64()) {
            (Some(acc), Some(v)) => acc.checked_add(v),
            _ => None,
        };
        float_total += n.as_f64().unwrap_or(0.0);
    }
    match int_total {
        Some(total) => Value::from(total),
        None => number(float_total),
    }
}

fn extreme<F>(items: &[Value], field: &str, better: F) -> Value
where
    F: Fn(Option<&Value>, Option<&Value>) -> bool,
{
    let mut best: Option<&Value> = None;
    for value in items.iter().filter_map(|item| item.get(field)) {
        if value.is_null() {
            continue;
        }
        if best.is_none() || better(Some(value), best) {
            best = Some(value);
        }
    }
    best.cloned().unwrap_or(Value::Null)
}

/// Float as JSON, integral values as integers
fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        return Value::from(v as i64);
    }
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> Vec<Value> {
        vec![
            json!({"city": "Paris", "amount": 10}),
            json!({"city": "Lyon", "amount": 5}),
            json!({"city": "Paris", "amount": 2.5}),
            json!({"city": "Paris"}),
            json!({"amount": 1}),
        ]
    }

    #[test]
    fn test_groups_in_first_appearance_order() {
        let out = group(orders(), &GroupSpec::by_field("city"));
        let ids: Vec<&Value> = out.iter().map(|g| &g["_id"]).collect();
        assert_eq!(ids, vec![&json!("Paris"), &json!("Lyon"), &Value::Null]);
        assert_eq!(out[0]["count"], json!(3));
        assert_eq!(out[0]["items"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_accumulators() {
        let spec = GroupSpec::by_field("city")
            .accumulate("total", AccumulatorOp::Sum(SumSource::Field("amount".into())))
            .accumulate("n", AccumulatorOp::Sum(SumSource::Constant(1.0)))
            .accumulate("avg", AccumulatorOp::Avg("amount".into()))
            .accumulate("lo", AccumulatorOp::Min("amount".into()))
            .accumulate("hi", AccumulatorOp::Max("amount".into()))
            .accumulate("c", AccumulatorOp::Count);
        let out = group(orders(), &spec);

        let paris = &out[0];
        assert_eq!(paris["total"], json!(12.5));
        assert_eq!(paris["n"], json!(3));
        assert_eq!(paris["avg"], json!(6.25));
        assert_eq!(paris["lo"], json!(2.5));
        assert_eq!(paris["hi"], json!(10));
        assert_eq!(paris["c"], json!(3));

        let lyon = &out[1];
        assert_eq!(lyon["total"], json!(5));
    }

    #[test]
    fn test_empty_accumulators_are_null() {
        let spec = GroupSpec::by_field("city")
            .accumulate("avg", AccumulatorOp::Avg("missing".into()))
            .accumulate("lo", AccumulatorOp::Min("missing".into()))
            .accumulate("total", AccumulatorOp::Sum(SumSource::Field("missing".into())));
        let out = group(orders(), &spec);
        assert_eq!(out[0]["avg"], Value::Null);
        assert_eq!(out[0]["lo"], Value::Null);
        assert_eq!(out[0]["total"], json!(0));
    }

    #[test]
    fn test_numeric_keys_share_group() {
        let records = vec![json!({"k": 1}), json!({"k": 1.0}), json!({"k": "1"})];
        let out = group(records, &GroupSpec::by_field("k"));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["count"], json!(2));
    }

    #[test]
    fn test_computed_key() {
        let spec = GroupSpec::by(|r| json!(r["amount"].as_f64().unwrap_or(0.0) >= 5.0));
        let out = group(orders(), &spec);
        assert_eq!(out[0]["_id"], json!(true));
        assert_eq!(out[0]["count"], json!(2));
        assert_eq!(out[1]["count"], json!(3));
    }
}
