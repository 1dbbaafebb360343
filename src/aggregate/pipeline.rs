//! Pipeline execution

use serde_json::Value;

use super::group::group;
use super::stage::{SortDirection, SortSpec, Stage};
use crate::observability::{log_event_with_fields, Event};
use crate::query::{compare_total, json_type_name, Matcher, QueryError, QueryResult};

/// Ordered list of stages applied to a record set
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Parse a JSON array of single-key stage objects
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        let stages = value.as_array().ok_or_else(|| {
            QueryError::InvalidPipeline(format!(
                "pipeline must be an array, found {}",
                json_type_name(value)
            ))
        })?;

        let stages = stages.iter().map(Stage::from_json).collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage in order. The input is consumed; table state is
    /// never touched.
    pub fn execute(&self, mut records: Vec<Value>) -> Vec<Value> {
        for stage in &self.stages {
            records = match stage {
                Stage::Match(query) => records
                    .into_iter()
                    .filter(|r| Matcher::matches_value(r, query))
                    .collect(),
                Stage::Sort(spec) => {
                    sort(&mut records, spec);
                    records
                }
                Stage::Skip(n) => records.into_iter().skip(*n).collect(),
                Stage::Limit(n) => {
                    records.truncate(*n);
                    records
                }
                Stage::Group(spec) => group(records, spec),
                Stage::Unknown(keys) => {
                    log_event_with_fields(Event::PipelineStageIgnored, &[("stage", keys.as_str())]);
                    records
                }
            };
        }
        records
    }
}

/// Stable sort on one field; missing and null sort first ascending
fn sort(records: &mut [Value], spec: &SortSpec) {
    records.sort_by(|a, b| {
        let ord = compare_total(a.get(&spec.field), b.get(&spec.field));
        match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::GroupSpec;
    use crate::query::Query;
    use serde_json::json;

    fn people() -> Vec<Value> {
        vec![
            json!({"name": "a", "age": 30, "city": "Paris"}),
            json!({"name": "b", "age": 25, "city": "Lyon"}),
            json!({"name": "c", "age": 30, "city": "Lyon"}),
            json!({"name": "d", "city": "Paris"}),
            json!({"name": "e", "age": 40, "city": "Paris"}),
        ]
    }

    fn names(records: &[Value]) -> Vec<&str> {
        records.iter().map(|r| r["name"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let out = Pipeline::new().execute(people());
        assert_eq!(out, people());
    }

    #[test]
    fn test_sort_is_stable() {
        let out = Pipeline::new().push(Stage::Sort(SortSpec::asc("age"))).execute(people());
        assert_eq!(names(&out), vec!["d", "b", "a", "c", "e"]);

        let out = Pipeline::new().push(Stage::Sort(SortSpec::desc("age"))).execute(people());
        assert_eq!(names(&out), vec!["e", "a", "c", "b", "d"]);
    }

    #[test]
    fn test_match_sort_skip_limit() {
        let pipeline = Pipeline::from_json(&json!([
            {"$match": {"city": "Paris"}},
            {"$sort": {"age": -1}},
            {"$skip": 1},
            {"$limit": 1}
        ]))
        .unwrap();
        assert_eq!(names(&pipeline.execute(people())), vec!["a"]);
    }

    #[test]
    fn test_skip_and_limit_bounds() {
        let out = Pipeline::new().push(Stage::Skip(10)).execute(people());
        assert!(out.is_empty());

        let out = Pipeline::new().push(Stage::Limit(0)).execute(people());
        assert!(out.is_empty());

        let out = Pipeline::new().push(Stage::Limit(10)).execute(people());
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_unknown_stage_is_skipped() {
        let pipeline = Pipeline::from_json(&json!([
            {"$project": {"name": 1}},
            {"$limit": 2}
        ]))
        .unwrap();
        assert_eq!(pipeline.execute(people()).len(), 2);
    }

    #[test]
    fn test_group_after_match() {
        let pipeline = Pipeline::new()
            .push(Stage::Match(Query::all().with(
                "age",
                vec![crate::query::Operator::Exists(true)],
            )))
            .push(Stage::Group(GroupSpec::by_field("city")));
        let out = pipeline.execute(people());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["_id"], json!("Paris"));
        assert_eq!(out[0]["count"], json!(2));
    }

    #[test]
    fn test_pipeline_must_be_array() {
        let err = Pipeline::from_json(&json!({"$limit": 1})).unwrap_err();
        assert_eq!(err.code(), "EMBER_INVALID_PIPELINE");
    }
}
