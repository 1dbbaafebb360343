//! Query and pipeline parse errors

use thiserror::Error;

/// Result type for query parsing
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while turning JSON into a query or a pipeline.
///
/// Evaluation itself never fails: operators that cannot be evaluated
/// simply do not match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidQuery(_) => "EMBER_INVALID_QUERY",
            QueryError::InvalidPipeline(_) => "EMBER_INVALID_PIPELINE",
        }
    }
}
