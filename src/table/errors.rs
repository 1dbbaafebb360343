//! Record engine errors

use serde_json::Value;
use thiserror::Error;

use crate::blob::BlobError;
use crate::query::QueryError;

/// Result type for table operations
pub type TableResult<T> = Result<T, TableError>;

/// Errors raised by table operations.
///
/// A failed mutation leaves the table unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Foreign key violation: {field} = {value} not found in {table}.{target_field}")]
    ForeignKey {
        field: String,
        table: String,
        target_field: String,
        value: Value,
    },

    #[error("Field {field} is not of type {expected}")]
    FieldType { field: String, expected: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl TableError {
    pub fn code(&self) -> &'static str {
        match self {
            TableError::Validation(_) => "EMBER_VALIDATION",
            TableError::ForeignKey { .. } => "EMBER_FOREIGN_KEY",
            TableError::FieldType { .. } => "EMBER_FIELD_TYPE",
            TableError::InvalidDocument(_) => "EMBER_INVALID_DOCUMENT",
            TableError::RecordNotFound(_) => "EMBER_RECORD_NOT_FOUND",
            TableError::Blob(e) => e.code(),
            TableError::Query(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages() {
        let err = TableError::Validation(vec!["name is required".into(), "age must be >= 0".into()]);
        assert_eq!(err.to_string(), "Validation failed: name is required; age must be >= 0");
        assert_eq!(err.code(), "EMBER_VALIDATION");

        let err = TableError::ForeignKey {
            field: "authorId".into(),
            table: "users".into(),
            target_field: "_id".into(),
            value: json!("u-9"),
        };
        assert_eq!(
            err.to_string(),
            "Foreign key violation: authorId = \"u-9\" not found in users._id"
        );
    }

    #[test]
    fn test_wrapped_codes() {
        let err: TableError = BlobError::SizeLimit { size: 2, limit: 1 }.into();
        assert_eq!(err.code(), "EMBER_SIZE_LIMIT");
        let err: TableError = QueryError::InvalidQuery("x".into()).into();
        assert_eq!(err.code(), "EMBER_INVALID_QUERY");
    }
}
