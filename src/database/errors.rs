//! Database errors

use thiserror::Error;

use crate::blob::BlobError;
use crate::config::ConfigError;
use crate::query::QueryError;
use crate::table::TableError;

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by [`crate::Database`]
#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),
}

impl DbError {
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Table(e) => e.code(),
            DbError::Persistence(_) => "EMBER_PERSISTENCE",
            DbError::Config(e) => e.code(),
            DbError::InvalidTableName(_) => "EMBER_INVALID_TABLE_NAME",
        }
    }

    /// The table error, if this is one
    pub fn as_table_error(&self) -> Option<&TableError> {
        match self {
            DbError::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<QueryError> for DbError {
    fn from(e: QueryError) -> Self {
        DbError::Table(TableError::Query(e))
    }
}

impl From<BlobError> for DbError {
    fn from(e: BlobError) -> Self {
        DbError::Table(TableError::Blob(e))
    }
}
