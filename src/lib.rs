//! emberdb - An embedded document store
//!
//! Schema-checked records in named tables, secondary indexes, predicate
//! queries, aggregation pipelines and content-addressed binary payloads.

pub mod aggregate;
pub mod blob;
pub mod config;
pub mod database;
pub mod index;
pub mod observability;
pub mod query;
pub mod schema;
pub mod table;

pub use config::DatabaseConfig;
pub use database::{Database, DbError, DbResult};
