//! Schema validation
//!
//! Schemas are optional per table. When present they are enforced on every
//! insert and on the merged result of every update.
//!
//! - Validation reports every violation, not just the first
//! - No defaults, no coercion
//! - Deterministic: fields are checked in name order

mod types;
mod validator;

pub use types::{FieldRule, FieldType, Schema};
pub use validator::SchemaValidator;
