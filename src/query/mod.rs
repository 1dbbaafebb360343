//! Predicate matching
//!
//! Queries are parsed once from JSON into a tagged-variant tree
//! ([`Query`] → [`FieldPredicate`] → [`Condition`] / [`Operator`]) and then
//! evaluated by exhaustive matching in [`Matcher`].

mod ast;
mod compare;
mod errors;
mod matcher;

pub use ast::{Condition, FieldPredicate, Operator, Query};
pub use compare::{compare_ordered, compare_total, values_equal};
pub use errors::{QueryError, QueryResult};
pub use matcher::Matcher;

pub(crate) use ast::json_type_name;
