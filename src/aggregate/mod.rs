//! Aggregation pipelines
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s run over a snapshot of
//! a table's records. Stages never modify the table.

mod group;
mod pipeline;
mod stage;

pub use pipeline::Pipeline;
pub use stage::{
    Accumulator, AccumulatorOp, GroupKey, GroupSpec, KeyFn, SortDirection, SortSpec, Stage,
    SumSource,
};
