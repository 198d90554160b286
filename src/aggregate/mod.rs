//! Test result aggregation engine
//!
//! Turns an ordered feed of lifecycle events into a queryable result tree
//! with status and duration rollup.

mod builder;
mod registry;
mod rollup;
mod tree;

pub use builder::TreeBuilder;
pub use registry::DynamicRegistry;
pub use rollup::{rollup, span_ms, ChildState, Rollup};
pub use tree::{ResultTree, RunSummary};
