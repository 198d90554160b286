//! Test Rollup - hierarchical aggregation of test execution events
//!
//! Consumes an ordered feed of lifecycle events from a test executor
//! (registrations, starts, finishes, skips, dynamic test registrations) and
//! builds a result tree with rolled-up statuses and durations.
//!
//! ## Usage
//!
//! ```
//! use chrono::Utc;
//! use test_rollup::aggregate::TreeBuilder;
//! use test_rollup::models::{Identifier, Outcome, SegmentKind};
//!
//! let root = Identifier::root();
//! let test = root.child(SegmentKind::Test, "alphaOne").unwrap();
//!
//! let mut builder = TreeBuilder::new();
//! builder.start(&root, Utc::now()).unwrap();
//! builder.register_test(&root, test.clone(), "alphaOne()").unwrap();
//! builder.start(&test, Utc::now()).unwrap();
//! builder.finish(&test, Outcome::Passed, None, Utc::now()).unwrap();
//! builder.finish(&root, Outcome::Passed, None, Utc::now()).unwrap();
//!
//! let tree = builder.complete().unwrap();
//! assert_eq!(tree.summary().passed, 1);
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod output;
pub mod results;
pub mod utils;

pub use aggregate::{ResultTree, RunSummary, TreeBuilder};
pub use error::{AggregateError, AggregateResult, EventError};
