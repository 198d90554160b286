//! Data models for test result aggregation
//!
//! Identifiers, nodes and lifecycle events shared by the builder, the
//! feed adapters and the reporters.

mod event;
mod identifier;
mod node;

pub use event::{Event, EventKind, EventPayload, EventRecord};
pub use identifier::{Identifier, Segment, SegmentKind};
pub use node::{FailureDetail, Node, NodeKind, NodeStatus, Outcome};
