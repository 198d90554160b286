//! Status and duration rollup
//!
//! A container's status is a pure function of its children's terminal
//! states plus its own direct outcome, independent of arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Node, NodeStatus, Outcome};

/// Terminal state of a child as seen by the rollup
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChildState {
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&Node> for ChildState {
    fn from(node: &Node) -> Self {
        Self {
            status: node.status,
            started_at: node.started_at,
            finished_at: node.finished_at,
        }
    }
}

/// Derived status and duration of a container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub status: NodeStatus,
    pub duration_ms: u64,
}

/// Compute the rollup of a container
///
/// Precedence is Failed > Aborted > all-Skipped > Passed. Only a Failed or
/// Aborted finish on the container itself counts as a direct outcome.
/// Children that are not terminal are ignored.
pub fn rollup<I>(direct: Option<Outcome>, children: I) -> Rollup
where
    I: IntoIterator<Item = ChildState>,
{
    let mut any_failed = direct == Some(Outcome::Failed);
    let mut any_aborted = direct == Some(Outcome::Aborted);
    let mut finalized = 0usize;
    let mut skipped = 0usize;
    let mut earliest: Option<DateTime<Utc>> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for child in children {
        match child.status {
            NodeStatus::Failed => any_failed = true,
            NodeStatus::Aborted => any_aborted = true,
            NodeStatus::Skipped => skipped += 1,
            NodeStatus::Passed => {}
            NodeStatus::Pending | NodeStatus::Running => continue,
        }
        finalized += 1;

        // Only children that actually ran contribute to the time window
        if let (Some(start), Some(end)) = (child.started_at, child.finished_at) {
            earliest = Some(earliest.map_or(start, |e| e.min(start)));
            latest = Some(latest.map_or(end, |l| l.max(end)));
        }
    }

    let status = if any_failed {
        NodeStatus::Failed
    } else if any_aborted {
        NodeStatus::Aborted
    } else if finalized == skipped {
        // Covers the empty container as well as the all-skipped one
        NodeStatus::Skipped
    } else {
        NodeStatus::Passed
    };

    let duration_ms = match (earliest, latest) {
        (Some(start), Some(end)) => span_ms(start, end),
        _ => 0,
    };

    Rollup {
        status,
        duration_ms,
    }
}

/// Milliseconds between two timestamps, clamped at zero
pub fn span_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
