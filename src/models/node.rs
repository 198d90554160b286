//! Result tree node model
//!
//! Defines node kinds, statuses, outcomes and failure details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier::{Identifier, SegmentKind};

/// Kind of node in the result tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    StaticContainer,
    StaticTest,
    DynamicContainer,
    DynamicTest,
}

impl NodeKind {
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::StaticContainer | NodeKind::DynamicContainer)
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_container()
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, NodeKind::DynamicContainer | NodeKind::DynamicTest)
    }

    /// Segment kind a node of this kind is addressed by
    pub fn segment_kind(&self) -> SegmentKind {
        match self {
            NodeKind::StaticContainer => SegmentKind::Container,
            NodeKind::StaticTest => SegmentKind::Test,
            NodeKind::DynamicContainer | NodeKind::DynamicTest => SegmentKind::Dynamic,
        }
    }
}

/// Lifecycle status of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Aborted,
}

impl NodeStatus {
    /// Whether the node has been finalized
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Passed | NodeStatus::Failed | NodeStatus::Skipped | NodeStatus::Aborted
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "·",
            NodeStatus::Running => "…",
            NodeStatus::Passed => "✓",
            NodeStatus::Failed => "✗",
            NodeStatus::Skipped => "○",
            NodeStatus::Aborted => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NodeStatus::Passed)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Pending => write!(f, "PENDING"),
            NodeStatus::Running => write!(f, "RUNNING"),
            NodeStatus::Passed => write!(f, "PASS"),
            NodeStatus::Failed => write!(f, "FAIL"),
            NodeStatus::Skipped => write!(f, "SKIP"),
            NodeStatus::Aborted => write!(f, "ABORT"),
        }
    }
}

/// Outcome reported by a finish event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Aborted,
}

impl From<Outcome> for NodeStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Passed => NodeStatus::Passed,
            Outcome::Failed => NodeStatus::Failed,
            Outcome::Aborted => NodeStatus::Aborted,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        NodeStatus::from(*self).fmt(f)
    }
}

/// Failure message plus cause chain, outermost first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            causes: Vec::new(),
        }
    }

    /// Detail used by executors that abort a test on wall-clock timeout
    pub fn timeout() -> Self {
        Self::new("timeout")
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none() && self.causes.is_empty()
    }
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message.as_deref().unwrap_or("<no message>"))?;
        for cause in &self.causes {
            write!(f, ": caused by {cause}")?;
        }
        Ok(())
    }
}

/// A container or leaf test in the result tree
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub id: Identifier,
    pub display_name: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip)]
    pub(crate) parent: Option<usize>,
    #[serde(skip)]
    pub(crate) children: Vec<usize>,
}

impl Node {
    pub(crate) fn new(
        id: Identifier,
        display_name: impl Into<String>,
        kind: NodeKind,
        parent: Option<usize>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            kind,
            status: NodeStatus::Pending,
            started_at: None,
            finished_at: None,
            duration_ms: 0,
            direct_outcome: None,
            failure: None,
            skip_reason: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.display_name,
            self.duration_ms
        )?;
        if let Some(failure) = &self.failure {
            write!(f, " - {failure}")?;
        } else if let Some(reason) = &self.skip_reason {
            write!(f, " - {reason}")?;
        }
        Ok(())
    }
}
