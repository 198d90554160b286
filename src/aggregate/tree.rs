//! Result tree and run summary
//!
//! The tree is an arena of nodes indexed by identifier. Only the builder
//! mutates it; readers get shared references.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use super::rollup::{rollup, ChildState, Rollup};
use crate::models::{Identifier, Node, NodeKind, NodeStatus};

/// Hierarchical results of one run
#[derive(Clone, Debug)]
pub struct ResultTree {
    nodes: Vec<Node>,
    index: HashMap<Identifier, usize>,
}

impl ResultTree {
    pub(crate) const ROOT: usize = 0;

    pub(crate) fn new() -> Self {
        let root = Node::new(Identifier::root(), "root", NodeKind::StaticContainer, None);
        let mut index = HashMap::new();
        index.insert(root.id.clone(), Self::ROOT);
        Self {
            nodes: vec![root],
            index,
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> usize {
        let idx = self.nodes.len();
        if let Some(parent) = node.parent {
            self.nodes[parent].children.push(idx);
        }
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        idx
    }

    pub(crate) fn index_of(&self, id: &Identifier) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: usize) -> &mut Node {
        &mut self.nodes[idx]
    }

    pub fn root(&self) -> &Node {
        &self.nodes[Self::ROOT]
    }

    /// Whether the root has been finalized
    pub fn is_complete(&self) -> bool {
        self.root().is_finalized()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn find(&self, id: &Identifier) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    /// Parent node, `None` for the root or unknown identifiers
    pub fn parent_of(&self, id: &Identifier) -> Option<&Node> {
        let idx = self.index_of(id)?;
        self.nodes[idx].parent.map(|p| &self.nodes[p])
    }

    /// Direct children in registration order
    pub fn children_of(&self, id: &Identifier) -> Vec<&Node> {
        self.index_of(id)
            .map(|idx| {
                self.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| &self.nodes[c])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All descendants in pre-order, excluding the node itself
    pub fn descendants_of(&self, id: &Identifier) -> Vec<&Node> {
        let Some(idx) = self.index_of(id) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut stack: Vec<usize> = self.nodes[idx].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            result.push(node);
            stack.extend(node.children.iter().rev().copied());
        }
        result
    }

    /// Leaf tests in tree order
    pub fn leaves(&self) -> Vec<&Node> {
        self.descendants_of(&Identifier::root())
            .into_iter()
            .filter(|n| n.is_leaf())
            .collect()
    }

    /// Every node, root first, in tree order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(self.root()).chain(self.descendants_of(&Identifier::root()))
    }

    /// Recompute a container's rollup from its children's current states
    pub fn recompute(&self, id: &Identifier) -> Option<Rollup> {
        let idx = self.index_of(id)?;
        let node = &self.nodes[idx];
        if node.is_leaf() {
            return None;
        }
        Some(rollup(
            node.direct_outcome,
            node.children
                .iter()
                .map(|&c| ChildState::from(&self.nodes[c])),
        ))
    }

    /// Counts over leaf tests only; containers are never counted
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            complete: self.is_complete(),
            ..RunSummary::default()
        };

        for node in self.nodes.iter().filter(|n| n.is_leaf()) {
            match node.status {
                NodeStatus::Passed => summary.passed += 1,
                NodeStatus::Failed => summary.failed += 1,
                NodeStatus::Skipped => summary.skipped += 1,
                NodeStatus::Aborted => summary.aborted += 1,
                NodeStatus::Pending | NodeStatus::Running => {
                    summary.pending += 1;
                    continue;
                }
            }
            summary.total += 1;
            summary.duration_total_ms += node.duration_ms;
        }

        summary
    }

    fn view(&self, idx: usize) -> NodeView<'_> {
        let node = &self.nodes[idx];
        NodeView {
            node,
            children: node.children.iter().map(|&c| self.view(c)).collect(),
        }
    }
}

/// Serializable nested view of a node and its subtree
#[derive(serde::Serialize)]
struct NodeView<'a> {
    #[serde(flatten)]
    node: &'a Node,
    children: Vec<NodeView<'a>>,
}

impl Serialize for ResultTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResultTree", 3)?;
        state.serialize_field("complete", &self.is_complete())?;
        state.serialize_field("summary", &self.summary())?;
        state.serialize_field("root", &self.view(Self::ROOT))?;
        state.end()
    }
}

/// Flat summary of leaf outcomes
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: usize,
    /// Leaves registered but not yet finalized
    pub pending: usize,
    pub duration_total_ms: u64,
    pub complete: bool,
}

impl RunSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.aborted > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {} | Abort: {} | Duration: {}ms",
            self.total,
            self.passed,
            self.failed,
            self.skipped,
            self.aborted,
            self.duration_total_ms
        )?;
        if !self.complete {
            write!(f, " (incomplete, {} pending)", self.pending)?;
        }
        Ok(())
    }
}
