//! Tree builder
//!
//! Consumes lifecycle events in feed order and materializes the result
//! tree. The builder is the single writer of the tree; it validates every
//! event against the node lifecycle and fails fast on contract violations.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::registry::DynamicRegistry;
use super::rollup::{rollup, span_ms, ChildState};
use super::tree::ResultTree;
use crate::error::{AggregateError, AggregateResult, EventError};
use crate::models::{
    Event, EventPayload, FailureDetail, Identifier, Node, NodeKind, NodeStatus, Outcome,
    SegmentKind,
};

/// Builds a [`ResultTree`] from lifecycle events
#[derive(Debug)]
pub struct TreeBuilder {
    tree: ResultTree,
    registry: DynamicRegistry,
    last_sequence: Option<u64>,
    aborted_at: Option<u64>,
    applied: u64,
}

impl TreeBuilder {
    /// Create a builder holding only the synthetic root
    pub fn new() -> Self {
        Self {
            tree: ResultTree::new(),
            registry: DynamicRegistry::new(),
            last_sequence: None,
            aborted_at: None,
            applied: 0,
        }
    }

    /// Current, possibly partial, tree
    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Sequence number of the event that aborted the run, if any
    pub fn aborted_at(&self) -> Option<u64> {
        self.aborted_at
    }

    /// Number of events applied successfully
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Hand back the tree whether or not the run completed
    pub fn into_result_tree(self) -> ResultTree {
        self.tree
    }

    /// Hand back the tree of a completed run
    pub fn complete(self) -> AggregateResult<ResultTree> {
        if !self.tree.is_complete() {
            return Err(AggregateError::PrematureFinish {
                id: Identifier::root(),
                reason: format!("run root is {}", self.tree.root().status),
            });
        }
        Ok(self.tree)
    }

    /// Apply one sequenced event
    ///
    /// Sequence numbers must strictly increase. The first rejected event
    /// aborts the run; every later event fails with `RunAborted`.
    pub fn apply(&mut self, event: &Event) -> Result<(), EventError> {
        let reject = |source| EventError {
            sequence_no: event.sequence_no,
            kind: event.kind(),
            source,
        };

        if let Some(sequence_no) = self.aborted_at {
            return Err(reject(AggregateError::RunAborted { sequence_no }));
        }

        let result = match self.last_sequence {
            Some(last) if event.sequence_no <= last => Err(AggregateError::out_of_order(
                event.payload.subject(),
                format!("sequence number > {last}"),
                event.sequence_no,
            )),
            _ => self.dispatch(event),
        };

        match result {
            Ok(()) => {
                self.last_sequence = Some(event.sequence_no);
                self.applied += 1;
                Ok(())
            }
            Err(source) => {
                error!(
                    "Event #{} ({}) rejected: {}",
                    event.sequence_no,
                    event.kind(),
                    source
                );
                self.aborted_at = Some(event.sequence_no);
                Err(reject(source))
            }
        }
    }

    fn dispatch(&mut self, event: &Event) -> AggregateResult<()> {
        debug!(
            "Applying event #{} {} {}",
            event.sequence_no,
            event.kind(),
            event.payload.subject()
        );
        let at = event.timestamp;

        match &event.payload {
            EventPayload::RegisterContainer {
                parent,
                id,
                display_name,
            } => self.register_container(parent, id.clone(), display_name.clone()),
            EventPayload::RegisterTest {
                parent,
                id,
                display_name,
            } => self.register_test(parent, id.clone(), display_name.clone()),
            EventPayload::RegisterDynamic {
                parent,
                proposed_index,
                display_name,
                container,
            } => self
                .register_dynamic(parent, *proposed_index, display_name.clone(), *container)
                .map(|_| ()),
            EventPayload::Start { id } => self.start(id, at),
            EventPayload::Finish {
                id,
                outcome,
                failure,
            } => self.finish(id, *outcome, failure.clone(), at),
            EventPayload::Skip { id, reason } => self.skip(id, reason.clone(), at),
            EventPayload::CloseDynamic { id } => self.close_dynamic(id),
        }
    }

    /// Register a statically declared container
    pub fn register_container(
        &mut self,
        parent: &Identifier,
        id: Identifier,
        display_name: impl Into<String>,
    ) -> AggregateResult<()> {
        self.register_static(parent, id, display_name.into(), NodeKind::StaticContainer)
            .map(|_| ())
    }

    /// Register a statically declared test
    pub fn register_test(
        &mut self,
        parent: &Identifier,
        id: Identifier,
        display_name: impl Into<String>,
    ) -> AggregateResult<()> {
        self.register_static(parent, id, display_name.into(), NodeKind::StaticTest)
            .map(|_| ())
    }

    fn register_static(
        &mut self,
        parent: &Identifier,
        id: Identifier,
        display_name: String,
        kind: NodeKind,
    ) -> AggregateResult<usize> {
        if self.tree.index_of(&id).is_some() {
            return Err(AggregateError::DuplicateNode { id });
        }
        if id.parent().as_ref() != Some(parent) {
            return Err(AggregateError::invalid_id(format!(
                "'{id}' is not a child of '{parent}'"
            )));
        }
        if id.last().map(|s| s.kind) != Some(kind.segment_kind()) {
            return Err(AggregateError::invalid_id(format!(
                "'{id}' cannot name a {kind:?}"
            )));
        }

        let parent_idx = self.open_parent(parent)?;
        let idx = self
            .tree
            .insert(Node::new(id, display_name, kind, Some(parent_idx)));

        debug!("Registered {:?} {}", kind, self.tree.node(idx).id);
        Ok(idx)
    }

    /// Resolve a parent that can still accept children
    fn open_parent(&self, parent: &Identifier) -> AggregateResult<usize> {
        let idx = self
            .tree
            .index_of(parent)
            .ok_or_else(|| AggregateError::UnknownParent {
                parent: parent.clone(),
            })?;
        let node = self.tree.node(idx);

        if !node.kind.is_container() {
            return Err(AggregateError::invalid_id(format!(
                "'{parent}' is a test and cannot have children"
            )));
        }
        if node.is_finalized() {
            return Err(AggregateError::out_of_order(
                parent,
                "parent not yet finalized",
                node.status,
            ));
        }
        Ok(idx)
    }

    /// Register a runtime-generated node under a running parent
    ///
    /// Returns the allocated `parent/Dynamic:#n` identifier.
    pub fn register_dynamic(
        &mut self,
        parent: &Identifier,
        proposed_index: Option<u32>,
        display_name: impl Into<String>,
        is_container: bool,
    ) -> AggregateResult<Identifier> {
        let parent_idx = self.open_parent(parent)?;
        let status = self.tree.node(parent_idx).status;
        if status != NodeStatus::Running {
            return Err(AggregateError::out_of_order(
                parent,
                "running parent",
                status,
            ));
        }

        // The index is consumed before the node exists so it is never reused
        let id = self.registry.allocate_at(parent, proposed_index)?;
        let kind = if is_container {
            self.registry.open(&id);
            NodeKind::DynamicContainer
        } else {
            NodeKind::DynamicTest
        };

        self.tree
            .insert(Node::new(id.clone(), display_name, kind, Some(parent_idx)));
        debug!("Registered {:?} {}", kind, id);
        Ok(id)
    }

    /// Look up a node, implicitly registering undeclared static nodes
    fn resolve(&mut self, id: &Identifier) -> AggregateResult<usize> {
        if let Some(idx) = self.tree.index_of(id) {
            return Ok(idx);
        }

        let parent = id.parent().ok_or_else(|| AggregateError::UnknownParent {
            parent: Identifier::root(),
        })?;
        let kind = match id.last().map(|s| s.kind) {
            Some(SegmentKind::Container) => NodeKind::StaticContainer,
            Some(SegmentKind::Test) => NodeKind::StaticTest,
            _ => {
                return Err(AggregateError::out_of_order(
                    id,
                    "registered dynamic node",
                    "unregistered",
                ))
            }
        };

        debug!("Implicitly registering {}", id);
        self.register_static(&parent, id.clone(), id.name().to_string(), kind)
    }

    /// Transition a node to Running
    pub fn start(&mut self, id: &Identifier, at: DateTime<Utc>) -> AggregateResult<()> {
        let idx = self.resolve(id)?;
        let node = self.tree.node(idx);

        match node.status {
            NodeStatus::Pending => {}
            NodeStatus::Running => {
                warn!("Duplicate start of {} ignored", id);
                return Ok(());
            }
            other => return Err(AggregateError::transition(id, "Pending", other)),
        }

        if let Some(parent_idx) = node.parent {
            let parent = self.tree.node(parent_idx);
            if parent.status != NodeStatus::Running {
                return Err(AggregateError::out_of_order(
                    id,
                    format!("running parent {}", parent.id),
                    format!("parent {}", parent.status),
                ));
            }
        }

        let node = self.tree.node_mut(idx);
        node.status = NodeStatus::Running;
        node.started_at = Some(at);
        Ok(())
    }

    /// Finalize a running node with its outcome
    ///
    /// Leaves take the outcome as their status. Containers derive their
    /// status from their children, with a Failed or Aborted outcome counted
    /// as the container's own direct outcome.
    pub fn finish(
        &mut self,
        id: &Identifier,
        outcome: Outcome,
        failure: Option<FailureDetail>,
        at: DateTime<Utc>,
    ) -> AggregateResult<()> {
        let idx = self
            .tree
            .index_of(id)
            .ok_or_else(|| AggregateError::out_of_order(id, "started node", "unknown node"))?;
        let node = self.tree.node(idx);

        let started_at = match node.status {
            NodeStatus::Running => node.started_at.unwrap_or(at),
            NodeStatus::Pending => {
                return Err(AggregateError::out_of_order(id, "Running", node.status))
            }
            other => return Err(AggregateError::transition(id, "Running", other)),
        };
        if at < started_at {
            return Err(AggregateError::out_of_order(
                id,
                format!("finish at or after {started_at}"),
                at,
            ));
        }

        if outcome == Outcome::Passed && failure.is_some() {
            warn!("Passing finish of {} carries a failure detail; dropped", id);
        }
        let failure = failure.filter(|_| outcome != Outcome::Passed);

        if node.kind.is_container() {
            self.finish_container(idx, outcome, failure, started_at, at)?;
        } else {
            let node = self.tree.node_mut(idx);
            node.status = outcome.into();
            node.finished_at = Some(at);
            node.duration_ms = span_ms(started_at, at);
            node.failure = failure;
        }

        let node = self.tree.node(idx);
        debug!("Finished {} as {}", node.id, node.status);
        if node.id.is_root() {
            info!("Run completed: {}", self.tree.summary());
        }
        Ok(())
    }

    fn finish_container(
        &mut self,
        idx: usize,
        outcome: Outcome,
        failure: Option<FailureDetail>,
        started_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> AggregateResult<()> {
        let node = self.tree.node(idx);

        let unresolved = node
            .children
            .iter()
            .filter(|&&c| !self.tree.node(c).is_finalized())
            .count();
        if unresolved > 0 {
            return Err(AggregateError::PrematureFinish {
                id: node.id.clone(),
                reason: format!("{unresolved} unresolved children"),
            });
        }
        if self.registry.is_open(&node.id) {
            return Err(AggregateError::PrematureFinish {
                id: node.id.clone(),
                reason: "dynamic producer not exhausted".to_string(),
            });
        }

        let direct = (outcome != Outcome::Passed).then_some(outcome);
        let mut result = rollup(
            direct,
            node.children
                .iter()
                .map(|&c| ChildState::from(self.tree.node(c))),
        );
        // A container that failed on its own, without running children,
        // still spent its own time
        if direct.is_some() && result.duration_ms == 0 {
            result.duration_ms = span_ms(started_at, at);
        }

        let node = self.tree.node_mut(idx);
        node.direct_outcome = direct;
        node.status = result.status;
        node.duration_ms = result.duration_ms;
        node.finished_at = Some(at);
        node.failure = failure;
        Ok(())
    }

    /// Skip a pending node and every pending node beneath it
    pub fn skip(
        &mut self,
        id: &Identifier,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> AggregateResult<()> {
        let reason = reason.into();
        let idx = self.resolve(id)?;
        let node = self.tree.node(idx);

        if node.status != NodeStatus::Pending {
            return Err(AggregateError::transition(id, "Pending", node.status));
        }
        if let Some(parent_idx) = node.parent {
            let parent = self.tree.node(parent_idx);
            if parent.is_finalized() {
                return Err(AggregateError::out_of_order(
                    id,
                    "parent not yet finalized",
                    parent.status,
                ));
            }
        }

        let mut stack = vec![idx];
        let mut count = 0usize;
        while let Some(current) = stack.pop() {
            let node = self.tree.node_mut(current);
            if node.status != NodeStatus::Pending {
                continue;
            }
            node.status = NodeStatus::Skipped;
            node.skip_reason = Some(reason.clone());
            node.finished_at = Some(at);
            node.duration_ms = 0;
            stack.extend(node.children.iter().copied());

            if node.kind.is_container() {
                let owned = node.id.clone();
                self.registry.close_if_open(&owned);
            }
            count += 1;
        }

        debug!("Skipped {} ({} nodes): {}", id, count, reason);
        Ok(())
    }

    /// Signal that a running container will produce no more dynamic children
    pub fn close_dynamic(&mut self, id: &Identifier) -> AggregateResult<()> {
        let idx = self
            .tree
            .index_of(id)
            .ok_or_else(|| AggregateError::out_of_order(id, "registered container", "unknown"))?;
        let node = self.tree.node(idx);

        if !node.kind.is_container() {
            return Err(AggregateError::invalid_id(format!(
                "'{id}' is a test and has no dynamic producer"
            )));
        }
        if node.status != NodeStatus::Running {
            return Err(AggregateError::out_of_order(id, "Running", node.status));
        }

        self.registry.close(id)?;
        debug!(
            "Dynamic producer {} exhausted after {} nodes",
            id,
            self.registry.allocated(id)
        );
        Ok(())
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
