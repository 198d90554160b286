//! Producer-contract violations
//!
//! Every error here means the event feed broke the lifecycle contract.
//! Test failures are never errors: they are recorded as node outcomes.

use thiserror::Error;

use crate::models::{EventKind, Identifier};

/// Error raised by the tree builder when an event violates the contract
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Duplicate node: {id}")]
    DuplicateNode { id: Identifier },

    #[error("Unknown parent: {parent}")]
    UnknownParent { parent: Identifier },

    #[error("Invalid transition for {id}: expected {expected}, found {actual}")]
    InvalidTransition {
        id: Identifier,
        expected: String,
        actual: String,
    },

    #[error("Premature finish of {id}: {reason}")]
    PrematureFinish { id: Identifier, reason: String },

    #[error("Out of order event for {id}: expected {expected}, found {actual}")]
    OutOfOrderEvent {
        id: Identifier,
        expected: String,
        actual: String,
    },

    #[error("Run aborted by event #{sequence_no}")]
    RunAborted { sequence_no: u64 },
}

impl AggregateError {
    pub(crate) fn invalid_id(reason: impl Into<String>) -> Self {
        AggregateError::InvalidIdentifier(reason.into())
    }

    pub(crate) fn out_of_order(
        id: &Identifier,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        AggregateError::OutOfOrderEvent {
            id: id.clone(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn transition(
        id: &Identifier,
        expected: impl Into<String>,
        actual: impl ToString,
    ) -> Self {
        AggregateError::InvalidTransition {
            id: id.clone(),
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }
}

/// Diagnostic for a rejected event
///
/// Carries the sequence number of the offending event so the producer bug
/// can be located in the feed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("Event #{sequence_no} ({kind}) rejected: {source}")]
pub struct EventError {
    pub sequence_no: u64,
    pub kind: EventKind,
    #[source]
    pub source: AggregateError,
}

pub type AggregateResult<T> = std::result::Result<T, AggregateError>;
