//! Lifecycle events
//!
//! `EventRecord` is the wire form produced by executors (camelCase JSON);
//! `Event` is the validated form the tree builder consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifier::{Identifier, SegmentKind};
use super::node::{FailureDetail, Outcome};
use crate::error::{AggregateError, AggregateResult};

/// Kind of lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    RegisterContainer,
    RegisterTest,
    RegisterDynamic,
    Start,
    Finish,
    Skip,
    CloseDynamic,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::RegisterContainer => "registerContainer",
            EventKind::RegisterTest => "registerTest",
            EventKind::RegisterDynamic => "registerDynamic",
            EventKind::Start => "start",
            EventKind::Finish => "finish",
            EventKind::Skip => "skip",
            EventKind::CloseDynamic => "closeDynamic",
        };
        f.write_str(name)
    }
}

/// One record of the event feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub sequence_no: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub identifier_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<bool>,
}

/// Validated event content
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventPayload {
    RegisterContainer {
        parent: Identifier,
        id: Identifier,
        display_name: String,
    },
    RegisterTest {
        parent: Identifier,
        id: Identifier,
        display_name: String,
    },
    RegisterDynamic {
        parent: Identifier,
        proposed_index: Option<u32>,
        display_name: String,
        container: bool,
    },
    Start {
        id: Identifier,
    },
    Finish {
        id: Identifier,
        outcome: Outcome,
        failure: Option<FailureDetail>,
    },
    Skip {
        id: Identifier,
        reason: String,
    },
    CloseDynamic {
        id: Identifier,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::RegisterContainer { .. } => EventKind::RegisterContainer,
            EventPayload::RegisterTest { .. } => EventKind::RegisterTest,
            EventPayload::RegisterDynamic { .. } => EventKind::RegisterDynamic,
            EventPayload::Start { .. } => EventKind::Start,
            EventPayload::Finish { .. } => EventKind::Finish,
            EventPayload::Skip { .. } => EventKind::Skip,
            EventPayload::CloseDynamic { .. } => EventKind::CloseDynamic,
        }
    }

    /// Identifier the event is about; the parent for dynamic registration
    pub fn subject(&self) -> &Identifier {
        match self {
            EventPayload::RegisterContainer { id, .. }
            | EventPayload::RegisterTest { id, .. }
            | EventPayload::Start { id }
            | EventPayload::Finish { id, .. }
            | EventPayload::Skip { id, .. }
            | EventPayload::CloseDynamic { id } => id,
            EventPayload::RegisterDynamic { parent, .. } => parent,
        }
    }
}

/// A sequenced, timestamped event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub sequence_no: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(sequence_no: u64, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            sequence_no,
            timestamp,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = AggregateError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let id = Identifier::parse(&record.identifier_path)?;
        let parent = record
            .parent_path
            .as_deref()
            .map(Identifier::parse)
            .transpose()?;

        let payload = match record.kind {
            EventKind::RegisterContainer | EventKind::RegisterTest => {
                let parent = parent.ok_or_else(|| {
                    AggregateError::invalid_id(format!(
                        "registration of '{id}' without a parent path"
                    ))
                })?;
                let display_name = record.display_name.unwrap_or_else(|| id.name().to_string());
                if record.kind == EventKind::RegisterContainer {
                    EventPayload::RegisterContainer {
                        parent,
                        id,
                        display_name,
                    }
                } else {
                    EventPayload::RegisterTest {
                        parent,
                        id,
                        display_name,
                    }
                }
            }
            EventKind::RegisterDynamic => decode_dynamic(id, parent, &record)?,
            EventKind::Start => EventPayload::Start { id },
            EventKind::Finish => {
                let outcome = record.outcome.ok_or_else(|| {
                    AggregateError::MalformedEvent(format!("finish of '{id}' without outcome"))
                })?;
                let failure = FailureDetail {
                    message: record.failure_message,
                    causes: record.failure_causes,
                };
                EventPayload::Finish {
                    id,
                    outcome,
                    failure: (!failure.is_empty()).then_some(failure),
                }
            }
            EventKind::Skip => EventPayload::Skip {
                id,
                reason: record.skip_reason.unwrap_or_default(),
            },
            EventKind::CloseDynamic => EventPayload::CloseDynamic { id },
        };

        Ok(Event::new(record.sequence_no, record.timestamp, payload))
    }
}

/// Dynamic registrations name the proposed `parent/Dynamic:#n` identifier
fn decode_dynamic(
    id: Identifier,
    parent: Option<Identifier>,
    record: &EventRecord,
) -> AggregateResult<EventPayload> {
    let is_dynamic = id
        .last()
        .map(|s| s.kind == SegmentKind::Dynamic)
        .unwrap_or(false);
    let proposed_index = id.dynamic_index().filter(|_| is_dynamic).ok_or_else(|| {
        AggregateError::invalid_id(format!(
            "'{id}' is not a canonical 'Dynamic:#n' identifier"
        ))
    })?;

    let derived = id
        .parent()
        .ok_or_else(|| AggregateError::invalid_id("dynamic node without a parent"))?;
    if let Some(parent) = parent {
        if parent != derived {
            return Err(AggregateError::invalid_id(format!(
                "parent path '{parent}' does not match '{id}'"
            )));
        }
    }

    Ok(EventPayload::RegisterDynamic {
        parent: derived,
        proposed_index: Some(proposed_index),
        display_name: record
            .display_name
            .clone()
            .unwrap_or_else(|| id.name().to_string()),
        container: record.container.unwrap_or(false),
    })
}
