//! JSON Lines event feed reader
//!
//! One event record per line; blank lines are ignored.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::aggregate::TreeBuilder;
use crate::error::EventError;
use crate::models::{Event, EventRecord};

/// Iterator over decoded events of a JSON Lines stream
pub struct EventReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl EventReader<BufReader<File>> {
    /// Open a feed file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open event feed: {}", path.display()))?;
        debug!("Reading events from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e).context("Failed to read event feed")),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            let line_no = self.line_no;
            let event = serde_json::from_str::<EventRecord>(&line)
                .with_context(|| format!("Malformed event record on line {line_no}"))
                .and_then(|record| {
                    Event::try_from(record)
                        .with_context(|| format!("Invalid event on line {line_no}"))
                });
            return Some(event);
        }
    }
}

/// Read every event of a feed into memory
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    EventReader::new(reader).collect()
}

/// Feed events into a builder until the first rejected one
///
/// Decoding problems are reported through the outer `Result`; a rejected
/// event through the inner one, leaving the builder inspectable.
pub fn replay<I>(events: I, builder: &mut TreeBuilder) -> Result<Result<u64, EventError>>
where
    I: IntoIterator<Item = Result<Event>>,
{
    let mut applied = 0u64;
    for event in events {
        let event = event?;
        if let Err(e) = builder.apply(&event) {
            return Ok(Err(e));
        }
        applied += 1;
    }
    Ok(Ok(applied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventKind, Identifier, NodeStatus};
    use std::io::Cursor;

    const FEED: &str = r#"
{"sequenceNo":1,"timestamp":"2024-05-01T10:00:00Z","kind":"start","identifierPath":""}
{"sequenceNo":2,"timestamp":"2024-05-01T10:00:00.010Z","kind":"registerTest","identifierPath":"Test:alphaSkipped","parentPath":"","displayName":"alphaSkipped()"}

{"sequenceNo":3,"timestamp":"2024-05-01T10:00:00.020Z","kind":"skip","identifierPath":"Test:alphaSkipped","skipReason":"integration skip example"}
{"sequenceNo":4,"timestamp":"2024-05-01T10:00:00.030Z","kind":"finish","identifierPath":"","outcome":"passed"}
"#;

    #[test]
    fn test_read_events_skips_blank_lines() {
        let events = read_events(Cursor::new(FEED)).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2].kind(), EventKind::Skip);
    }

    #[test]
    fn test_replay_builds_tree() {
        let mut builder = TreeBuilder::new();
        let applied = replay(EventReader::new(Cursor::new(FEED)), &mut builder)
            .unwrap()
            .unwrap();
        assert_eq!(applied, 4);

        let tree = builder.complete().unwrap();
        let node = tree
            .find(&Identifier::parse("Test:alphaSkipped").unwrap())
            .unwrap();
        assert_eq!(node.status, NodeStatus::Skipped);
        assert_eq!(tree.root().status, NodeStatus::Skipped);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let feed = "{\"sequenceNo\":1}\n";
        let err = read_events(Cursor::new(feed)).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_replay_stops_at_rejected_event() {
        let feed = r#"{"sequenceNo":1,"timestamp":"2024-05-01T10:00:00Z","kind":"start","identifierPath":""}
{"sequenceNo":2,"timestamp":"2024-05-01T10:00:01Z","kind":"finish","identifierPath":"Test:neverStarted","outcome":"passed"}
{"sequenceNo":3,"timestamp":"2024-05-01T10:00:02Z","kind":"finish","identifierPath":"","outcome":"passed"}"#;

        let mut builder = TreeBuilder::new();
        let rejected = replay(EventReader::new(Cursor::new(feed)), &mut builder)
            .unwrap()
            .unwrap_err();
        assert_eq!(rejected.sequence_no, 2);
        assert_eq!(builder.tree().root().status, NodeStatus::Running);
    }
}
