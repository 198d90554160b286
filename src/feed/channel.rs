//! Ordered event channel
//!
//! Executors that run tests concurrently funnel their lifecycle events
//! through this channel. The single receiver is the serialization point: it
//! stamps sequence numbers in arrival order and drives the tree builder.

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::aggregate::TreeBuilder;
use crate::error::EventError;
use crate::models::{Event, EventPayload, FailureDetail, Identifier, Outcome};

/// Default capacity used by the runner configuration
pub const DEFAULT_CAPACITY: usize = 256;

/// The receiving side was dropped, usually after a rejected event
#[derive(Debug, Error)]
#[error("Event feed closed")]
pub struct FeedClosed;

/// Timestamped payload waiting for a sequence number
#[derive(Clone, Debug)]
pub struct FeedItem {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

/// Cloneable sending half handed to executor tasks
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<FeedItem>,
}

impl EventSender {
    /// Send a payload stamped with the current time
    pub async fn send(&self, payload: EventPayload) -> Result<(), FeedClosed> {
        self.send_at(Utc::now(), payload).await
    }

    pub async fn send_at(
        &self,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Result<(), FeedClosed> {
        self.tx
            .send(FeedItem { timestamp, payload })
            .await
            .map_err(|_| FeedClosed)
    }

    pub async fn start(&self, id: &Identifier) -> Result<(), FeedClosed> {
        self.send(EventPayload::Start { id: id.clone() }).await
    }

    pub async fn finish(
        &self,
        id: &Identifier,
        outcome: Outcome,
        failure: Option<FailureDetail>,
    ) -> Result<(), FeedClosed> {
        self.send(EventPayload::Finish {
            id: id.clone(),
            outcome,
            failure,
        })
        .await
    }

    /// Report a test cut off by the executor's wall-clock limit
    pub async fn timed_out(&self, id: &Identifier) -> Result<(), FeedClosed> {
        self.finish(id, Outcome::Aborted, Some(FailureDetail::timeout()))
            .await
    }
}

/// Receiving half; consumed by a single aggregation task
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<FeedItem>,
}

impl EventReceiver {
    /// Sequenced events in arrival order, numbered from 1
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        stream::unfold((self.rx, 0u64), |(mut rx, seq)| async move {
            let item = rx.recv().await?;
            let seq = seq + 1;
            Some((Event::new(seq, item.timestamp, item.payload), (rx, seq)))
        })
    }

    /// Drive `builder` until every sender is dropped or an event is rejected
    pub async fn drive(self, builder: &mut TreeBuilder) -> Result<u64, EventError> {
        drive_stream(self.into_stream(), builder).await
    }
}

/// Create an ordered channel with the given capacity
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

/// Apply a stream of sequenced events to `builder`
///
/// Stops at the first rejected event; dropping the stream then closes the
/// feed for all senders.
pub async fn drive_stream<S>(events: S, builder: &mut TreeBuilder) -> Result<u64, EventError>
where
    S: Stream<Item = Event>,
{
    let mut events = Box::pin(events);
    let mut applied = 0u64;

    while let Some(event) = events.next().await {
        builder.apply(&event)?;
        applied += 1;
    }

    debug!("Event feed drained after {} events", applied);
    if builder.tree().is_complete() {
        info!("Aggregated {} events into a complete tree", applied);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeStatus, SegmentKind};
    use futures::future::join_all;
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_executors_share_one_feed() {
        let (tx, rx) = channel(16);
        let root = Identifier::root();
        let class = root.child(SegmentKind::Container, "AlphaTest").unwrap();

        tx.start(&root).await.unwrap();
        tx.send(EventPayload::RegisterContainer {
            parent: root.clone(),
            id: class.clone(),
            display_name: "AlphaTest".to_string(),
        })
        .await
        .unwrap();
        tx.start(&class).await.unwrap();

        let tests: Vec<_> = ["alphaOne", "alphaTwo", "alphaThree"]
            .iter()
            .map(|name| class.child(SegmentKind::Test, *name).unwrap())
            .collect();

        let consumer = tokio::spawn(async move {
            let mut builder = TreeBuilder::new();
            let result = rx.drive(&mut builder).await;
            (builder, result)
        });

        let handles = tests.iter().cloned().map(|id| {
            let tx = tx.clone();
            tokio::spawn(async move {
                tx.start(&id).await.unwrap();
                tokio::task::yield_now().await;
                tx.finish(&id, Outcome::Passed, None).await.unwrap();
            })
        });
        for handle in join_all(handles).await {
            handle.unwrap();
        }

        tx.finish(&class, Outcome::Passed, None).await.unwrap();
        tx.finish(&root, Outcome::Passed, None).await.unwrap();
        drop(tx);

        let (builder, result) = consumer.await.unwrap();
        assert_eq!(result.unwrap(), 11);

        let tree = builder.complete().unwrap();
        let summary = tree.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 3);
        assert_eq!(tree.find(&class).unwrap().status, NodeStatus::Passed);
    }

    #[tokio::test]
    async fn test_slow_test_reported_as_timeout() {
        let (tx, rx) = channel(DEFAULT_CAPACITY);
        let root = Identifier::root();
        let slow = root.child(SegmentKind::Test, "slowTest").unwrap();

        let consumer = tokio::spawn(async move {
            let mut builder = TreeBuilder::new();
            let result = rx.drive(&mut builder).await;
            (builder, result)
        });

        tx.start(&root).await.unwrap();
        tx.start(&slow).await.unwrap();
        let body = tokio::time::sleep(Duration::from_secs(60));
        if tokio::time::timeout(Duration::from_millis(20), body)
            .await
            .is_err()
        {
            tx.timed_out(&slow).await.unwrap();
        }
        tx.finish(&root, Outcome::Passed, None).await.unwrap();
        drop(tx);

        let (builder, result) = consumer.await.unwrap();
        result.unwrap();

        let node = builder.tree().find(&slow).unwrap();
        assert_eq!(node.status, NodeStatus::Aborted);
        assert_eq!(
            node.failure.as_ref().and_then(|f| f.message.as_deref()),
            Some("timeout")
        );
        assert_eq!(builder.tree().root().status, NodeStatus::Aborted);
    }

    #[tokio::test]
    async fn test_rejected_event_closes_feed() {
        let (tx, rx) = channel(1);
        let leaf = Identifier::parse("Test:orphan").unwrap();

        let consumer = tokio::spawn(async move {
            let mut builder = TreeBuilder::new();
            let result = rx.drive(&mut builder).await;
            (builder, result)
        });

        // Finishing a node that never started is a producer bug
        tx.finish(&leaf, Outcome::Passed, None).await.unwrap();

        let (builder, result) = consumer.await.unwrap();
        let err = result.unwrap_err();
        assert_eq!(err.sequence_no, 1);
        assert_eq!(builder.aborted_at(), Some(1));
        assert!(tx.start(&leaf).await.is_err());
    }

    #[test]
    fn test_stream_numbers_in_arrival_order() {
        let (tx, rx) = channel(4);
        let root = Identifier::root();

        tokio_test::block_on(async {
            tx.start(&root).await.unwrap();
            tx.finish(&root, Outcome::Passed, None).await.unwrap();
        });
        drop(tx);

        let events: Vec<Event> = tokio_test::block_on(rx.into_stream().collect());
        let numbers: Vec<u64> = events.iter().map(|e| e.sequence_no).collect();
        assert_eq!(numbers, vec![1, 2]);
    }
}
