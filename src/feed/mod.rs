//! Event feed adapters
//!
//! Sources that deliver lifecycle events to the tree builder: JSON Lines
//! files and an in-process ordered channel for concurrent executors.

mod channel;
mod reader;

pub use channel::{
    channel, drive_stream, EventReceiver, EventSender, FeedClosed, FeedItem, DEFAULT_CAPACITY,
};
pub use reader::{read_events, replay, EventReader};
