//! Run history module
//!
//! Persists per-test outcomes across runs.

mod storage;

pub use storage::{
    default_history_path, generate_run_id, HistoryEntry, HistoryStore, JsonFileHistoryStore,
    TestStats, DEFAULT_HISTORY_LIMIT, HISTORY_VERSION,
};
