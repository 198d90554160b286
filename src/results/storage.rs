//! Run history storage
//!
//! Keeps the most recent outcomes of every leaf test in a JSON file so
//! flaky or slowing tests can be spotted across runs.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::aggregate::ResultTree;
use crate::models::NodeStatus;

/// Current history file format version
pub const HISTORY_VERSION: u32 = 1;

/// Runs kept per test unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// One recorded outcome of a leaf test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub duration_ms: u64,
    pub status: NodeStatus,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Statistics for a single test across the kept runs
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestStats {
    /// Number of kept runs
    pub runs: usize,

    pub passed: usize,

    /// Pass rate over runs that executed (0.0 - 100.0)
    pub pass_rate: f64,

    /// Average duration over runs that executed
    pub avg_duration_ms: u64,

    pub last_status: NodeStatus,
}

impl TestStats {
    /// Derive statistics from entries ordered oldest first
    pub fn from_entries(entries: &[HistoryEntry]) -> Option<Self> {
        let last = entries.last()?;
        let executed: Vec<_> = entries
            .iter()
            .filter(|e| e.status != NodeStatus::Skipped)
            .collect();
        let passed = executed
            .iter()
            .filter(|e| e.status == NodeStatus::Passed)
            .count();

        let (pass_rate, avg_duration_ms) = if executed.is_empty() {
            (0.0, 0)
        } else {
            let total: u64 = executed.iter().map(|e| e.duration_ms).sum();
            (
                passed as f64 / executed.len() as f64 * 100.0,
                total / executed.len() as u64,
            )
        };

        Some(Self {
            runs: entries.len(),
            passed,
            pass_rate,
            avg_duration_ms,
            last_status: last.status,
        })
    }

    /// Executed at least twice with mixed results
    pub fn is_flaky(&self) -> bool {
        self.passed > 0 && self.pass_rate < 100.0
    }
}

/// Storage of per-test run history keyed by identifier path
pub trait HistoryStore {
    /// Append the finalized leaves of `tree`; returns the number recorded
    fn record(&mut self, tree: &ResultTree, run_id: &str) -> usize;

    /// Kept entries for a test, oldest first
    fn entries(&self, path: &str) -> &[HistoryEntry];

    /// Identifier paths with at least one entry
    fn paths(&self) -> Vec<&str>;

    /// Persist pending changes
    fn save(&self) -> Result<()>;

    fn stats(&self, path: &str) -> Option<TestStats> {
        TestStats::from_entries(self.entries(path))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    #[serde(default)]
    tests: BTreeMap<String, Vec<HistoryEntry>>,
}

/// History store backed by a single JSON file
#[derive(Debug)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
    limit: usize,
    tests: BTreeMap<String, Vec<HistoryEntry>>,
}

impl JsonFileHistoryStore {
    /// Open a store, loading existing history if the file is present
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self {
            path: path.into(),
            limit: DEFAULT_HISTORY_LIMIT,
            tests: BTreeMap::new(),
        };
        if store.path.exists() {
            let loaded = store.load()?;
            debug!("Loaded history for {} tests", loaded);
        }
        Ok(store)
    }

    /// Keep at most `limit` runs per test
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        for entries in self.tests.values_mut() {
            trim(entries, self.limit);
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk, replacing in-memory entries
    pub fn load(&mut self) -> Result<usize> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open history file: {}", self.path.display()))?;
        let history: HistoryFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))?;

        if history.version > HISTORY_VERSION {
            bail!(
                "History file version {} is newer than supported version {}",
                history.version,
                HISTORY_VERSION
            );
        }

        self.tests = history.tests;
        for entries in self.tests.values_mut() {
            trim(entries, self.limit);
        }
        Ok(self.tests.len())
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn record(&mut self, tree: &ResultTree, run_id: &str) -> usize {
        let mut recorded = 0;
        for leaf in tree.leaves().into_iter().filter(|n| n.is_finalized()) {
            let entries = self.tests.entry(leaf.id.path()).or_default();
            entries.push(HistoryEntry {
                run_id: run_id.to_string(),
                duration_ms: leaf.duration_ms,
                status: leaf.status,
                finished_at: leaf.finished_at,
            });
            trim(entries, self.limit);
            recorded += 1;
        }
        debug!("Recorded {} results for run {}", recorded, run_id);
        recorded
    }

    fn entries(&self, path: &str) -> &[HistoryEntry] {
        self.tests.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    fn paths(&self) -> Vec<&str> {
        self.tests.keys().map(String::as_str).collect()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory: {}", parent.display())
                })?;
            }
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create history file: {}", self.path.display()))?;
        let history = HistoryFile {
            version: HISTORY_VERSION,
            tests: self.tests.clone(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &history)
            .context("Failed to write history")?;

        info!("Saved run history to {}", self.path.display());
        Ok(())
    }
}

fn trim(entries: &mut Vec<HistoryEntry>, limit: usize) {
    if entries.len() > limit {
        let excess = entries.len() - limit;
        entries.drain(..excess);
    }
}

/// Default history location under the user data directory
pub fn default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("test-rollup")
        .join("history.json")
}

/// Generate unique run ID
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}
