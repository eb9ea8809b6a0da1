use crate::error::Result;
use crate::pattern::NamePattern;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default read buffer handed to content scanners
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Default glob pattern for directory scans
pub const DEFAULT_PATTERN: &str = "*.avro";

/// Totals produced by one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Records counted across all scanned files
    pub rows: u64,

    /// Sum of scanned file sizes in bytes
    pub bytes: u64,

    /// Number of files scanned successfully
    pub files: u64,
}

impl Aggregate {
    pub fn new(rows: u64, bytes: u64, files: u64) -> Self {
        Self { rows, bytes, files }
    }
}

/// A matched file handed from the walker to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Remote path of the file
    pub path: String,

    /// File size in bytes as reported by the walk
    pub size: u64,
}

/// How the subtree is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Scan files in-line on the walking thread
    Sequential,

    /// Hand files to a pool of worker threads
    Concurrent,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// One scan invocation: where to look, what to match, and how
#[derive(Debug, Clone)]
pub struct ScanTarget {
    /// File or directory to scan
    pub root: String,

    /// Applied to descendant base names when `root` is a directory
    pub pattern: NamePattern,

    pub strategy: Strategy,
}

impl ScanTarget {
    /// Build a target, validating the glob pattern
    pub fn new(root: impl Into<String>, pattern: &str, strategy: Strategy) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            pattern: NamePattern::new(pattern)?,
            strategy,
        })
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Number of worker threads for the concurrent strategy
    pub workers: usize,

    /// Bound of the hand-off queue (0 = rendezvous)
    pub queue_capacity: usize,

    /// Buffer size hint passed to the content scanner
    pub buffer_size: usize,
}

impl ScanOptions {
    /// Options with `workers` threads and a queue of matching depth
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            queue_capacity: workers,
            ..Default::default()
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        let workers = num_cpus::get();
        Self {
            workers,
            queue_capacity: workers,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Result of a completed scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Scan root as given
    pub root: String,

    pub strategy: Strategy,

    #[serde(flatten)]
    pub aggregate: Aggregate,

    /// Matched files that failed to open or decode; excluded from `aggregate`
    pub failed_files: u64,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

impl ScanReport {
    pub fn files_per_second(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.aggregate.files as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}
