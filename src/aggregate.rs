use crate::models::Aggregate;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals shared by the workers of one scan
///
/// Each field is its own atomic, so adds never need a lock. The snapshot
/// consumes `self` and is therefore only reachable once every worker has
/// released its borrow.
#[derive(Debug, Default)]
pub struct Totals {
    rows: AtomicU64,
    bytes: AtomicU64,
    files: AtomicU64,
    failed: AtomicU64,
}

impl Totals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows(&self, rows: u64) {
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_files(&self, files: u64) {
        self.files.fetch_add(files, Ordering::Relaxed);
    }

    /// Fold in one successfully scanned file
    pub fn record(&self, rows: u64, size: u64) {
        self.add_rows(rows);
        self.add_bytes(size);
        self.add_files(1);
    }

    /// Count a matched file that contributed nothing
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Final totals and failure count
    pub fn into_parts(self) -> (Aggregate, u64) {
        let aggregate = Aggregate {
            rows: self.rows.into_inner(),
            bytes: self.bytes.into_inner(),
            files: self.files.into_inner(),
        };
        (aggregate, self.failed.into_inner())
    }

    pub fn into_aggregate(self) -> Aggregate {
        self.into_parts().0
    }
}
