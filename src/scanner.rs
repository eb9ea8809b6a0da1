use crate::aggregate::Totals;
use crate::content::ContentScanner;
use crate::error::{FileError, Result, ScanError};
use crate::fs::{FileStatus, RemoteFs};
use crate::models::{Aggregate, ScanOptions, ScanReport, ScanTarget, Strategy, WorkItem};
use crate::pattern::NamePattern;
use crossbeam_channel::{bounded, Receiver};
use indicatif::{HumanBytes, HumanCount};
use std::ops::ControlFlow;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Walks a remote tree and counts rows, bytes and files of matching files
///
/// Holds no state between scans: every call to `scan` builds its own totals,
/// queue and workers.
pub struct TreeScanner<'a> {
    fs: &'a dyn RemoteFs,
    content: &'a dyn ContentScanner,
    options: ScanOptions,
}

fn work_item(pattern: &NamePattern, path: &str, status: &FileStatus) -> Option<WorkItem> {
    (status.is_regular() && pattern.matches_path(path)).then(|| WorkItem {
        path: path.to_string(),
        size: status.size,
    })
}

impl<'a> TreeScanner<'a> {
    pub fn new(fs: &'a dyn RemoteFs, content: &'a dyn ContentScanner, options: ScanOptions) -> Self {
        Self {
            fs,
            content,
            options,
        }
    }

    /// Scan a single file or every matching file below a directory
    pub fn scan(&self, target: &ScanTarget) -> Result<ScanReport> {
        let start = Instant::now();
        let root = target.root.as_str();

        info!("Starting {} scan of: {}", target.strategy, root);

        let status = self.fs.stat(root).map_err(|source| ScanError::RootStat {
            path: root.to_string(),
            source,
        })?;

        let (aggregate, failed_files) = if status.is_regular() {
            // A file root is scanned whatever the pattern says
            let rows = self.count_file(root)?;
            (Aggregate::new(rows, status.size, 1), 0)
        } else if status.is_dir() {
            info!("Glob pattern: {}", target.pattern.as_str());
            let totals = match target.strategy {
                Strategy::Sequential => self.scan_sequential(target)?,
                Strategy::Concurrent => self.scan_concurrent(target)?,
            };
            totals.into_parts()
        } else {
            return Err(ScanError::UnsupportedRoot {
                path: root.to_string(),
            });
        };

        let report = ScanReport {
            root: root.to_string(),
            strategy: target.strategy,
            aggregate,
            failed_files,
            duration_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            "Scan completed: {} rows in {} files, {} total",
            HumanCount(aggregate.rows),
            HumanCount(aggregate.files),
            HumanBytes(aggregate.bytes)
        );
        if failed_files > 0 {
            warn!("Skipped {} unreadable files", failed_files);
        }

        Ok(report)
    }

    /// Open one file and count its records
    fn count_file(&self, path: &str) -> std::result::Result<u64, FileError> {
        let mut reader = self.fs.open(path).map_err(FileError::Open)?;

        debug!(path, "Scanning");
        let rows = self
            .content
            .scan(&mut reader, self.options.buffer_size)
            .map_err(|source| FileError::Content {
                path: path.to_string(),
                source,
            })?;
        debug!(path, rows, "Finished scanning");

        Ok(rows)
    }

    /// Count one matched file into `totals`; failures are logged and skipped
    fn process(&self, item: &WorkItem, totals: &Totals) {
        match self.count_file(&item.path) {
            Ok(rows) => totals.record(rows, item.size),
            Err(e) => {
                warn!(path = %item.path, error = %e, "Unable to read file");
                totals.record_failure();
            }
        }
    }

    fn scan_sequential(&self, target: &ScanTarget) -> Result<Totals> {
        let totals = Totals::new();

        self.fs
            .walk(&target.root, &mut |path, status| {
                if let Some(item) = work_item(&target.pattern, path, status) {
                    self.process(&item, &totals);
                }
                ControlFlow::Continue(())
            })
            .map_err(ScanError::DirectoryList)?;

        Ok(totals)
    }

    fn scan_concurrent(&self, target: &ScanTarget) -> Result<Totals> {
        let totals = Totals::new();
        let num_workers = self.options.workers.max(1);
        let (tx, rx) = bounded::<WorkItem>(self.options.queue_capacity);

        info!(
            "Starting {} workers (queue capacity {})",
            num_workers, self.options.queue_capacity
        );

        thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(num_workers);
            let mut spawn_error = None;

            for id in 0..num_workers {
                let rx = rx.clone();
                let totals = &totals;
                let spawned = thread::Builder::new()
                    .name(format!("scan-worker-{}", id))
                    .spawn_scoped(scope, move || self.worker_loop(id, rx, totals));

                match spawned {
                    Ok(handle) => handles.push((id, handle)),
                    Err(source) => {
                        error!(worker = id, error = %source, "Failed to start worker");
                        spawn_error = Some(ScanError::WorkerSpawn { id, source });
                        break;
                    }
                }
            }
            drop(rx);

            let walk_result = if spawn_error.is_none() {
                let mut dispatched: u64 = 0;
                let result = self.fs.walk(&target.root, &mut |path, status| {
                    if let Some(item) = work_item(&target.pattern, path, status) {
                        // Blocks while the pool is saturated
                        if tx.send(item).is_err() {
                            return ControlFlow::Break(());
                        }
                        dispatched += 1;
                    }
                    ControlFlow::Continue(())
                });
                debug!(dispatched, "Walk finished");
                result
            } else {
                Ok(())
            };

            // Close the queue; workers drain what is left and exit
            drop(tx);

            let mut panicked = None;
            for (id, handle) in handles {
                if handle.join().is_err() {
                    error!(worker = id, "Worker panicked");
                    panicked.get_or_insert(id);
                }
            }

            if let Some(e) = spawn_error {
                return Err(e);
            }
            walk_result.map_err(ScanError::DirectoryList)?;
            match panicked {
                Some(id) => Err(ScanError::WorkerPanicked { id }),
                None => Ok(()),
            }
        })?;

        Ok(totals)
    }

    fn worker_loop(&self, id: usize, rx: Receiver<WorkItem>, totals: &Totals) {
        debug!(worker = id, "Worker starting");

        let mut processed: u64 = 0;
        for item in rx.iter() {
            self.process(&item, totals);
            processed += 1;
        }

        debug!(worker = id, processed, "Worker exiting");
    }
}

/// Scan with default options
pub fn scan_tree(
    fs: &dyn RemoteFs,
    content: &dyn ContentScanner,
    root: &str,
    pattern: &str,
    strategy: Strategy,
) -> Result<ScanReport> {
    let target = ScanTarget::new(root, pattern, strategy)?;
    TreeScanner::new(fs, content, ScanOptions::default()).scan(&target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::LineScanner;
    use crate::error::{ContentError, ContentResult};
    use crate::memory::MemoryFs;
    use std::io::Read;
    use std::time::Duration;

    /// Counts lines, but fails on files starting with "BAD" (after a delay
    /// for "SLOWBAD")
    struct FlakyScanner;

    impl ContentScanner for FlakyScanner {
        fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64> {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            if data.starts_with(b"SLOWBAD") {
                thread::sleep(Duration::from_millis(20));
                return Err(ContentError::Corrupt("slow bad file".into()));
            }
            if data.starts_with(b"BAD") {
                return Err(ContentError::Corrupt("bad file".into()));
            }
            LineScanner.scan(&mut data.as_slice(), buffer_size)
        }
    }

    /// Counts lines, panicking on files starting with "PANIC"
    struct PanickingScanner;

    impl ContentScanner for PanickingScanner {
        fn scan(&self, reader: &mut dyn Read, buffer_size: usize) -> ContentResult<u64> {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            if data.starts_with(b"PANIC") {
                panic!("scanner blew up");
            }
            LineScanner.scan(&mut data.as_slice(), buffer_size)
        }
    }

    fn create_test_tree() -> MemoryFs {
        let mut fs = MemoryFs::new();
        fs.add_file("/data/a.avro", "1\n2\n3\n")
            .add_file("/data/b.avro", "1\n")
            .add_file("/data/a.AVRO", "1\n2\n")
            .add_file("/data/a.avro.bak", "1\n2\n")
            .add_file("/data/day=1/c.avro", "1\n2\n3\n4\n")
            .add_file("/data/day=1/deep/d.avro", "x")
            .add_dir("/data/empty")
            .add_dir("/data/dir.avro")
            .add_symlink("/data/link.avro")
            .add_special("/data/pipe.avro");
        fs
    }

    fn options(workers: usize) -> ScanOptions {
        ScanOptions::with_workers(workers)
    }

    fn run(fs: &MemoryFs, root: &str, pattern: &str, strategy: Strategy) -> Result<ScanReport> {
        let target = ScanTarget::new(root, pattern, strategy).unwrap();
        TreeScanner::new(fs, &FlakyScanner, options(4)).scan(&target)
    }

    #[test]
    fn test_sequential_counts_matching_files() {
        let fs = create_test_tree();
        let report = run(&fs, "/data", "*.avro", Strategy::Sequential).unwrap();

        // a.avro (3, 6 bytes), b.avro (1, 2), c.avro (4, 8), d.avro (1, 1)
        assert_eq!(report.aggregate, Aggregate::new(9, 17, 4));
        assert_eq!(report.failed_files, 0);
    }

    #[test]
    fn test_strategies_agree() {
        let fs = create_test_tree();
        for pattern in ["*.avro", "*", "?.avro", "*.AVRO", "nothing"] {
            let seq = run(&fs, "/data", pattern, Strategy::Sequential).unwrap();
            let con = run(&fs, "/data", pattern, Strategy::Concurrent).unwrap();
            assert_eq!(seq.aggregate, con.aggregate, "pattern {}", pattern);
        }
    }

    #[test]
    fn test_file_root_ignores_pattern() {
        let fs = create_test_tree();
        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let report = run(&fs, "/data/a.AVRO", "*.avro", strategy).unwrap();
            assert_eq!(report.aggregate, Aggregate::new(2, 4, 1));
        }
    }

    #[test]
    fn test_file_root_failure_is_fatal() {
        let mut fs = create_test_tree();
        fs.add_file("/data/broken.avro", "BAD");

        let err = run(&fs, "/data/broken.avro", "*.avro", Strategy::Sequential).unwrap_err();
        assert!(matches!(err, ScanError::File(FileError::Content { .. })));
    }

    #[test]
    fn test_empty_directory_is_zero() {
        let fs = create_test_tree();
        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let report = run(&fs, "/data/empty", "*.avro", strategy).unwrap();
            assert_eq!(report.aggregate, Aggregate::default());

            let report = run(&fs, "/data", "*.parquet", strategy).unwrap();
            assert_eq!(report.aggregate, Aggregate::default());
        }
    }

    #[test]
    fn test_missing_root_is_error() {
        let fs = create_test_tree();
        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let err = run(&fs, "/nope", "*.avro", strategy).unwrap_err();
            assert!(matches!(err, ScanError::RootStat { ref source, .. } if source.is_not_found()));
        }
    }

    #[test]
    fn test_special_root_is_unsupported() {
        let fs = create_test_tree();
        let err = run(&fs, "/data/pipe.avro", "*", Strategy::Concurrent).unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedRoot { .. }));
    }

    #[test]
    fn test_one_failed_file_is_excluded() {
        let mut fs = create_test_tree();
        fs.add_file("/data/day=1/bad.avro", "BAD\n");

        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let report = run(&fs, "/data", "*.avro", strategy).unwrap();
            assert_eq!(report.aggregate, Aggregate::new(9, 17, 4));
            assert_eq!(report.failed_files, 1);
        }
    }

    #[test]
    fn test_open_failure_is_excluded() {
        let mut fs = create_test_tree();
        fs.fail_open("/data/b.avro");

        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let report = run(&fs, "/data", "*.avro", strategy).unwrap();
            assert_eq!(report.aggregate, Aggregate::new(8, 15, 3));
            assert_eq!(report.failed_files, 1);
        }
    }

    #[test]
    fn test_listing_failure_aborts_both_strategies() {
        let mut fs = create_test_tree();
        fs.fail_listing("/data/day=1");

        for strategy in [Strategy::Sequential, Strategy::Concurrent] {
            let err = run(&fs, "/data", "*.avro", strategy).unwrap_err();
            assert!(matches!(err, ScanError::DirectoryList(_)));
        }
    }

    #[test]
    fn test_every_dispatched_item_reports_once() {
        let mut fs = MemoryFs::new();
        for i in 0..64 {
            fs.add_file(&format!("/t/ok-{:02}.avro", i), "row\n");
        }
        // Sorted last, so these are the final items before the queue closes
        for i in 0..6 {
            fs.add_file(&format!("/t/zz-{}.avro", i), "SLOWBAD");
        }

        for workers in [1, 3, 8] {
            let mut opts = options(workers);
            opts.queue_capacity = 0;
            let target = ScanTarget::new("/t", "*.avro", Strategy::Concurrent).unwrap();
            let report = TreeScanner::new(&fs, &FlakyScanner, opts).scan(&target).unwrap();

            assert_eq!(report.aggregate, Aggregate::new(64, 256, 64));
            assert_eq!(report.failed_files, 6);
            assert_eq!(report.aggregate.files + report.failed_files, 70);
        }
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let mut fs = create_test_tree();
        fs.add_file("/data/boom.avro", "PANIC");

        let target = ScanTarget::new("/data", "*.avro", Strategy::Concurrent).unwrap();
        let err = TreeScanner::new(&fs, &PanickingScanner, options(2))
            .scan(&target)
            .unwrap_err();
        assert!(matches!(err, ScanError::WorkerPanicked { .. }));
    }

    #[test]
    fn test_scan_tree_defaults() {
        let fs = create_test_tree();
        let report = scan_tree(&fs, &LineScanner, "/data", "c.avro", Strategy::Concurrent).unwrap();
        assert_eq!(report.aggregate, Aggregate::new(4, 8, 1));

        let err = scan_tree(&fs, &LineScanner, "/data", "[", Strategy::Concurrent).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern { .. }));
    }
}
