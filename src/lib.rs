pub mod aggregate;
pub mod content;
pub mod error;
pub mod fs;
pub mod memory;
pub mod models;
pub mod pattern;
pub mod resolver;
pub mod scanner;

pub use aggregate::Totals;
pub use content::{AvroScanner, ContentFormat, ContentScanner, LineScanner, ParquetScanner};
pub use error::{ContentError, FileError, FsError, ResolveError, ScanError};
pub use fs::{EntryKind, FileStatus, LocalFs, RemoteFs};
pub use memory::MemoryFs;
pub use models::{Aggregate, ScanOptions, ScanReport, ScanTarget, Strategy, WorkItem};
pub use pattern::NamePattern;
pub use resolver::{PathResolver, Resolved};
pub use scanner::{scan_tree, TreeScanner};
