//! Remote filesystem client abstraction
//!
//! The engine only needs three operations from the store: `stat`, `open`
//! and a recursive `walk`. `LocalFs` implements them over a locally mounted
//! view of the remote namespace (NFS gateway, FUSE mount, or plain local
//! directories). Paths handed to and returned from the trait are always
//! remote paths; the mount root never leaks out.

use crate::error::{FsError, FsResult};
use jwalk::{Parallelism, WalkDir};
use std::fs;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Type of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Device, FIFO, socket or anything else
    Other,
}

impl EntryKind {
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        }
    }
}

/// What `stat` and `walk` report about an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub kind: EntryKind,

    /// Size in bytes (0 for directories)
    pub size: u64,
}

impl FileStatus {
    pub fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
        }
    }

    pub fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let kind = EntryKind::from_file_type(metadata.file_type());
        let size = if kind == EntryKind::Directory {
            0
        } else {
            metadata.len()
        };
        Self { kind, size }
    }

    pub fn is_regular(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Visitor invoked once per descendant during a walk
pub type WalkVisitor<'a> = dyn FnMut(&str, &FileStatus) -> ControlFlow<()> + 'a;

/// Client for the remote store
pub trait RemoteFs: Send + Sync {
    /// Status of `path`; `FsError::NotFound` if it does not exist
    fn stat(&self, path: &str) -> FsResult<FileStatus>;

    /// Open `path` for a full sequential read
    fn open(&self, path: &str) -> FsResult<Box<dyn Read + Send>>;

    /// Visit every descendant of `root` (not `root` itself) in unspecified
    /// order. A listing failure ends the walk with an error; a visitor
    /// returning `Break` ends it early with `Ok`.
    fn walk(&self, root: &str, visit: &mut WalkVisitor<'_>) -> FsResult<()>;
}

/// `RemoteFs` over a locally mounted namespace
#[derive(Debug, Clone)]
pub struct LocalFs {
    mount_root: PathBuf,
}

impl LocalFs {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    /// Local path backing a remote path
    pub fn local_path(&self, remote: &str) -> PathBuf {
        self.mount_root.join(remote.trim_start_matches('/'))
    }

    /// Remote path for a local path under the mount root
    pub fn remote_path(&self, local: &Path) -> String {
        match local.strip_prefix(&self.mount_root) {
            Ok(relative) => format!("/{}", relative.to_string_lossy()),
            Err(_) => local.to_string_lossy().to_string(),
        }
    }
}

impl RemoteFs for LocalFs {
    fn stat(&self, path: &str) -> FsResult<FileStatus> {
        fs::metadata(self.local_path(path))
            .map(|metadata| FileStatus::from_metadata(&metadata))
            .map_err(|e| FsError::from_io(path, e))
    }

    fn open(&self, path: &str) -> FsResult<Box<dyn Read + Send>> {
        let file = fs::File::open(self.local_path(path)).map_err(|e| FsError::from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn walk(&self, root: &str, visit: &mut WalkVisitor<'_>) -> FsResult<()> {
        let walker = WalkDir::new(self.local_path(root))
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1)
            .parallelism(Parallelism::Serial);

        for entry_result in walker {
            let entry = entry_result.map_err(|e| FsError::List {
                path: e
                    .path()
                    .map(|p| self.remote_path(p))
                    .unwrap_or_else(|| root.to_string()),
                reason: e.to_string(),
            })?;

            let local = entry.path();
            let remote = self.remote_path(&local);
            let kind = EntryKind::from_file_type(entry.file_type());

            let status = if kind == EntryKind::File {
                let metadata = entry.metadata().map_err(|e| FsError::List {
                    path: remote.clone(),
                    reason: e.to_string(),
                })?;
                FileStatus::file(metadata.len())
            } else {
                FileStatus { kind, size: 0 }
            };

            if visit(&remote, &status).is_break() {
                break;
            }
        }

        Ok(())
    }
}
