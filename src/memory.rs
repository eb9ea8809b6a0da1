//! In-memory `RemoteFs` for tests and benchmarks
//!
//! Entries live in a sorted map keyed by absolute path. Open and listing
//! failures can be injected per path.

use crate::error::{FsError, FsResult};
use crate::fs::{EntryKind, FileStatus, RemoteFs, WalkVisitor};
use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Read};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Vec<u8>>),
    Directory,
    Special(EntryKind),
}

#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: BTreeMap<String, Node>,
    failing_opens: HashSet<String>,
    failing_lists: HashSet<String>,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn is_descendant(path: &str, root: &str) -> bool {
    if root == "/" {
        path != "/"
    } else {
        path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/'
    }
}

impl MemoryFs {
    /// Empty tree holding only `/`
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::from([("/".to_string(), Node::Directory)]),
            failing_opens: HashSet::new(),
            failing_lists: HashSet::new(),
        }
    }

    fn add_parents(&mut self, path: &str) {
        let mut end = 0;
        while let Some(idx) = path[end + 1..].find('/') {
            end += idx + 1;
            self.nodes
                .entry(path[..end].to_string())
                .or_insert(Node::Directory);
        }
    }

    fn insert(&mut self, path: &str, node: Node) -> String {
        let path = normalize(path);
        self.add_parents(&path);
        self.nodes.insert(path.clone(), node);
        path
    }

    /// Add a regular file, creating parent directories
    pub fn add_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> &mut Self {
        self.insert(path, Node::File(Arc::new(contents.into())));
        self
    }

    /// Add an empty directory, creating parent directories
    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.insert(path, Node::Directory);
        self
    }

    /// Add a symlink (never followed)
    pub fn add_symlink(&mut self, path: &str) -> &mut Self {
        self.insert(path, Node::Special(EntryKind::Symlink));
        self
    }

    /// Add a device, FIFO or socket
    pub fn add_special(&mut self, path: &str) -> &mut Self {
        self.insert(path, Node::Special(EntryKind::Other));
        self
    }

    /// Make every `open` of `path` fail
    pub fn fail_open(&mut self, path: &str) -> &mut Self {
        self.failing_opens.insert(normalize(path));
        self
    }

    /// Make the walk fail when it reaches directory `path`
    pub fn fail_listing(&mut self, path: &str) -> &mut Self {
        self.failing_lists.insert(normalize(path));
        self
    }

    fn status_of(node: &Node) -> FileStatus {
        match node {
            Node::File(contents) => FileStatus::file(contents.len() as u64),
            Node::Directory => FileStatus::directory(),
            Node::Special(kind) => FileStatus {
                kind: *kind,
                size: 0,
            },
        }
    }

    fn listing_error(path: &str) -> FsError {
        FsError::List {
            path: path.to_string(),
            reason: "injected listing failure".to_string(),
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFs for MemoryFs {
    fn stat(&self, path: &str) -> FsResult<FileStatus> {
        let path = normalize(path);
        self.nodes
            .get(&path)
            .map(Self::status_of)
            .ok_or(FsError::NotFound { path })
    }

    fn open(&self, path: &str) -> FsResult<Box<dyn Read + Send>> {
        let path = normalize(path);
        if self.failing_opens.contains(&path) {
            return Err(FsError::Io {
                path,
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected open failure"),
            });
        }
        match self.nodes.get(&path) {
            Some(Node::File(contents)) => Ok(Box::new(Cursor::new(contents.as_ref().clone()))),
            Some(_) => Err(FsError::Io {
                path,
                source: std::io::Error::new(std::io::ErrorKind::Other, "not a regular file"),
            }),
            None => Err(FsError::NotFound { path }),
        }
    }

    fn walk(&self, root: &str, visit: &mut WalkVisitor<'_>) -> FsResult<()> {
        let root = normalize(root);
        if !self.nodes.contains_key(&root) {
            return Err(FsError::NotFound { path: root });
        }
        if self.failing_lists.contains(&root) {
            return Err(Self::listing_error(&root));
        }

        for (path, node) in self.nodes.range(root.clone()..) {
            if path == &root {
                continue;
            }
            if !path.starts_with(&root) {
                break;
            }
            if !is_descendant(path, &root) {
                continue;
            }
            if visit(path, &Self::status_of(node)).is_break() {
                return Ok(());
            }
            if matches!(node, Node::Directory) && self.failing_lists.contains(path) {
                return Err(Self::listing_error(path));
            }
        }

        Ok(())
    }
}
