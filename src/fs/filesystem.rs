//! Filesystem instance
//!
//! [`GitFileSystem`] wraps one node cache, its status record and the snapshot it was opened
//! on behind a single lock. Paths are plain strings at this boundary and are parsed into
//! [`GitPath`] on every call.

use crate::config::FsConfig;
use crate::error::FsError;
use crate::fs::cache::NodeCache;
use crate::fs::node::{FileKind, NodeAttributes, NodeKind};
use crate::fs::path::GitPath;
use crate::fs::status::StatusProvider;
use crate::store::refs::branch_ref;
use crate::store::ObjectStore;
use crate::types::ObjectId;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Everything guarded by the instance lock.
pub(crate) struct FsState {
    pub(crate) cache: NodeCache,
    pub(crate) status: StatusProvider,
    /// Commit the instance was opened on or last committed.
    pub(crate) head: Option<ObjectId>,
    /// Full ref name the instance is attached to.
    pub(crate) branch: Option<String>,
    /// Tree the cache mirrors (as of open, last flush, or last merge).
    pub(crate) snapshot: Option<ObjectId>,
    /// Source of a conflicting merge, joined as second parent by the next commit.
    pub(crate) merge_parent: Option<ObjectId>,
    closed: bool,
}

impl FsState {
    /// Raise the status dirty flag if the cache holds unflushed changes.
    pub(crate) fn sync_dirty(&mut self) {
        if self.cache.is_dirty() {
            self.status.mark_dirty();
        }
    }
}

enum Origin {
    Empty,
    Branch(String),
    Commit(ObjectId),
    Tree(ObjectId),
}

/// Opens a [`GitFileSystem`] over a branch, a commit, a bare tree, or nothing at all.
pub struct FileSystemBuilder {
    store: Arc<dyn ObjectStore>,
    origin: Origin,
    config: FsConfig,
}

impl FileSystemBuilder {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            origin: Origin::Empty,
            config: FsConfig::default(),
        }
    }

    /// Attach to a branch. A branch that does not exist yet opens an empty root and is
    /// created by the first commit.
    pub fn with_branch(mut self, name: impl AsRef<str>) -> Self {
        self.origin = Origin::Branch(branch_ref(name.as_ref()));
        self
    }

    /// Open a detached instance on a commit.
    pub fn with_commit(mut self, commit: ObjectId) -> Self {
        self.origin = Origin::Commit(commit);
        self
    }

    /// Open a detached instance on a tree with no history.
    pub fn with_tree(mut self, tree: ObjectId) -> Self {
        self.origin = Origin::Tree(tree);
        self
    }

    pub fn with_config(mut self, config: FsConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<GitFileSystem, FsError> {
        let (branch, head, snapshot) = match self.origin {
            Origin::Empty => (None, None, None),
            Origin::Branch(name) => {
                let head = self.store.read_ref(&name)?;
                let snapshot = match head {
                    Some(commit) => Some(self.store.read_commit(&commit)?.tree),
                    None => None,
                };
                (Some(name), head, snapshot)
            }
            Origin::Commit(commit) => {
                let tree = self.store.read_commit(&commit)?.tree;
                (None, Some(commit), Some(tree))
            }
            Origin::Tree(tree) => {
                self.store.read_tree(&tree)?;
                (None, None, Some(tree))
            }
        };

        debug!(
            branch = branch.as_deref().unwrap_or("-"),
            head = ?head,
            snapshot = ?snapshot,
            "Opened file system"
        );

        Ok(GitFileSystem {
            store: Arc::clone(&self.store),
            config: self.config,
            state: Mutex::new(FsState {
                cache: NodeCache::new(self.store, snapshot),
                status: StatusProvider::new(),
                head,
                branch,
                snapshot,
                merge_parent: None,
                closed: false,
            }),
        })
    }
}

/// A mutable filesystem view over an immutable snapshot
///
/// Changes stay in memory until [`flush`](Self::flush) or [`commit`](Self::commit). All
/// calls on one instance are serialized by an internal lock; separate instances are
/// independent.
pub struct GitFileSystem {
    store: Arc<dyn ObjectStore>,
    config: FsConfig,
    state: Mutex<FsState>,
}

impl GitFileSystem {
    pub fn builder(store: Arc<dyn ObjectStore>) -> FileSystemBuilder {
        FileSystemBuilder::new(store)
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn config(&self) -> FsConfig {
        self.config
    }

    /// Lock the instance state, failing once the instance is closed.
    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, FsState>, FsError> {
        let state = self.state.lock();
        if state.closed {
            return Err(FsError::Closed);
        }
        Ok(state)
    }

    /// Run a mutation against the cache and mirror its dirty state into the status record.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut NodeCache) -> Result<T, FsError>,
    ) -> Result<T, FsError> {
        let mut state = self.lock_state()?;
        let result = op(&mut state.cache);
        state.sync_dirty();
        result
    }

    pub fn attributes(&self, path: &str) -> Result<NodeAttributes, FsError> {
        let path = GitPath::parse(path)?;
        self.lock_state()?.cache.attributes(&path)
    }

    pub fn exists(&self, path: &str) -> Result<bool, FsError> {
        let path = GitPath::parse(path)?;
        Ok(self.lock_state()?.cache.try_resolve(&path)?.is_some())
    }

    pub fn is_directory(&self, path: &str) -> Result<bool, FsError> {
        self.kind_matches(path, NodeKind::is_directory)
    }

    /// True for regular and executable files.
    pub fn is_file(&self, path: &str) -> Result<bool, FsError> {
        self.kind_matches(path, NodeKind::is_file)
    }

    pub fn is_symlink(&self, path: &str) -> Result<bool, FsError> {
        self.kind_matches(path, NodeKind::is_symlink)
    }

    fn kind_matches(&self, path: &str, check: fn(NodeKind) -> bool) -> Result<bool, FsError> {
        match self.attributes(path) {
            Ok(attrs) => Ok(check(attrs.kind)),
            Err(FsError::NoSuchFile(_)) | Err(FsError::NotADirectory(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Content of a file. Symlinks yield their target path.
    pub fn read(&self, path: &str) -> Result<Arc<[u8]>, FsError> {
        let path = GitPath::parse(path)?;
        self.lock_state()?.cache.read(&path)
    }

    pub fn read_to_string(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FsError::NotUtf8(path.to_string()))
    }

    /// Children of a directory as `(name, kind)` pairs in name order.
    pub fn list(&self, path: &str) -> Result<Vec<(String, NodeKind)>, FsError> {
        let path = GitPath::parse(path)?;
        self.lock_state()?.cache.list(&path)
    }

    /// Write a file, creating parent directories. An existing file keeps its kind.
    pub fn write(&self, path: &str, content: impl AsRef<[u8]>) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        let bytes: Arc<[u8]> = Arc::from(content.as_ref());
        self.mutate(|cache| {
            let kind = match cache.try_resolve(&path)? {
                Some(_) => match cache.attributes(&path)?.kind {
                    NodeKind::File(kind) => kind,
                    NodeKind::Directory => FileKind::Regular,
                },
                None => FileKind::Regular,
            };
            cache.write(&path, bytes, kind)
        })
    }

    /// Write a file with an explicit kind (regular, executable or symlink).
    pub fn write_with_kind(
        &self,
        path: &str,
        content: impl AsRef<[u8]>,
        kind: FileKind,
    ) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        let bytes: Arc<[u8]> = Arc::from(content.as_ref());
        self.mutate(|cache| cache.write(&path, bytes, kind))
    }

    /// Change a file's kind, keeping its content.
    pub fn set_file_kind(&self, path: &str, kind: FileKind) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        self.mutate(|cache| cache.set_file_kind(&path, kind))
    }

    pub fn create_directory(&self, path: &str) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        self.mutate(|cache| cache.create_directory(&path))
    }

    pub fn create_directories(&self, path: &str) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        self.mutate(|cache| cache.create_directories(&path))
    }

    /// Delete a file or a whole directory tree.
    pub fn delete(&self, path: &str) -> Result<(), FsError> {
        let path = GitPath::parse(path)?;
        self.mutate(|cache| cache.delete(&path))
    }

    /// Copy within this instance, honoring the configured overwrite policy.
    pub fn copy(&self, source: &str, target: &str) -> Result<(), FsError> {
        let source = GitPath::parse(source)?;
        let target = GitPath::parse(target)?;
        let policy = self.config.overwrite;
        self.mutate(|cache| cache.copy_within(&source, &target, policy))
    }

    pub fn move_node(&self, source: &str, target: &str) -> Result<(), FsError> {
        let source = GitPath::parse(source)?;
        let target = GitPath::parse(target)?;
        let policy = self.config.overwrite;
        self.mutate(|cache| cache.move_node(&source, &target, policy))
    }

    /// Write pending changes to the store and return the new snapshot tree id
    ///
    /// On failure the previous snapshot and dirty state are kept and the flush can be retried.
    /// The merge note is left in place.
    #[instrument(skip(self))]
    pub fn flush(&self) -> Result<ObjectId, FsError> {
        let mut state = self.lock_state()?;
        let tree = state.cache.flush()?;
        state.snapshot = Some(tree);
        state.status.mark_clean();
        Ok(tree)
    }

    /// Flush and record a commit on top of the current head
    ///
    /// After a conflicting merge the merge source becomes the second parent, and the merge
    /// note is consumed. The attached branch, if any, is advanced to the new commit.
    #[instrument(skip(self, message))]
    pub fn commit(&self, message: &str) -> Result<ObjectId, FsError> {
        let mut state = self.lock_state()?;
        let tree = state.cache.flush()?;

        let mut parents: Vec<ObjectId> = state.head.into_iter().collect();
        if let Some(source) = state.merge_parent {
            if !parents.contains(&source) {
                parents.push(source);
            }
        }

        let commit = self.store.commit(&tree, &parents, message)?;
        if let Some(branch) = &state.branch {
            self.store.update_ref(branch, &commit)?;
        }

        state.snapshot = Some(tree);
        state.head = Some(commit);
        state.merge_parent = None;
        state.status.mark_clean();
        state.status.take_merge_note();
        info!(commit = %commit, parents = parents.len(), "Committed file system");
        Ok(commit)
    }

    /// Release the node cache. Every later call fails with [`FsError::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.cache.reset(None);
            debug!("Closed file system");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Commit the instance was opened on or last committed.
    pub fn head(&self) -> Option<ObjectId> {
        self.state.lock().head
    }

    /// Full ref name of the attached branch.
    pub fn branch(&self) -> Option<String> {
        self.state.lock().branch.clone()
    }

    /// Tree the instance currently mirrors, ignoring unflushed changes.
    pub fn snapshot(&self) -> Option<ObjectId> {
        self.state.lock().snapshot
    }

    /// Lock and view the status record.
    pub fn status_provider(&self) -> Result<MappedMutexGuard<'_, StatusProvider>, FsError> {
        let state = self.lock_state()?;
        Ok(MutexGuard::map(state, |state| &mut state.status))
    }
}

impl std::fmt::Debug for GitFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GitFileSystem")
            .field("branch", &state.branch)
            .field("head", &state.head)
            .field("snapshot", &state.snapshot)
            .field("closed", &state.closed)
            .finish()
    }
}
