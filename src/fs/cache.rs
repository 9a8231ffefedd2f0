//! Node cache: the mutable overlay over a backing snapshot
//!
//! Nodes are kept in a flat map keyed by [`NodeId`], with directories holding the ids of
//! their children and every node holding its parent id for dirty propagation. Directories
//! and files are loaded from the object store the first time a path walks through them.
//! Every mutation validates the whole path before touching any node, so a failed call leaves
//! the cache exactly as it was.

use crate::config::OverwritePolicy;
use crate::error::{FsError, StorageError};
use crate::fs::node::{
    CachedNode, DetachedNode, DirectoryData, FileData, FileKind, NodeAttributes, NodeContent,
    NodeId, NodeKind,
};
use crate::fs::path::GitPath;
use crate::store::{FileMode, ObjectStore, TreeEntry};
use crate::types::ObjectId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Where an insertion lands, computed before any mutation.
struct InsertPlan {
    /// Deepest existing directory on the way to the target.
    parent: NodeId,
    /// Directory names still to be created beneath `parent`.
    missing: Vec<String>,
    /// Node currently occupying the target path.
    existing: Option<NodeId>,
}

/// In-memory tree overlay for one filesystem instance
pub struct NodeCache {
    store: Arc<dyn ObjectStore>,
    nodes: HashMap<NodeId, CachedNode>,
    root: NodeId,
    next_id: u64,
}

impl NodeCache {
    /// Create a cache mirroring `tree`, or an empty root when there is no snapshot yet.
    pub fn new(store: Arc<dyn ObjectStore>, tree: Option<ObjectId>) -> Self {
        let mut cache = Self {
            store,
            nodes: HashMap::new(),
            root: NodeId(0),
            next_id: 0,
        };
        cache.reset(tree);
        cache
    }

    /// Drop every cached node and mirror `tree` afresh.
    pub fn reset(&mut self, tree: Option<ObjectId>) {
        self.nodes.clear();
        let content = match tree {
            Some(id) => NodeContent::Directory(DirectoryData::Unmaterialized(id)),
            None => NodeContent::Directory(DirectoryData::Materialized {
                children: BTreeMap::new(),
                origin: None,
            }),
        };
        self.root = self.alloc(None, content, false);
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True if anything changed since the last load or flush.
    pub fn is_dirty(&self) -> bool {
        self.nodes[&self.root].dirty
    }

    /// Number of nodes currently cached.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, parent: Option<NodeId>, content: NodeContent, dirty: bool) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            CachedNode {
                parent,
                dirty,
                content,
            },
        );
        id
    }

    /// Load a node's content from the backing store if it has not been loaded yet.
    pub fn materialize(&mut self, id: NodeId) -> Result<(), FsError> {
        let pending = match &self.nodes[&id].content {
            NodeContent::File {
                data: FileData::Unmaterialized(blob),
                ..
            } => *blob,
            NodeContent::Directory(DirectoryData::Unmaterialized(tree)) => *tree,
            _ => return Ok(()),
        };

        match self.nodes[&id].kind() {
            NodeKind::File(_) => {
                let bytes = self.store.read_blob(&pending)?;
                trace!(blob = %pending, size = bytes.len(), "Materialized file");
                if let Some(NodeContent::File { data, .. }) =
                    self.nodes.get_mut(&id).map(|node| &mut node.content)
                {
                    *data = FileData::Materialized {
                        bytes: bytes.into(),
                        origin: Some(pending),
                    };
                }
            }
            NodeKind::Directory => {
                let entries = self.store.read_tree(&pending)?;
                trace!(tree = %pending, entries = entries.len(), "Materialized directory");
                let mut children = BTreeMap::new();
                for entry in entries {
                    let child = self.alloc(Some(id), content_for_entry(&entry), false);
                    children.insert(entry.name, child);
                }
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.content = NodeContent::Directory(DirectoryData::Materialized {
                        children,
                        origin: Some(pending),
                    });
                }
            }
        }
        Ok(())
    }

    /// Children of a directory node (materializing it), or `None` for a file.
    fn children_of(&mut self, id: NodeId) -> Result<Option<&BTreeMap<String, NodeId>>, FsError> {
        self.materialize(id)?;
        match &self.nodes[&id].content {
            NodeContent::Directory(DirectoryData::Materialized { children, .. }) => {
                Ok(Some(children))
            }
            _ => Ok(None),
        }
    }

    fn child(&mut self, dir: NodeId, name: &str) -> Result<Option<NodeId>, FsError> {
        Ok(self
            .children_of(dir)?
            .and_then(|children| children.get(name).copied()))
    }

    /// Resolve a path to a node, loading directories along the way
    ///
    /// Symlinks are not followed.
    pub fn resolve(&mut self, path: &GitPath) -> Result<NodeId, FsError> {
        let mut current = self.root;
        for (depth, name) in path.components().iter().enumerate() {
            match self.children_of(current)? {
                None => return Err(FsError::NotADirectory(path.prefix(depth).to_string())),
                Some(children) => match children.get(name) {
                    Some(child) => current = *child,
                    None => return Err(FsError::NoSuchFile(path.to_string())),
                },
            }
        }
        Ok(current)
    }

    /// Like [`resolve`](Self::resolve), but a missing path is `Ok(None)`.
    pub fn try_resolve(&mut self, path: &GitPath) -> Result<Option<NodeId>, FsError> {
        match self.resolve(path) {
            Ok(id) => Ok(Some(id)),
            Err(FsError::NoSuchFile(_)) | Err(FsError::NotADirectory(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn attributes(&mut self, path: &GitPath) -> Result<NodeAttributes, FsError> {
        let id = self.resolve(path)?;
        let node = &self.nodes[&id];
        Ok(NodeAttributes {
            kind: node.kind(),
            object_id: node.clean_id(),
        })
    }

    /// Content of the file at `path`.
    pub fn read(&mut self, path: &GitPath) -> Result<Arc<[u8]>, FsError> {
        let id = self.resolve(path)?;
        if self.nodes[&id].kind().is_directory() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        self.materialize(id)?;
        match &self.nodes[&id].content {
            NodeContent::File {
                data: FileData::Materialized { bytes, .. },
                ..
            } => Ok(Arc::clone(bytes)),
            _ => Err(FsError::IsADirectory(path.to_string())),
        }
    }

    /// Names and kinds of a directory's children, in name order.
    pub fn list(&mut self, path: &GitPath) -> Result<Vec<(String, NodeKind)>, FsError> {
        let id = self.resolve(path)?;
        let children = self
            .children_of(id)?
            .ok_or_else(|| FsError::NotADirectory(path.to_string()))?
            .iter()
            .map(|(name, child)| (name.clone(), *child))
            .collect::<Vec<_>>();
        Ok(children
            .into_iter()
            .map(|(name, child)| (name, self.nodes[&child].kind()))
            .collect())
    }

    /// Replace (or create) the file at `path`, creating missing parent directories.
    pub fn write(&mut self, path: &GitPath, bytes: Arc<[u8]>, kind: FileKind) -> Result<(), FsError> {
        if path.is_root() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        let plan = self.plan_insert(path)?;
        if let Some(existing) = plan.existing {
            if self.nodes[&existing].kind().is_directory() {
                return Err(FsError::IsADirectory(path.to_string()));
            }
        }
        self.apply_insert(path, plan, DetachedNode::file(bytes, kind));
        Ok(())
    }

    /// Change the kind of an existing file without touching its content.
    pub fn set_file_kind(&mut self, path: &GitPath, kind: FileKind) -> Result<(), FsError> {
        let id = self.resolve(path)?;
        match self.nodes.get_mut(&id).map(|node| &mut node.content) {
            Some(NodeContent::File { kind: current, .. }) => {
                if *current == kind {
                    return Ok(());
                }
                *current = kind;
            }
            _ => return Err(FsError::IsADirectory(path.to_string())),
        }
        self.mark_dirty(id);
        Ok(())
    }

    /// Create one directory; its parent must already exist.
    pub fn create_directory(&mut self, path: &GitPath) -> Result<(), FsError> {
        let plan = self.plan_insert(path)?;
        if path.is_root() || plan.existing.is_some() {
            return Err(FsError::FileAlreadyExists(path.to_string()));
        }
        if !plan.missing.is_empty() {
            let parent = path.parent().unwrap_or_default();
            return Err(FsError::NoSuchFile(parent.to_string()));
        }
        self.apply_insert(path, plan, DetachedNode::Directory(BTreeMap::new()));
        Ok(())
    }

    /// Create a directory and any missing ancestors. An existing directory is accepted.
    pub fn create_directories(&mut self, path: &GitPath) -> Result<(), FsError> {
        if path.is_root() {
            return Ok(());
        }
        let plan = self.plan_insert(path)?;
        match plan.existing {
            Some(existing) if self.nodes[&existing].kind().is_directory() => Ok(()),
            Some(_) => Err(FsError::FileAlreadyExists(path.to_string())),
            None => {
                self.apply_insert(path, plan, DetachedNode::Directory(BTreeMap::new()));
                Ok(())
            }
        }
    }

    /// Remove the node at `path` together with everything beneath it.
    pub fn delete(&mut self, path: &GitPath) -> Result<(), FsError> {
        if path.is_root() {
            return Err(FsError::InvalidPath(
                "cannot delete the root directory".to_string(),
            ));
        }
        let id = self.resolve(path)?;
        let Some(parent) = self.nodes[&id].parent else {
            return Err(FsError::InvalidPath(path.to_string()));
        };
        if let Some(NodeContent::Directory(DirectoryData::Materialized { children, .. })) =
            self.nodes.get_mut(&parent).map(|node| &mut node.content)
        {
            if let Some(name) = path.file_name() {
                children.remove(name);
            }
        }
        self.drop_subtree(id);
        self.mark_dirty(parent);
        Ok(())
    }

    /// Lift the subtree at `path` out of the cache
    ///
    /// With `portable` set every file is materialized and every reference into the backing
    /// store is dropped, so the result can be inserted into a cache over another store.
    pub fn detach(&mut self, path: &GitPath, portable: bool) -> Result<DetachedNode, FsError> {
        let id = self.resolve(path)?;
        self.detach_node(id, portable)
    }

    fn detach_node(&mut self, id: NodeId, portable: bool) -> Result<DetachedNode, FsError> {
        if portable {
            self.materialize(id)?;
        }
        let node = &self.nodes[&id];
        if !portable {
            if let (NodeKind::Directory, Some(tree)) = (node.kind(), node.clean_id()) {
                return Ok(DetachedNode::Tree(tree));
            }
        }
        match &node.content {
            NodeContent::File { kind, data } => {
                let data = match data {
                    FileData::Materialized { bytes, .. } if portable => FileData::Materialized {
                        bytes: Arc::clone(bytes),
                        origin: None,
                    },
                    other => other.clone(),
                };
                Ok(DetachedNode::File { kind: *kind, data })
            }
            NodeContent::Directory(DirectoryData::Unmaterialized(tree)) => {
                Ok(DetachedNode::Tree(*tree))
            }
            NodeContent::Directory(DirectoryData::Materialized { children, .. }) => {
                let children: Vec<(String, NodeId)> = children
                    .iter()
                    .map(|(name, child)| (name.clone(), *child))
                    .collect();
                let mut detached = BTreeMap::new();
                for (name, child) in children {
                    detached.insert(name, self.detach_node(child, portable)?);
                }
                Ok(DetachedNode::Directory(detached))
            }
        }
    }

    /// Place a detached subtree at `path`, creating missing parent directories.
    pub fn insert(
        &mut self,
        path: &GitPath,
        node: DetachedNode,
        policy: OverwritePolicy,
    ) -> Result<(), FsError> {
        if path.is_root() {
            return Err(FsError::InvalidPath(
                "cannot replace the root directory".to_string(),
            ));
        }
        let plan = self.plan_insert(path)?;
        if plan.existing.is_some() && policy == OverwritePolicy::Reject {
            return Err(FsError::FileAlreadyExists(path.to_string()));
        }
        self.apply_insert(path, plan, node);
        Ok(())
    }

    /// Copy `source` to `target` within this cache. File content is shared, not duplicated.
    pub fn copy_within(
        &mut self,
        source: &GitPath,
        target: &GitPath,
        policy: OverwritePolicy,
    ) -> Result<(), FsError> {
        let detached = self.detach(source, false)?;
        self.insert(target, detached, policy)
    }

    /// Move `source` to `target`. The target is validated before the source is removed.
    pub fn move_node(
        &mut self,
        source: &GitPath,
        target: &GitPath,
        policy: OverwritePolicy,
    ) -> Result<(), FsError> {
        if source == target {
            self.resolve(source)?;
            return Ok(());
        }
        if source.is_root() || target.starts_with(source) {
            return Err(FsError::InvalidPath(format!(
                "cannot move {} into {}",
                source, target
            )));
        }
        let detached = self.detach(source, false)?;
        let plan = self.plan_insert(target)?;
        if plan.existing.is_some() && policy == OverwritePolicy::Reject {
            return Err(FsError::FileAlreadyExists(target.to_string()));
        }
        self.delete(source)?;
        self.insert(target, detached, OverwritePolicy::Replace)
    }

    /// Walk as far as the target's parent exists, without mutating anything.
    fn plan_insert(&mut self, path: &GitPath) -> Result<InsertPlan, FsError> {
        let components = path.components();
        let mut current = self.root;
        let Some((last, parents)) = components.split_last() else {
            return Ok(InsertPlan {
                parent: current,
                missing: Vec::new(),
                existing: Some(current),
            });
        };

        for (depth, name) in parents.iter().enumerate() {
            let children = self
                .children_of(current)?
                .ok_or_else(|| FsError::NotADirectory(path.prefix(depth).to_string()))?;
            match children.get(name).copied() {
                Some(child) => {
                    if !self.nodes[&child].kind().is_directory() {
                        return Err(FsError::NotADirectory(path.prefix(depth + 1).to_string()));
                    }
                    current = child;
                }
                None => {
                    return Ok(InsertPlan {
                        parent: current,
                        missing: parents[depth..].to_vec(),
                        existing: None,
                    });
                }
            }
        }

        let existing = self.child(current, last)?;
        Ok(InsertPlan {
            parent: current,
            missing: Vec::new(),
            existing,
        })
    }

    /// Carry out a validated plan. Cannot fail: every directory on the way is materialized.
    fn apply_insert(&mut self, path: &GitPath, plan: InsertPlan, node: DetachedNode) {
        let Some(name) = path.file_name() else {
            return;
        };
        let mut parent = plan.parent;
        for dir_name in plan.missing {
            let dir = self.build(parent, DetachedNode::Directory(BTreeMap::new()));
            self.link_child(parent, dir_name, dir);
            parent = dir;
        }
        if let Some(existing) = plan.existing {
            self.drop_subtree(existing);
        }
        let child = self.build(parent, node);
        self.link_child(parent, name.to_string(), child);
        self.mark_dirty(parent);
        debug!(path = %path, "Inserted node");
    }

    fn link_child(&mut self, parent: NodeId, name: String, child: NodeId) {
        if let Some(NodeContent::Directory(DirectoryData::Materialized { children, .. })) =
            self.nodes.get_mut(&parent).map(|node| &mut node.content)
        {
            children.insert(name, child);
        }
    }

    /// Allocate nodes for a detached subtree under `parent`.
    fn build(&mut self, parent: NodeId, node: DetachedNode) -> NodeId {
        match node {
            DetachedNode::File { kind, data } => {
                let dirty = matches!(data, FileData::Materialized { origin: None, .. });
                self.alloc(Some(parent), NodeContent::File { kind, data }, dirty)
            }
            DetachedNode::Tree(tree) => self.alloc(
                Some(parent),
                NodeContent::Directory(DirectoryData::Unmaterialized(tree)),
                false,
            ),
            DetachedNode::Directory(entries) => {
                let dir = self.alloc(
                    Some(parent),
                    NodeContent::Directory(DirectoryData::Materialized {
                        children: BTreeMap::new(),
                        origin: None,
                    }),
                    true,
                );
                for (name, entry) in entries {
                    let child = self.build(dir, entry);
                    self.link_child(dir, name, child);
                }
                dir
            }
        }
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                if let NodeContent::Directory(DirectoryData::Materialized { children, .. }) =
                    node.content
                {
                    pending.extend(children.into_values());
                }
            }
        }
    }

    /// Flag a node and all its ancestors dirty.
    fn mark_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(next) = current {
            let Some(node) = self.nodes.get_mut(&next) else {
                break;
            };
            if node.dirty && next != id {
                break;
            }
            node.dirty = true;
            current = node.parent;
        }
    }

    /// Write every dirty node to the store and return the new root tree id
    ///
    /// Unchanged subtrees are referenced by their existing id. Dirty flags are cleared only
    /// once every object has been written, so a failed flush can simply be retried.
    #[instrument(skip(self))]
    pub fn flush(&mut self) -> Result<ObjectId, FsError> {
        let mut written = Vec::new();
        let (root_tree, _) = self.persist(self.root, &mut written)?;
        let count = written.len();
        for (id, object) in written {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.dirty = false;
            match &mut node.content {
                NodeContent::File {
                    data: FileData::Materialized { origin, .. },
                    ..
                }
                | NodeContent::Directory(DirectoryData::Materialized { origin, .. }) => {
                    *origin = Some(object);
                }
                _ => {}
            }
        }
        debug!(root = %root_tree, written = count, "Flushed node cache");
        Ok(root_tree)
    }

    fn persist(
        &self,
        id: NodeId,
        written: &mut Vec<(NodeId, ObjectId)>,
    ) -> Result<(ObjectId, FileMode), StorageError> {
        let node = &self.nodes[&id];
        let mode = match node.kind() {
            NodeKind::File(kind) => kind.mode(),
            NodeKind::Directory => FileMode::Directory,
        };
        if let Some(clean) = node.clean_id() {
            return Ok((clean, mode));
        }

        let object = match &node.content {
            NodeContent::File { data, .. } => match data {
                FileData::Unmaterialized(blob) => *blob,
                FileData::Materialized { bytes, .. } => self.store.write_blob(bytes)?,
            },
            NodeContent::Directory(DirectoryData::Unmaterialized(tree)) => *tree,
            NodeContent::Directory(DirectoryData::Materialized { children, .. }) => {
                let mut entries = Vec::with_capacity(children.len());
                for (name, child) in children {
                    let (child_id, child_mode) = self.persist(*child, written)?;
                    entries.push(TreeEntry::new(name.clone(), child_mode, child_id));
                }
                self.store.write_tree(&entries)?
            }
        };
        written.push((id, object));
        Ok((object, mode))
    }
}

fn content_for_entry(entry: &TreeEntry) -> NodeContent {
    match FileKind::from_mode(entry.mode) {
        Some(kind) => NodeContent::File {
            kind,
            data: FileData::Unmaterialized(entry.id),
        },
        None => NodeContent::Directory(DirectoryData::Unmaterialized(entry.id)),
    }
}
