//! Cached filesystem nodes
//!
//! A node is either still a reference into the backing snapshot (`Unmaterialized`) or has had
//! its content loaded into memory (`Materialized`). File bytes are shared behind an `Arc` so
//! copies stay cheap until one side is rewritten.

use crate::store::FileMode;
use crate::types::ObjectId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handle of a node inside one [`NodeCache`](crate::fs::cache::NodeCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

/// Kind of a file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileKind {
    #[default]
    Regular,
    Executable,
    Symlink,
}

impl FileKind {
    pub fn mode(self) -> FileMode {
        match self {
            FileKind::Regular => FileMode::Regular,
            FileKind::Executable => FileMode::Executable,
            FileKind::Symlink => FileMode::Symlink,
        }
    }

    /// File kind for a tree entry mode; `None` for directories.
    pub fn from_mode(mode: FileMode) -> Option<Self> {
        match mode {
            FileMode::Regular => Some(FileKind::Regular),
            FileMode::Executable => Some(FileKind::Executable),
            FileMode::Symlink => Some(FileKind::Symlink),
            FileMode::Directory => None,
        }
    }

    pub fn is_executable(self) -> bool {
        self == FileKind::Executable
    }

    pub fn is_symlink(self) -> bool {
        self == FileKind::Symlink
    }
}

/// What a path resolves to, without dereferencing symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File(FileKind),
    Directory,
}

impl NodeKind {
    pub fn is_directory(self) -> bool {
        self == NodeKind::Directory
    }

    pub fn is_file(self) -> bool {
        matches!(self, NodeKind::File(FileKind::Regular | FileKind::Executable))
    }

    pub fn is_symlink(self) -> bool {
        self == NodeKind::File(FileKind::Symlink)
    }
}

/// Publicly visible facts about a resolved node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttributes {
    pub kind: NodeKind,
    /// Id of the stored object backing this node, if it is unmodified.
    pub object_id: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub enum FileData {
    Unmaterialized(ObjectId),
    Materialized {
        bytes: Arc<[u8]>,
        /// Blob this content was loaded from; cleared once rewritten.
        origin: Option<ObjectId>,
    },
}

#[derive(Debug, Clone)]
pub enum DirectoryData {
    Unmaterialized(ObjectId),
    Materialized {
        children: BTreeMap<String, NodeId>,
        /// Tree this listing was loaded from or last flushed to.
        origin: Option<ObjectId>,
    },
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    File { kind: FileKind, data: FileData },
    Directory(DirectoryData),
}

/// One entry of the node cache
///
/// `parent` is only followed upwards for dirty propagation; ownership runs from the
/// parent's `children` map down.
#[derive(Debug, Clone)]
pub struct CachedNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) dirty: bool,
    pub(crate) content: NodeContent,
}

impl CachedNode {
    pub(crate) fn kind(&self) -> NodeKind {
        match &self.content {
            NodeContent::File { kind, .. } => NodeKind::File(*kind),
            NodeContent::Directory(_) => NodeKind::Directory,
        }
    }

    /// Backing object id, if the node is unmodified since load or last flush.
    pub(crate) fn clean_id(&self) -> Option<ObjectId> {
        if self.dirty {
            return None;
        }
        match &self.content {
            NodeContent::File { data, .. } => match data {
                FileData::Unmaterialized(id) => Some(*id),
                FileData::Materialized { origin, .. } => *origin,
            },
            NodeContent::Directory(data) => match data {
                DirectoryData::Unmaterialized(id) => Some(*id),
                DirectoryData::Materialized { origin, .. } => *origin,
            },
        }
    }
}

/// A subtree lifted out of a cache, ready to be inserted elsewhere
///
/// `Tree` and unmaterialized `File` data refer to objects in the store the subtree came
/// from, so they may only be inserted into a cache over that same store. Detaching for
/// another instance materializes everything first.
#[derive(Debug, Clone)]
pub enum DetachedNode {
    File { kind: FileKind, data: FileData },
    Tree(ObjectId),
    Directory(BTreeMap<String, DetachedNode>),
}

impl DetachedNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            DetachedNode::File { kind, .. } => NodeKind::File(*kind),
            DetachedNode::Tree(_) | DetachedNode::Directory(_) => NodeKind::Directory,
        }
    }

    /// A new file holding `bytes`.
    pub fn file(bytes: impl Into<Arc<[u8]>>, kind: FileKind) -> Self {
        DetachedNode::File {
            kind,
            data: FileData::Materialized {
                bytes: bytes.into(),
                origin: None,
            },
        }
    }

    /// A file referring to an existing blob.
    pub fn blob(id: ObjectId, kind: FileKind) -> Self {
        DetachedNode::File {
            kind,
            data: FileData::Unmaterialized(id),
        }
    }
}
