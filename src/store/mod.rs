//! Object Store
//!
//! Content-addressed storage for blobs, trees and commits, plus the small ref namespace the
//! filesystem needs to find branch heads. The filesystem only ever talks to the store through
//! [`ObjectStore`]; concrete backends implement four primitives and inherit the typed
//! read/write helpers.

pub mod hasher;
pub mod lookup;
pub mod memory;
pub mod persistence;
pub mod refs;

pub use memory::MemoryObjectStore;
pub use persistence::SledObjectStore;

use crate::error::StorageError;
use crate::types::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

/// Mode of a tree entry, mirroring git's octal modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Directory,
}

impl FileMode {
    pub fn to_octal(self) -> u32 {
        match self {
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Directory => 0o040000,
        }
    }

    pub fn from_octal(mode: u32) -> Option<Self> {
        match mode {
            0o100644 => Some(FileMode::Regular),
            0o100755 => Some(FileMode::Executable),
            0o120000 => Some(FileMode::Symlink),
            0o040000 => Some(FileMode::Directory),
            _ => None,
        }
    }

    pub fn is_directory(self) -> bool {
        self == FileMode::Directory
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}", self.to_octal())
    }
}

/// One named entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            mode,
            id,
        }
    }
}

/// A commit object: a root tree plus its history links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub message: String,
    /// Seconds since the Unix epoch, UTC.
    pub timestamp: i64,
}

/// Everything a backend persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredObject {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit(Commit),
}

impl StoredObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            StoredObject::Blob(_) => "blob",
            StoredObject::Tree(_) => "tree",
            StoredObject::Commit(_) => "commit",
        }
    }

    /// Content address of this object.
    pub fn id(&self) -> ObjectId {
        match self {
            StoredObject::Blob(content) => hasher::compute_blob_id(content),
            StoredObject::Tree(entries) => hasher::compute_tree_id(entries),
            StoredObject::Commit(commit) => hasher::compute_commit_id(commit),
        }
    }
}

/// Returns true if `name` may appear as a tree entry name.
pub fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

/// Content-addressed object store interface
///
/// Backends provide raw object and ref access; the typed helpers are shared.
pub trait ObjectStore: Send + Sync {
    fn get_object(&self, id: &ObjectId) -> Result<Option<StoredObject>, StorageError>;

    /// Persist an object and return its id. Storing an existing object is a no-op.
    fn put_object(&self, object: &StoredObject) -> Result<ObjectId, StorageError>;

    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError>;

    fn update_ref(&self, name: &str, id: &ObjectId) -> Result<(), StorageError>;

    fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>, StorageError> {
        match self.require(id)? {
            StoredObject::Blob(content) => Ok(content),
            other => Err(unexpected(id, "blob", &other)),
        }
    }

    fn read_tree(&self, id: &ObjectId) -> Result<Vec<TreeEntry>, StorageError> {
        match self.require(id)? {
            StoredObject::Tree(entries) => Ok(entries),
            other => Err(unexpected(id, "tree", &other)),
        }
    }

    fn read_commit(&self, id: &ObjectId) -> Result<Commit, StorageError> {
        match self.require(id)? {
            StoredObject::Commit(commit) => Ok(commit),
            other => Err(unexpected(id, "commit", &other)),
        }
    }

    fn write_blob(&self, content: &[u8]) -> Result<ObjectId, StorageError> {
        self.put_object(&StoredObject::Blob(content.to_vec()))
    }

    /// Write a tree. Entries are sorted by name; names must be valid and unique.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<ObjectId, StorageError> {
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in sorted.windows(2) {
            if pair[0].name == pair[1].name {
                return Err(StorageError::InvalidTree(format!(
                    "duplicate entry name '{}'",
                    pair[0].name
                )));
            }
        }
        if let Some(bad) = sorted.iter().find(|e| !is_valid_entry_name(&e.name)) {
            return Err(StorageError::InvalidTree(format!(
                "invalid entry name '{}'",
                bad.name
            )));
        }
        self.put_object(&StoredObject::Tree(sorted))
    }

    fn commit(
        &self,
        tree: &ObjectId,
        parents: &[ObjectId],
        message: &str,
    ) -> Result<ObjectId, StorageError> {
        self.put_object(&StoredObject::Commit(Commit {
            tree: *tree,
            parents: parents.to_vec(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }))
    }

    /// Nearest common ancestor of two commits, or `None` for unrelated histories.
    fn merge_base(&self, a: &ObjectId, b: &ObjectId) -> Result<Option<ObjectId>, StorageError> {
        let ancestors_of_a = self.ancestors(a)?;
        let mut queue = VecDeque::from([*b]);
        let mut seen = HashSet::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if ancestors_of_a.contains(&id) {
                return Ok(Some(id));
            }
            queue.extend(self.read_commit(&id)?.parents);
        }
        Ok(None)
    }

    /// All commits reachable from `start`, including itself.
    fn ancestors(&self, start: &ObjectId) -> Result<HashSet<ObjectId>, StorageError> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*start]);
        while let Some(id) = queue.pop_front() {
            if seen.insert(id) {
                queue.extend(self.read_commit(&id)?.parents);
            }
        }
        Ok(seen)
    }

    #[doc(hidden)]
    fn require(&self, id: &ObjectId) -> Result<StoredObject, StorageError> {
        self.get_object(id)?
            .ok_or(StorageError::ObjectNotFound(*id))
    }
}

fn unexpected(id: &ObjectId, expected: &'static str, actual: &StoredObject) -> StorageError {
    StorageError::UnexpectedKind {
        id: *id,
        expected,
        actual: actual.kind_name(),
    }
}
