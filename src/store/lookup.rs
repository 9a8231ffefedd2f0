//! Path lookups over committed trees
//!
//! Read-only helpers that walk stored trees directly, for callers that want to inspect a
//! snapshot without opening a filesystem instance over it.

use crate::error::StorageError;
use crate::fs::path::GitPath;
use crate::store::{FileMode, ObjectStore, TreeEntry};
use crate::types::ObjectId;

/// Entry at `path` within `tree`, or `None` if the path does not exist
///
/// The root has no entry of its own and yields `None`.
pub fn entry_at(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<Option<TreeEntry>, StorageError> {
    let mut current = *tree;
    let mut found = None;
    for name in path.components() {
        if let Some(TreeEntry { mode, .. }) = &found {
            if !mode.is_directory() {
                return Ok(None);
            }
        }
        let entries = store.read_tree(&current)?;
        match entries.into_iter().find(|e| &e.name == name) {
            Some(entry) => {
                current = entry.id;
                found = Some(entry);
            }
            None => return Ok(None),
        }
    }
    Ok(found)
}

pub fn exists(store: &dyn ObjectStore, tree: &ObjectId, path: &GitPath) -> Result<bool, StorageError> {
    Ok(path.is_root() || entry_at(store, tree, path)?.is_some())
}

pub fn object_id(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<Option<ObjectId>, StorageError> {
    if path.is_root() {
        return Ok(Some(*tree));
    }
    Ok(entry_at(store, tree, path)?.map(|e| e.id))
}

pub fn file_mode(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<Option<FileMode>, StorageError> {
    if path.is_root() {
        return Ok(Some(FileMode::Directory));
    }
    Ok(entry_at(store, tree, path)?.map(|e| e.mode))
}

pub fn is_directory(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<bool, StorageError> {
    Ok(file_mode(store, tree, path)? == Some(FileMode::Directory))
}

/// Regular or executable file.
pub fn is_file(store: &dyn ObjectStore, tree: &ObjectId, path: &GitPath) -> Result<bool, StorageError> {
    Ok(matches!(
        file_mode(store, tree, path)?,
        Some(FileMode::Regular | FileMode::Executable)
    ))
}

pub fn is_symlink(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<bool, StorageError> {
    Ok(file_mode(store, tree, path)? == Some(FileMode::Symlink))
}

/// Content of the file at `path`; `None` if absent or a directory.
pub fn read_file(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    path: &GitPath,
) -> Result<Option<Vec<u8>>, StorageError> {
    match entry_at(store, tree, path)? {
        Some(entry) if !entry.mode.is_directory() => Ok(Some(store.read_blob(&entry.id)?)),
        _ => Ok(None),
    }
}
