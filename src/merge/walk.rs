//! Recursive three-way tree walk
//!
//! Zippers through the sorted entries of base, ours and theirs one directory level at a
//! time. The output is a list of edits relative to ours, so applying it to a cache that
//! mirrors ours yields the merged tree.

use crate::config::OverwritePolicy;
use crate::error::{FsError, StorageError};
use crate::fs::cache::NodeCache;
use crate::fs::node::{DetachedNode, FileKind};
use crate::fs::path::GitPath;
use crate::merge::change::{changes_to_merge, resolve_axis};
use crate::merge::conflict::{format_conflict, is_binary};
use crate::merge::types::{ChangeMerge, Conflict, ConflictKind, EntryState};
use crate::store::{FileMode, ObjectStore};
use crate::types::ObjectId;
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::sync::Arc;
use tracing::trace;

/// One edit to apply on top of ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Place a stored file or tree at the path.
    Take { path: GitPath, entry: EntryState },
    /// Remove the path.
    Remove { path: GitPath },
    /// Write a synthesized file (conflict markers).
    Write {
        path: GitPath,
        content: Vec<u8>,
        kind: FileKind,
    },
}

/// Edits and conflicts produced by a tree walk.
#[derive(Debug, Default)]
pub struct TreeMerge {
    pub resolutions: Vec<Resolution>,
    pub conflicts: Vec<Conflict>,
}

/// Walks three trees and collects a [`TreeMerge`].
pub struct TreeMerger<'a> {
    store: &'a dyn ObjectStore,
    ours_name: &'a str,
    theirs_name: &'a str,
    output: TreeMerge,
}

impl<'a> TreeMerger<'a> {
    /// `ours_name` and `theirs_name` label the conflict marker lines.
    pub fn new(store: &'a dyn ObjectStore, ours_name: &'a str, theirs_name: &'a str) -> Self {
        Self {
            store,
            ours_name,
            theirs_name,
            output: TreeMerge::default(),
        }
    }

    /// Merge three root trees.
    pub fn merge(
        mut self,
        base: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<TreeMerge, StorageError> {
        self.merge_directory(&GitPath::root(), Some(base), Some(ours), Some(theirs))?;
        Ok(self.output)
    }

    fn entries(&self, tree: Option<ObjectId>) -> Result<Vec<(String, EntryState)>, StorageError> {
        match tree {
            Some(id) => Ok(self
                .store
                .read_tree(&id)?
                .iter()
                .map(|entry| (entry.name.clone(), EntryState::from(entry)))
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Merge one directory level. Returns whether the merged directory has any entries.
    fn merge_directory(
        &mut self,
        path: &GitPath,
        base: Option<ObjectId>,
        ours: Option<ObjectId>,
        theirs: Option<ObjectId>,
    ) -> Result<bool, StorageError> {
        let mut base_list = self.entries(base)?.into_iter().peekable();
        let mut ours_list = self.entries(ours)?.into_iter().peekable();
        let mut theirs_list = self.entries(theirs)?.into_iter().peekable();
        let mut non_empty = false;

        loop {
            let Some(name) = min_name(&mut base_list, &mut ours_list, &mut theirs_list) else {
                break;
            };
            let base_entry = take_if_named(&mut base_list, &name);
            let ours_entry = take_if_named(&mut ours_list, &name);
            let theirs_entry = take_if_named(&mut theirs_list, &name);

            let child = path
                .join(&name)
                .map_err(|e| StorageError::InvalidTree(e.to_string()))?;
            let kept = self.merge_entry(&child, base_entry, ours_entry, theirs_entry)?;
            non_empty |= kept;
        }

        Ok(non_empty)
    }

    /// Merge one name. Returns whether anything remains at `path` afterwards.
    fn merge_entry(
        &mut self,
        path: &GitPath,
        base: EntryState,
        ours: EntryState,
        theirs: EntryState,
    ) -> Result<bool, StorageError> {
        let action = changes_to_merge(&base, &ours, &theirs);
        trace!(path = %path, action = ?action, "Merge action");

        match action {
            ChangeMerge::TakeOurs => Ok(!ours.is_none()),
            ChangeMerge::TakeTheirs => {
                self.replace(path, &ours, theirs);
                Ok(!theirs.is_none())
            }
            ChangeMerge::TakeFile { mode, id } => {
                self.replace(path, &ours, EntryState::File { mode, id });
                Ok(true)
            }
            ChangeMerge::MergeDirectories {
                base,
                ours: ours_dir,
                theirs: theirs_dir,
            } => {
                let kept = self.merge_directory(path, base, ours_dir, theirs_dir)?;
                if !kept && ours_dir.is_some() {
                    self.output.resolutions.push(Resolution::Remove { path: path.clone() });
                }
                Ok(kept)
            }
            ChangeMerge::Conflict(kind) => self.conflict(path, kind, base, ours, theirs),
        }
    }

    /// Record an edit turning `ours` into `entry`, if they differ.
    fn replace(&mut self, path: &GitPath, ours: &EntryState, entry: EntryState) {
        if *ours == entry {
            return;
        }
        let resolution = match entry {
            EntryState::None => Resolution::Remove { path: path.clone() },
            entry => Resolution::Take {
                path: path.clone(),
                entry,
            },
        };
        self.output.resolutions.push(resolution);
    }

    fn conflict(
        &mut self,
        path: &GitPath,
        mut kind: ConflictKind,
        base: EntryState,
        ours: EntryState,
        theirs: EntryState,
    ) -> Result<bool, StorageError> {
        match kind {
            ConflictKind::Content | ConflictKind::DeleteModify => {
                let ours_content = self.file_content(&ours)?;
                let theirs_content = self.file_content(&theirs)?;
                if is_binary(&ours_content) || is_binary(&theirs_content) {
                    kind = ConflictKind::Binary;
                    self.keep_ours_or_theirs(path, &ours, theirs);
                } else {
                    let content = format_conflict(
                        self.ours_name,
                        &ours_content,
                        self.theirs_name,
                        &theirs_content,
                    );
                    self.output.resolutions.push(Resolution::Write {
                        path: path.clone(),
                        content,
                        kind: marker_kind(&base, &ours, &theirs),
                    });
                }
            }
            ConflictKind::Mode => {
                // Content resolves on its own; keep our mode on the resolved content
                if let (Some((mode, ours_id)), Some((_, theirs_id))) =
                    (ours.as_file(), theirs.as_file())
                {
                    let base_id = base.as_file().map(|(_, id)| id);
                    let id = resolve_axis(base_id, ours_id, theirs_id).unwrap_or(ours_id);
                    self.replace(path, &ours, EntryState::File { mode, id });
                }
            }
            ConflictKind::FileDirectory | ConflictKind::Binary => {
                self.keep_ours_or_theirs(path, &ours, theirs);
            }
        }

        self.output.conflicts.push(Conflict {
            path: path.clone(),
            kind,
            base,
            ours,
            theirs,
        });
        Ok(true)
    }

    fn keep_ours_or_theirs(&mut self, path: &GitPath, ours: &EntryState, theirs: EntryState) {
        if ours.is_none() {
            self.replace(path, ours, theirs);
        }
    }

    fn file_content(&self, entry: &EntryState) -> Result<Vec<u8>, StorageError> {
        match entry.as_file() {
            Some((_, id)) => self.store.read_blob(&id),
            None => Ok(Vec::new()),
        }
    }
}

/// File kind for a marker file: the three-way resolved mode when there is one, otherwise
/// ours, otherwise theirs. Marker files are never symlinks.
fn marker_kind(base: &EntryState, ours: &EntryState, theirs: &EntryState) -> FileKind {
    let base_mode = base.as_file().map(|(mode, _)| mode);
    let mode = match (ours.as_file(), theirs.as_file()) {
        (Some((om, _)), Some((tm, _))) => {
            resolve_axis(base_mode, om, tm).unwrap_or(om)
        }
        (Some((om, _)), None) => om,
        (None, Some((tm, _))) => tm,
        (None, None) => FileMode::Regular,
    };
    match FileKind::from_mode(mode) {
        Some(FileKind::Executable) => FileKind::Executable,
        _ => FileKind::Regular,
    }
}

type EntryIter = Peekable<std::vec::IntoIter<(String, EntryState)>>;

/// Smallest name at the head of the three lists.
fn min_name(base: &mut EntryIter, ours: &mut EntryIter, theirs: &mut EntryIter) -> Option<String> {
    [base.peek(), ours.peek(), theirs.peek()]
        .into_iter()
        .flatten()
        .map(|(name, _)| name)
        .min()
        .cloned()
}

fn take_if_named(list: &mut EntryIter, name: &str) -> EntryState {
    match list.next_if(|(entry_name, _)| entry_name == name) {
        Some((_, entry)) => entry,
        None => EntryState::None,
    }
}

/// Apply walk output to a cache mirroring ours
///
/// Takes refer to objects already in the cache's store, so no content is copied.
pub fn apply(cache: &mut NodeCache, resolutions: Vec<Resolution>) -> Result<(), FsError> {
    for resolution in resolutions {
        match resolution {
            Resolution::Take { path, entry } => {
                let node = match entry {
                    EntryState::File { mode, id } => {
                        DetachedNode::blob(id, FileKind::from_mode(mode).unwrap_or_default())
                    }
                    EntryState::Directory(id) => DetachedNode::Tree(id),
                    EntryState::None => {
                        cache.delete(&path)?;
                        continue;
                    }
                };
                cache.insert(&path, node, OverwritePolicy::Replace)?;
            }
            Resolution::Remove { path } => cache.delete(&path)?,
            Resolution::Write {
                path,
                content,
                kind,
            } => cache.write(&path, Arc::from(content), kind)?,
        }
    }
    Ok(())
}
