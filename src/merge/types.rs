//! Type definitions for the three-way merge.

use crate::fs::path::GitPath;
use crate::store::{FileMode, TreeEntry};
use crate::types::ObjectId;
use std::fmt;

/// State of one name in one of the three trees being merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No entry at this name.
    None,
    /// A file (regular, executable or symlink).
    File { mode: FileMode, id: ObjectId },
    /// A directory with its tree id.
    Directory(ObjectId),
}

impl EntryState {
    pub fn is_none(&self) -> bool {
        matches!(self, EntryState::None)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, EntryState::Directory(_))
    }

    /// `(mode, id)` if this is a file.
    pub fn as_file(&self) -> Option<(FileMode, ObjectId)> {
        match self {
            EntryState::File { mode, id } => Some((*mode, *id)),
            _ => None,
        }
    }

    pub fn as_directory(&self) -> Option<ObjectId> {
        match self {
            EntryState::Directory(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<&TreeEntry> for EntryState {
    fn from(entry: &TreeEntry) -> Self {
        if entry.mode.is_directory() {
            EntryState::Directory(entry.id)
        } else {
            EntryState::File {
                mode: entry.mode,
                id: entry.id,
            }
        }
    }
}

/// Change from the base entry to one side's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryChange {
    Unchanged,
    FileCreated,
    /// Content and/or mode differ from the base file.
    FileChanged { content: bool, mode: bool },
    FileChangedToDirectory,
    FileRemoved,
    DirectoryCreated,
    DirectoryChanged,
    DirectoryChangedToFile,
    DirectoryRemoved,
}

impl EntryChange {
    pub fn is_removed(self) -> bool {
        matches!(self, EntryChange::FileRemoved | EntryChange::DirectoryRemoved)
    }
}

/// What the merge does with one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMerge {
    /// Ours is kept; covers identical changes on both sides.
    TakeOurs,
    TakeTheirs,
    /// A file assembled from independently resolved content and mode.
    TakeFile { mode: FileMode, id: ObjectId },
    /// Both sides are (or were) directories; merge their entries. `None` stands for an
    /// absent directory.
    MergeDirectories {
        base: Option<ObjectId>,
        ours: Option<ObjectId>,
        theirs: Option<ObjectId>,
    },
    Conflict(ConflictKind),
}

/// Why a path could not be merged automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides changed (or created) the content differently.
    Content,
    /// Content agrees but both sides changed the mode differently.
    Mode,
    /// One side deleted what the other modified.
    DeleteModify,
    /// One side has a file where the other has a directory.
    FileDirectory,
    /// Conflicting content that is not text; the file is kept whole.
    Binary,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictKind::Content => "content",
            ConflictKind::Mode => "mode",
            ConflictKind::DeleteModify => "delete/modify",
            ConflictKind::FileDirectory => "file/directory",
            ConflictKind::Binary => "binary",
        };
        f.write_str(label)
    }
}

/// A path left conflicting by a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: GitPath,
    pub kind: ConflictKind,
    pub base: EntryState,
    pub ours: EntryState,
    pub theirs: EntryState,
}

/// Terminal state of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Nothing to merge: the source is already contained in the current head.
    UpToDate,
    /// The current head was an ancestor of the source and now mirrors it.
    FastForward,
    /// Diverged histories merged cleanly and a commit was created.
    Merged,
    /// Conflict markers were written; nothing was committed.
    Conflicting,
}

impl MergeStatus {
    pub fn is_successful(self) -> bool {
        self != MergeStatus::Conflicting
    }
}

/// Outcome of [`MergeCommand::execute`](crate::merge::MergeCommand::execute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub status: MergeStatus,
    /// Commit the instance ended on, when the merge produced or moved to one.
    pub merged_commit: Option<ObjectId>,
    pub conflicts: Vec<Conflict>,
}

impl MergeResult {
    pub(crate) fn new(status: MergeStatus, merged_commit: Option<ObjectId>) -> Self {
        Self {
            status,
            merged_commit,
            conflicts: Vec::new(),
        }
    }
}
