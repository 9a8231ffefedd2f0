//! Dirty tracking and merge outcome metadata for a filesystem instance

use crate::types::ObjectId;

/// Outcome note left behind by the most recent merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeNote {
    /// Head of the merged source; absent when the merge was squashed.
    pub source: Option<ObjectId>,
    pub message: String,
}

impl MergeNote {
    pub fn new(source: Option<ObjectId>, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }

    pub fn source(&self) -> Option<ObjectId> {
        self.source
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Per-instance status record
///
/// Dirty state only moves from clean to dirty through [`mark_dirty`](Self::mark_dirty);
/// clearing it is reserved for the filesystem when it flushes or moves to a new snapshot.
#[derive(Debug, Clone, Default)]
pub struct StatusProvider {
    dirty: bool,
    merge_note: Option<MergeNote>,
}

impl StatusProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn merge_note(&self) -> Option<&MergeNote> {
        self.merge_note.as_ref()
    }

    pub fn record_merge(&mut self, note: MergeNote) {
        self.merge_note = Some(note);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn take_merge_note(&mut self) -> Option<MergeNote> {
        self.merge_note.take()
    }
}
