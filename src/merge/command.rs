//! The merge command: `merge(&fs).source("theirs").squash(false).execute()`

use crate::error::MergeError;
use crate::fs::filesystem::{FsState, GitFileSystem};
use crate::fs::status::MergeNote;
use crate::merge::conflict::{fast_forward_message, merge_message};
use crate::merge::types::{MergeResult, MergeStatus};
use crate::merge::walk::{apply, TreeMerger};
use crate::store::refs::{resolve_revision, ResolvedRevision};
use crate::store::ObjectStore;
use crate::types::ObjectId;
use tracing::{debug, info, instrument, warn};

/// Start building a merge into `fs`.
pub fn merge(fs: &GitFileSystem) -> MergeCommand<'_> {
    MergeCommand {
        fs,
        source: None,
        squash: false,
    }
}

/// A configured merge into one filesystem instance.
pub struct MergeCommand<'a> {
    fs: &'a GitFileSystem,
    source: Option<String>,
    squash: bool,
}

impl<'a> MergeCommand<'a> {
    /// Branch name, full ref name, or hex commit id to merge from.
    pub fn source(mut self, revision: impl Into<String>) -> Self {
        self.source = Some(revision.into());
        self
    }

    /// Merge content without recording the source as a parent.
    pub fn squash(mut self, squash: bool) -> Self {
        self.squash = squash;
        self
    }

    /// Run the merge
    ///
    /// The instance stays locked for the whole merge. Errors leave the instance as it was;
    /// a conflicting merge is not an error and leaves markers in place for the caller.
    #[instrument(skip(self), fields(source = ?self.source, squash = self.squash))]
    pub fn execute(self) -> Result<MergeResult, MergeError> {
        let source = self.source.as_deref().ok_or(MergeError::MissingSource)?;
        let store = self.fs.store().as_ref();
        let mut state = self.fs.lock_state()?;

        if state.status.is_dirty() || state.cache.is_dirty() {
            return Err(MergeError::UncommittedChanges);
        }

        let theirs = resolve_revision(store, source)?
            .ok_or_else(|| MergeError::RevisionNotFound(source.to_string()))?;
        let ours_name = state
            .branch
            .clone()
            .or_else(|| state.head.map(|head| head.to_hex()))
            .unwrap_or_else(|| "HEAD".to_string());

        let Some(ours) = state.head else {
            if state.snapshot.is_none() {
                // Nothing committed yet: adopt the source wholesale
                return self.fast_forward(&mut state, store, &theirs);
            }
            return Err(MergeError::MergeBaseNotFound {
                ours: ours_name,
                theirs: theirs.name,
            });
        };

        // Flushed but uncommitted edits count as uncommitted changes
        let ours_tree = store.read_commit(&ours)?.tree;
        if state.snapshot != Some(ours_tree) {
            return Err(MergeError::UncommittedChanges);
        }

        if ours == theirs.commit {
            debug!(commit = %ours, "Already up to date");
            return Ok(MergeResult::new(MergeStatus::UpToDate, Some(ours)));
        }

        let base = store.merge_base(&ours, &theirs.commit)?.ok_or_else(|| {
            MergeError::MergeBaseNotFound {
                ours: ours_name.clone(),
                theirs: theirs.name.clone(),
            }
        })?;

        if base == theirs.commit {
            debug!(commit = %ours, "Source already contained in head");
            return Ok(MergeResult::new(MergeStatus::UpToDate, Some(ours)));
        }
        if base == ours {
            return self.fast_forward(&mut state, store, &theirs);
        }

        self.three_way(&mut state, store, (ours, ours_tree), &ours_name, base, &theirs)
    }

    fn note_source(&self, theirs: &ResolvedRevision) -> Option<ObjectId> {
        if self.squash {
            None
        } else {
            Some(theirs.commit)
        }
    }

    /// Point the cache at the source tree. Without squash the head (and branch) move too;
    /// with squash the head stays and the instance is left dirty for a later commit.
    fn fast_forward(
        &self,
        state: &mut FsState,
        store: &dyn ObjectStore,
        theirs: &ResolvedRevision,
    ) -> Result<MergeResult, MergeError> {
        let tree = store.read_commit(&theirs.commit)?.tree;

        let merged_commit = if self.squash {
            None
        } else {
            if let Some(branch) = &state.branch {
                store.update_ref(branch, &theirs.commit)?;
            }
            state.head = Some(theirs.commit);
            Some(theirs.commit)
        };

        state.cache.reset(Some(tree));
        state.snapshot = Some(tree);
        if self.squash {
            state.status.mark_dirty();
        }
        state.status.record_merge(MergeNote::new(
            self.note_source(theirs),
            fast_forward_message(&theirs.name, self.squash),
        ));

        info!(to = %theirs.commit, "Fast-forward merge");
        Ok(MergeResult::new(MergeStatus::FastForward, merged_commit))
    }

    fn three_way(
        &self,
        state: &mut FsState,
        store: &dyn ObjectStore,
        (ours, ours_tree): (ObjectId, ObjectId),
        ours_name: &str,
        base: ObjectId,
        theirs: &ResolvedRevision,
    ) -> Result<MergeResult, MergeError> {
        let base_tree = store.read_commit(&base)?.tree;
        let theirs_tree = store.read_commit(&theirs.commit)?.tree;

        let merged = TreeMerger::new(store, ours_name, &theirs.name).merge(
            base_tree,
            ours_tree,
            theirs_tree,
        )?;
        debug!(
            base = %base,
            edits = merged.resolutions.len(),
            conflicts = merged.conflicts.len(),
            "Computed three-way merge"
        );

        if let Err(e) = apply(&mut state.cache, merged.resolutions) {
            state.cache.reset(state.snapshot);
            return Err(e.into());
        }

        let message = merge_message(ours_name, &theirs.name, self.squash, &merged.conflicts);
        let source = self.note_source(theirs);

        if !merged.conflicts.is_empty() {
            state.status.mark_dirty();
            state.merge_parent = source;
            state.status.record_merge(MergeNote::new(source, message));
            warn!(conflicts = merged.conflicts.len(), "Merge left conflicts");
            return Ok(MergeResult {
                status: MergeStatus::Conflicting,
                merged_commit: None,
                conflicts: merged.conflicts,
            });
        }

        let parents = match source {
            Some(theirs_commit) => vec![ours, theirs_commit],
            None => vec![ours],
        };
        let (tree, commit) = match commit_merged(state, store, &parents, &message) {
            Ok(ids) => ids,
            Err(e) => {
                state.cache.reset(state.snapshot);
                return Err(e);
            }
        };

        state.head = Some(commit);
        state.snapshot = Some(tree);
        state.status.mark_clean();
        state.status.record_merge(MergeNote::new(source, message));
        info!(commit = %commit, parents = parents.len(), "Merged");
        Ok(MergeResult::new(MergeStatus::Merged, Some(commit)))
    }
}

/// Flush the merged cache, commit it and advance the attached branch.
fn commit_merged(
    state: &mut FsState,
    store: &dyn ObjectStore,
    parents: &[ObjectId],
    message: &str,
) -> Result<(ObjectId, ObjectId), MergeError> {
    let tree = state.cache.flush()?;
    let commit = store.commit(&tree, parents, message)?;
    if let Some(branch) = &state.branch {
        store.update_ref(branch, &commit)?;
    }
    Ok((tree, commit))
}
