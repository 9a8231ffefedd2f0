//! Classify each side's change and decide what the merge does with a name.

use crate::merge::types::{ChangeMerge, ConflictKind, EntryChange, EntryState};

/// Compute the change from a base entry to a derived entry.
///
/// A name absent from both is `Unchanged`; it occurs when only the other side created it.
pub fn to_change(base: &EntryState, derived: &EntryState) -> EntryChange {
    match (base, derived) {
        (EntryState::None, EntryState::None) => EntryChange::Unchanged,
        (EntryState::None, EntryState::File { .. }) => EntryChange::FileCreated,
        (EntryState::None, EntryState::Directory(_)) => EntryChange::DirectoryCreated,
        (EntryState::File { .. }, EntryState::None) => EntryChange::FileRemoved,
        (
            EntryState::File { mode: m1, id: c1 },
            EntryState::File { mode: m2, id: c2 },
        ) => {
            let content = c1 != c2;
            let mode = m1 != m2;
            if content || mode {
                EntryChange::FileChanged { content, mode }
            } else {
                EntryChange::Unchanged
            }
        }
        (EntryState::File { .. }, EntryState::Directory(_)) => {
            EntryChange::FileChangedToDirectory
        }
        (EntryState::Directory(_), EntryState::None) => EntryChange::DirectoryRemoved,
        (EntryState::Directory(_), EntryState::File { .. }) => {
            EntryChange::DirectoryChangedToFile
        }
        (EntryState::Directory(d1), EntryState::Directory(d2)) => {
            if d1 == d2 {
                EntryChange::Unchanged
            } else {
                EntryChange::DirectoryChanged
            }
        }
    }
}

/// Three-way resolution of a single value: an unchanged side yields to the changed one and
/// equal changes agree. `None` when both sides changed it differently.
pub fn resolve_axis<T: PartialEq + Copy>(base: Option<T>, ours: T, theirs: T) -> Option<T> {
    if ours == theirs {
        Some(ours)
    } else if base == Some(ours) {
        Some(theirs)
    } else if base == Some(theirs) {
        Some(ours)
    } else {
        None
    }
}

/// Decide the merge action for one name from its three states.
pub fn changes_to_merge(base: &EntryState, ours: &EntryState, theirs: &EntryState) -> ChangeMerge {
    let ours_change = to_change(base, ours);
    let theirs_change = to_change(base, theirs);

    if ours == theirs || theirs_change == EntryChange::Unchanged {
        return ChangeMerge::TakeOurs;
    }
    if ours_change == EntryChange::Unchanged {
        return ChangeMerge::TakeTheirs;
    }

    match (ours, theirs) {
        // Both sides have a file: content and mode are resolved independently
        (
            EntryState::File { mode: om, id: oc },
            EntryState::File { mode: tm, id: tc },
        ) => {
            let base_file = base.as_file();
            let content = resolve_axis(base_file.map(|(_, id)| id), *oc, *tc);
            let mode = resolve_axis(base_file.map(|(mode, _)| mode), *om, *tm);
            match (content, mode) {
                (Some(id), Some(mode)) => ChangeMerge::TakeFile { mode, id },
                (None, _) => ChangeMerge::Conflict(ConflictKind::Content),
                (Some(_), None) => ChangeMerge::Conflict(ConflictKind::Mode),
            }
        }

        (EntryState::Directory(_), EntryState::Directory(_)) => ChangeMerge::MergeDirectories {
            base: base.as_directory(),
            ours: ours.as_directory(),
            theirs: theirs.as_directory(),
        },

        // One side dropped a directory the other changed
        (EntryState::Directory(_), EntryState::None) | (EntryState::None, EntryState::Directory(_))
            if base.is_directory() =>
        {
            ChangeMerge::MergeDirectories {
                base: base.as_directory(),
                ours: ours.as_directory(),
                theirs: theirs.as_directory(),
            }
        }

        (EntryState::File { .. }, EntryState::None) | (EntryState::None, EntryState::File { .. })
            if base.as_file().is_some() =>
        {
            ChangeMerge::Conflict(ConflictKind::DeleteModify)
        }

        _ => ChangeMerge::Conflict(ConflictKind::FileDirectory),
    }
}
