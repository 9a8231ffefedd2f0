//! Conflicting merge: both branches edit the same file from a common base

use super::test_utils::{commit_files, new_store, open_branch, set_branch, OURS, THEIRS};
use snapfs::{merge, GitFileSystem, MergeStatus, ObjectId, ObjectStore};
use std::sync::Arc;

struct Fixture {
    store: Arc<dyn ObjectStore>,
    ours: ObjectId,
    theirs: ObjectId,
    fs: GitFileSystem,
}

fn setup() -> Fixture {
    let store = new_store();
    let base = commit_files(&store, None, &[("/test_file.txt", "base stuff")]);
    let ours = commit_files(&store, Some(base), &[("/test_file.txt", "base stuff + some stuff")]);
    set_branch(&store, OURS, ours);
    let theirs = commit_files(
        &store,
        Some(base),
        &[("/test_file.txt", "base stuff + other stuff")],
    );
    set_branch(&store, THEIRS, theirs);
    let fs = open_branch(&store, OURS);
    Fixture {
        store,
        ours,
        theirs,
        fs,
    }
}

/// Advance theirs once more so a squash has something new to bring in.
fn advance_theirs(fixture: &mut Fixture) {
    fixture.theirs = commit_files(
        &fixture.store,
        Some(fixture.theirs),
        &[("/test_file.txt", "base stuff + other stuff + some more stuff")],
    );
    set_branch(&fixture.store, THEIRS, fixture.theirs);
}

#[test]
fn test_status_is_conflicting() {
    let fixture = setup();
    let result = merge(&fixture.fs).source(THEIRS).execute().unwrap();
    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(result.merged_commit, None);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].path.to_string(), "/test_file.txt");
}

#[test]
fn test_conflicting_file_is_formatted() {
    let fixture = setup();
    merge(&fixture.fs).source(THEIRS).execute().unwrap();
    assert_eq!(
        fixture.fs.read_to_string("/test_file.txt").unwrap(),
        "<<<<<<< refs/heads/ours\n\
         base stuff + some stuff\n\
         =======\n\
         base stuff + other stuff\n\
         >>>>>>> refs/heads/theirs\n"
    );
}

#[test]
fn test_merge_note_has_source_head() {
    let fixture = setup();
    merge(&fixture.fs).source(THEIRS).execute().unwrap();
    let status = fixture.fs.status_provider().unwrap();
    let note = status.merge_note().expect("merge note");
    assert_eq!(note.source(), Some(fixture.theirs));
    assert!(!note.message().is_empty());
    assert!(status.is_dirty());
}

#[test]
fn test_squash_note_has_no_source() {
    let mut fixture = setup();
    advance_theirs(&mut fixture);
    merge(&fixture.fs)
        .source(THEIRS)
        .squash(true)
        .execute()
        .unwrap();
    let status = fixture.fs.status_provider().unwrap();
    let note = status.merge_note().expect("merge note");
    assert_eq!(note.source(), None);
    assert!(!note.message().is_empty());
}

#[test]
fn test_conflict_creates_no_commit() {
    let fixture = setup();
    merge(&fixture.fs).source(THEIRS).execute().unwrap();
    assert_eq!(fixture.fs.head(), Some(fixture.ours));
    assert_eq!(
        fixture.store.read_ref("refs/heads/ours").unwrap(),
        Some(fixture.ours)
    );
}

#[test]
fn test_resolving_commit_records_both_parents() {
    let fixture = setup();
    merge(&fixture.fs).source(THEIRS).execute().unwrap();
    fixture
        .fs
        .write("/test_file.txt", "base stuff + some stuff + other stuff")
        .unwrap();
    let resolved = fixture.fs.commit("Resolve conflict").unwrap();

    let commit = fixture.store.read_commit(&resolved).unwrap();
    assert_eq!(commit.parents, vec![fixture.ours, fixture.theirs]);
    let status = fixture.fs.status_provider().unwrap();
    assert!(status.merge_note().is_none());
    assert!(!status.is_dirty());
}

#[test]
fn test_squashed_resolution_has_single_parent() {
    let fixture = setup();
    merge(&fixture.fs)
        .source(THEIRS)
        .squash(true)
        .execute()
        .unwrap();
    fixture.fs.write("/test_file.txt", "resolved").unwrap();
    let resolved = fixture.fs.commit("Resolve").unwrap();
    assert_eq!(
        fixture.store.read_commit(&resolved).unwrap().parents,
        vec![fixture.ours]
    );
}

#[test]
fn test_merge_refused_while_conflicts_pending() {
    let fixture = setup();
    merge(&fixture.fs).source(THEIRS).execute().unwrap();
    assert!(matches!(
        merge(&fixture.fs).source(THEIRS).execute(),
        Err(snapfs::MergeError::UncommittedChanges)
    ));
}
