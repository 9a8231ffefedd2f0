//! Merge outcomes other than a plain content conflict

use super::test_utils::{
    commit_files, commit_with, new_store, open_branch, set_branch, tree_of, OURS, THEIRS,
};
use snapfs::fs::{FileKind, NodeKind};
use snapfs::merge::ConflictKind;
use snapfs::{merge, FileSystemBuilder, MergeError, MergeStatus, ObjectStore};
use std::sync::Arc;

#[test]
fn test_fast_forward_for_all_depths() {
    for depth in 1..=4 {
        let store = new_store();
        let base = commit_files(&store, None, &[("/file.txt", "base")]);
        set_branch(&store, OURS, base);

        let mut theirs = base;
        for step in 0..depth {
            let content = format!("step {}", step);
            theirs = commit_files(&store, Some(theirs), &[("/file.txt", content.as_str())]);
        }
        set_branch(&store, THEIRS, theirs);

        let fs = open_branch(&store, OURS);
        let result = merge(&fs).source(THEIRS).execute().unwrap();

        assert_eq!(result.status, MergeStatus::FastForward);
        assert_eq!(result.merged_commit, Some(theirs));
        assert_eq!(fs.snapshot(), Some(tree_of(&store, theirs)));
        assert_eq!(fs.flush().unwrap(), tree_of(&store, theirs));
        assert_eq!(fs.head(), Some(theirs));
        assert_eq!(store.read_ref("refs/heads/ours").unwrap(), Some(theirs));
        assert!(!fs.status_provider().unwrap().is_dirty());
    }
}

#[test]
fn test_squashed_fast_forward_keeps_head() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/file.txt", "base")]);
    set_branch(&store, OURS, base);
    let theirs = commit_files(&store, Some(base), &[("/file.txt", "theirs")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).squash(true).execute().unwrap();

    assert_eq!(result.status, MergeStatus::FastForward);
    assert_eq!(fs.head(), Some(base));
    assert_eq!(fs.read_to_string("/file.txt").unwrap(), "theirs");
    assert!(fs.status_provider().unwrap().is_dirty());

    let squashed = fs.commit("Squash").unwrap();
    let commit = store.read_commit(&squashed).unwrap();
    assert_eq!(commit.parents, vec![base]);
    assert_eq!(commit.tree, tree_of(&store, theirs));
}

#[test]
fn test_up_to_date() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/file.txt", "base")]);
    let ours = commit_files(&store, Some(base), &[("/file.txt", "ours")]);
    set_branch(&store, OURS, ours);

    let fs = open_branch(&store, OURS);

    set_branch(&store, THEIRS, ours);
    let same = merge(&fs).source(THEIRS).execute().unwrap();
    assert_eq!(same.status, MergeStatus::UpToDate);

    set_branch(&store, THEIRS, base);
    let behind = merge(&fs).source(THEIRS).execute().unwrap();
    assert_eq!(behind.status, MergeStatus::UpToDate);
    assert_eq!(fs.head(), Some(ours));
    assert!(fs.status_provider().unwrap().merge_note().is_none());
}

#[test]
fn test_clean_merge_commits_with_two_parents() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/a.txt", "a"), ("/b.txt", "b")]);
    let ours = commit_files(&store, Some(base), &[("/a.txt", "a from ours")]);
    set_branch(&store, OURS, ours);
    let theirs = commit_files(
        &store,
        Some(base),
        &[("/b.txt", "b from theirs"), ("/dir/c.txt", "c")],
    );
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Merged);
    let merged = result.merged_commit.unwrap();
    assert_eq!(store.read_commit(&merged).unwrap().parents, vec![ours, theirs]);
    assert_eq!(store.read_ref("refs/heads/ours").unwrap(), Some(merged));
    assert_eq!(fs.head(), Some(merged));

    assert_eq!(fs.read_to_string("/a.txt").unwrap(), "a from ours");
    assert_eq!(fs.read_to_string("/b.txt").unwrap(), "b from theirs");
    assert_eq!(fs.read_to_string("/dir/c.txt").unwrap(), "c");

    let status = fs.status_provider().unwrap();
    assert!(!status.is_dirty());
    assert_eq!(status.merge_note().unwrap().source(), Some(theirs));
}

#[test]
fn test_squashed_clean_merge_has_one_parent() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/a.txt", "a"), ("/b.txt", "b")]);
    let ours = commit_files(&store, Some(base), &[("/a.txt", "a2")]);
    set_branch(&store, OURS, ours);
    let theirs = commit_files(&store, Some(base), &[("/b.txt", "b2")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).squash(true).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Merged);
    let merged = result.merged_commit.unwrap();
    assert_eq!(store.read_commit(&merged).unwrap().parents, vec![ours]);
    let status = fs.status_provider().unwrap();
    let note = status.merge_note().unwrap();
    assert_eq!(note.source(), None);
    assert!(!note.message().is_empty());
}

#[test]
fn test_delete_modify_conflict() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/p.txt", "original"), ("/keep.txt", "k")]);
    let ours = commit_with(&store, Some(base), |fs| fs.delete("/p.txt").unwrap());
    set_branch(&store, OURS, ours);
    let theirs = commit_files(&store, Some(base), &[("/p.txt", "modified")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].path.to_string(), "/p.txt");
    assert_eq!(result.conflicts[0].kind, ConflictKind::DeleteModify);
    assert_eq!(
        fs.read_to_string("/p.txt").unwrap(),
        "<<<<<<< refs/heads/ours\n=======\nmodified\n>>>>>>> refs/heads/theirs\n"
    );
}

#[test]
fn test_mode_only_conflict() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/tool", "payload")]);
    let ours = commit_with(&store, Some(base), |fs| {
        fs.set_file_kind("/tool", FileKind::Executable).unwrap()
    });
    set_branch(&store, OURS, ours);
    let theirs = commit_with(&store, Some(base), |fs| {
        fs.set_file_kind("/tool", FileKind::Symlink).unwrap()
    });
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(result.conflicts[0].kind, ConflictKind::Mode);
    assert_eq!(fs.read_to_string("/tool").unwrap(), "payload");
    assert_eq!(
        fs.attributes("/tool").unwrap().kind,
        NodeKind::File(FileKind::Executable)
    );
}

#[test]
fn test_mode_conflict_keeps_content_edited_by_ours() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/f", "base")]);
    let ours = commit_with(&store, Some(base), |fs| {
        fs.write_with_kind("/f", "ours edit", FileKind::Executable)
            .unwrap()
    });
    set_branch(&store, OURS, ours);
    let theirs = commit_with(&store, Some(base), |fs| {
        fs.set_file_kind("/f", FileKind::Symlink).unwrap()
    });
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(result.conflicts[0].kind, ConflictKind::Mode);
    assert_eq!(fs.read_to_string("/f").unwrap(), "ours edit");
    assert_eq!(
        fs.attributes("/f").unwrap().kind,
        NodeKind::File(FileKind::Executable)
    );
}

#[test]
fn test_mode_conflict_takes_content_edited_by_theirs() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/f", "base")]);
    let ours = commit_with(&store, Some(base), |fs| {
        fs.set_file_kind("/f", FileKind::Executable).unwrap()
    });
    set_branch(&store, OURS, ours);
    let theirs = commit_with(&store, Some(base), |fs| {
        fs.write_with_kind("/f", "theirs edit", FileKind::Symlink)
            .unwrap()
    });
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(fs.read_to_string("/f").unwrap(), "theirs edit");
    assert_eq!(
        fs.attributes("/f").unwrap().kind,
        NodeKind::File(FileKind::Executable)
    );
}

#[test]
fn test_mode_change_and_content_change_combine() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/run.sh", "echo 1")]);
    let ours = commit_with(&store, Some(base), |fs| {
        fs.set_file_kind("/run.sh", FileKind::Executable).unwrap()
    });
    set_branch(&store, OURS, ours);
    let theirs = commit_files(&store, Some(base), &[("/run.sh", "echo 2")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(THEIRS).execute().unwrap();

    assert_eq!(result.status, MergeStatus::Merged);
    assert_eq!(fs.read_to_string("/run.sh").unwrap(), "echo 2");
    assert_eq!(
        fs.attributes("/run.sh").unwrap().kind,
        NodeKind::File(FileKind::Executable)
    );
}

#[test]
fn test_unrelated_histories_fail_without_change() {
    let store = new_store();
    let ours = commit_files(&store, None, &[("/a.txt", "ours")]);
    set_branch(&store, OURS, ours);
    let theirs = commit_files(&store, None, &[("/b.txt", "theirs")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    assert!(matches!(
        merge(&fs).source(THEIRS).execute(),
        Err(MergeError::MergeBaseNotFound { .. })
    ));
    assert_eq!(fs.head(), Some(ours));
    assert!(!fs.exists("/b.txt").unwrap());
    assert!(!fs.status_provider().unwrap().is_dirty());
    assert!(fs.status_provider().unwrap().merge_note().is_none());
}

#[test]
fn test_dirty_instance_refuses_merge() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/a.txt", "a")]);
    set_branch(&store, OURS, base);
    let theirs = commit_files(&store, Some(base), &[("/a.txt", "b")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    fs.write("/scratch", "unsaved").unwrap();
    assert!(matches!(
        merge(&fs).source(THEIRS).execute(),
        Err(MergeError::UncommittedChanges)
    ));
    assert_eq!(fs.read_to_string("/a.txt").unwrap(), "a");
}

#[test]
fn test_flushed_but_uncommitted_edits_refuse_merge() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/f", "base f"), ("/g", "base g")]);
    let ours = commit_files(&store, Some(base), &[("/g", "ours g")]);
    set_branch(&store, OURS, ours);
    let theirs = commit_files(&store, Some(base), &[("/f", "theirs f")]);
    set_branch(&store, THEIRS, theirs);

    let fs = open_branch(&store, OURS);
    fs.write("/f", "flushed local edit").unwrap();
    fs.flush().unwrap();
    assert!(!fs.status_provider().unwrap().is_dirty());

    assert!(matches!(
        merge(&fs).source(THEIRS).execute(),
        Err(MergeError::UncommittedChanges)
    ));
    assert_eq!(fs.read_to_string("/f").unwrap(), "flushed local edit");
    assert_eq!(fs.head(), Some(ours));

    // Once committed, the edit takes part in the merge and conflicts
    fs.commit("Local edit").unwrap();
    let result = merge(&fs).source(THEIRS).execute().unwrap();
    assert_eq!(result.status, MergeStatus::Conflicting);
    assert_eq!(
        fs.read_to_string("/f").unwrap(),
        "<<<<<<< refs/heads/ours\nflushed local edit\n=======\ntheirs f\n>>>>>>> refs/heads/theirs\n"
    );
}

#[test]
fn test_bad_sources() {
    let store = new_store();
    let fs = FileSystemBuilder::new(Arc::clone(&store)).build().unwrap();
    assert!(matches!(
        merge(&fs).execute(),
        Err(MergeError::MissingSource)
    ));
    assert!(matches!(
        merge(&fs).source("nowhere").execute(),
        Err(MergeError::RevisionNotFound(name)) if name == "nowhere"
    ));
}

#[test]
fn test_merge_by_commit_id() {
    let store = new_store();
    let base = commit_files(&store, None, &[("/a.txt", "a")]);
    set_branch(&store, OURS, base);
    let theirs = commit_files(&store, Some(base), &[("/a.txt", "from id")]);

    let fs = open_branch(&store, OURS);
    let result = merge(&fs).source(theirs.to_hex()).execute().unwrap();
    assert_eq!(result.status, MergeStatus::FastForward);
    assert_eq!(fs.read_to_string("/a.txt").unwrap(), "from id");
}
