//! Filesystem instance operations against a backing snapshot

use super::test_utils::{commit_files, new_store, open_branch, set_branch, FlakyStore};
use snapfs::fs::{FileKind, NodeKind};
use snapfs::store::lookup;
use snapfs::{FileSystemBuilder, FsError, GitPath, ObjectStore};
use std::sync::Arc;

#[test]
fn test_reads_come_from_snapshot() {
    let store = new_store();
    let commit = commit_files(&store, None, &[("/docs/a.md", "alpha"), ("/b.txt", "beta")]);
    set_branch(&store, "main", commit);

    let fs = open_branch(&store, "main");
    assert_eq!(fs.read_to_string("docs/a.md").unwrap(), "alpha");
    assert_eq!(fs.read_to_string("/b.txt/").unwrap(), "beta");
    assert!(fs.is_directory("/docs").unwrap());
    assert!(matches!(fs.read("/docs"), Err(FsError::IsADirectory(_))));
    assert!(matches!(fs.read("/nope"), Err(FsError::NoSuchFile(_))));
    assert!(matches!(
        fs.read("/b.txt/inner"),
        Err(FsError::NotADirectory(_))
    ));
    assert!(matches!(fs.read("/docs//a.md"), Err(FsError::InvalidPath(_))));
}

#[test]
fn test_write_read_round_trip_until_overwritten() {
    let fs = FileSystemBuilder::new(new_store()).build().unwrap();
    fs.write("/x/y/z.bin", [0u8, 1, 2, 255]).unwrap();
    assert_eq!(&*fs.read("/x/y/z.bin").unwrap(), &[0u8, 1, 2, 255]);
    fs.write("/x/y/z.bin", b"next").unwrap();
    assert_eq!(&*fs.read("/x/y/z.bin").unwrap(), b"next");
    fs.delete("/x/y/z.bin").unwrap();
    assert!(!fs.exists("/x/y/z.bin").unwrap());
    assert!(fs.is_directory("/x/y").unwrap());
}

#[test]
fn test_flush_is_idempotent() {
    let store = new_store();
    let commit = commit_files(&store, None, &[("/a", "a")]);
    let fs = FileSystemBuilder::new(Arc::clone(&store))
        .with_commit(commit)
        .build()
        .unwrap();
    fs.write("/b", "b").unwrap();

    let first = fs.flush().unwrap();
    let second = fs.flush().unwrap();
    assert_eq!(first, second);
    assert_eq!(fs.snapshot(), Some(first));
    assert!(!fs.status_provider().unwrap().is_dirty());
}

#[test]
fn test_flush_leaves_previous_snapshot_intact() {
    let store = new_store();
    let commit = commit_files(&store, None, &[("/a", "original")]);
    let old_tree = store.read_commit(&commit).unwrap().tree;
    let fs = FileSystemBuilder::new(Arc::clone(&store))
        .with_commit(commit)
        .build()
        .unwrap();
    fs.write("/a", "changed").unwrap();
    let new_tree = fs.flush().unwrap();

    assert_ne!(old_tree, new_tree);
    let path = GitPath::parse("/a").unwrap();
    assert_eq!(
        lookup::read_file(store.as_ref(), &old_tree, &path).unwrap(),
        Some(b"original".to_vec())
    );
    assert_eq!(
        lookup::read_file(store.as_ref(), &new_tree, &path).unwrap(),
        Some(b"changed".to_vec())
    );
}

#[test]
fn test_failed_flush_can_be_retried() {
    let flaky = Arc::new(FlakyStore::default());
    let store: Arc<dyn ObjectStore> = flaky.clone();
    let fs = FileSystemBuilder::new(store).build().unwrap();
    fs.write("/a/b.txt", "pending").unwrap();
    let before = fs.snapshot();

    flaky.set_failing(true);
    assert!(matches!(fs.flush(), Err(FsError::Storage(_))));
    assert!(fs.status_provider().unwrap().is_dirty());
    assert_eq!(fs.snapshot(), before);
    assert!(matches!(fs.commit("nope"), Err(FsError::Storage(_))));
    assert_eq!(fs.head(), None);

    flaky.set_failing(false);
    let tree = fs.flush().unwrap();
    assert!(!fs.status_provider().unwrap().is_dirty());
    assert_eq!(fs.read_to_string("/a/b.txt").unwrap(), "pending");
    let path = GitPath::parse("/a/b.txt").unwrap();
    assert!(lookup::is_file(&*flaky, &tree, &path).unwrap());
}

#[test]
fn test_failed_mutations_change_nothing() {
    let store = new_store();
    let commit = commit_files(&store, None, &[("/file", "f"), ("/dir/inner", "i")]);
    let fs = FileSystemBuilder::new(store)
        .with_commit(commit)
        .build()
        .unwrap();

    assert!(fs.write("/file/child", "x").is_err());
    assert!(fs.write("/dir", "x").is_err());
    assert!(fs.delete("/missing").is_err());
    assert!(fs.create_directory("/a/b").is_err());
    assert!(fs.create_directory("/dir").is_err());
    assert!(fs.copy("/missing", "/x").is_err());
    assert!(fs.move_node("/dir", "/dir/sub").is_err());
    assert!(matches!(fs.delete("/"), Err(FsError::InvalidPath(_))));

    assert!(!fs.status_provider().unwrap().is_dirty());
    assert_eq!(fs.flush().unwrap(), fs.snapshot().unwrap());
    assert_eq!(fs.read_to_string("/dir/inner").unwrap(), "i");
}

#[test]
fn test_directories_and_listing() {
    let fs = FileSystemBuilder::new(new_store()).build().unwrap();
    fs.create_directories("/a/b/c").unwrap();
    fs.create_directory("/a/d").unwrap();
    fs.write_with_kind("/a/link", "b/c", FileKind::Symlink).unwrap();

    assert_eq!(
        fs.list("/a").unwrap(),
        vec![
            ("b".to_string(), NodeKind::Directory),
            ("d".to_string(), NodeKind::Directory),
            ("link".to_string(), NodeKind::File(FileKind::Symlink)),
        ]
    );
    assert!(fs.is_symlink("/a/link").unwrap());
    assert!(!fs.is_file("/a/link").unwrap());
    assert!(matches!(
        fs.list("/a/link"),
        Err(FsError::NotADirectory(_))
    ));
}

#[test]
fn test_empty_directories_are_committed() {
    let store = new_store();
    let fs = FileSystemBuilder::new(Arc::clone(&store))
        .with_branch("main")
        .build()
        .unwrap();
    fs.create_directories("/empty/nested").unwrap();
    fs.commit("Empty dirs").unwrap();

    let reopened = open_branch(&store, "main");
    assert!(reopened.is_directory("/empty/nested").unwrap());
    assert!(reopened.list("/empty/nested").unwrap().is_empty());
}

#[test]
fn test_dot_segments_are_normalized() {
    let fs = FileSystemBuilder::new(new_store()).build().unwrap();
    fs.write("/a/./b/../c.txt", "c").unwrap();
    assert_eq!(fs.read_to_string("/a/c.txt").unwrap(), "c");
    assert!(!fs.exists("/a/b").unwrap());
}

#[test]
fn test_unmodified_nodes_report_object_ids() {
    let store = new_store();
    let commit = commit_files(&store, None, &[("/a", "a"), ("/b", "b")]);
    let tree = store.read_commit(&commit).unwrap().tree;
    let fs = FileSystemBuilder::new(Arc::clone(&store))
        .with_tree(tree)
        .build()
        .unwrap();

    let blob = store.write_blob(b"a").unwrap();
    assert_eq!(fs.attributes("/a").unwrap().object_id, Some(blob));
    assert_eq!(fs.attributes("/").unwrap().object_id, Some(tree));

    fs.write("/b", "b2").unwrap();
    assert_eq!(fs.attributes("/b").unwrap().object_id, None);
    assert_eq!(fs.attributes("/").unwrap().object_id, None);
    assert_eq!(fs.attributes("/a").unwrap().object_id, Some(blob));
}
