//! Object id computation using BLAKE3

use crate::store::{Commit, TreeEntry};
use crate::types::ObjectId;
use blake3::Hasher;

/// Compute the id of a blob
///
/// ObjectId = hash("blob" || content_len || content)
pub fn compute_blob_id(content: &[u8]) -> ObjectId {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"blob");

    // Hash content length (8 bytes, big-endian for determinism)
    hasher.update(&(content.len() as u64).to_be_bytes());

    hasher.update(content);

    ObjectId::from_bytes(*hasher.finalize().as_bytes())
}

/// Compute the id of a tree
///
/// ObjectId = hash("tree" || entry_count || (mode ":" name ":" id)*)
///
/// Entries must be sorted by name for determinism.
pub fn compute_tree_id(entries: &[TreeEntry]) -> ObjectId {
    let mut hasher = Hasher::new();

    hasher.update(b"tree");
    hasher.update(&(entries.len() as u64).to_be_bytes());

    for entry in entries {
        hasher.update(&entry.mode.to_octal().to_be_bytes());
        hasher.update(b":");
        hasher.update(&(entry.name.len() as u64).to_be_bytes());
        hasher.update(entry.name.as_bytes());
        hasher.update(b":");
        hasher.update(entry.id.as_bytes());
    }

    ObjectId::from_bytes(*hasher.finalize().as_bytes())
}

/// Compute the id of a commit
///
/// ObjectId = hash("commit" || tree || parent_count || parents || timestamp || message)
pub fn compute_commit_id(commit: &Commit) -> ObjectId {
    let mut hasher = Hasher::new();

    hasher.update(b"commit");
    hasher.update(commit.tree.as_bytes());

    hasher.update(&(commit.parents.len() as u64).to_be_bytes());
    for parent in &commit.parents {
        hasher.update(parent.as_bytes());
    }

    hasher.update(&commit.timestamp.to_be_bytes());
    hasher.update(&(commit.message.len() as u64).to_be_bytes());
    hasher.update(commit.message.as_bytes());

    ObjectId::from_bytes(*hasher.finalize().as_bytes())
}
