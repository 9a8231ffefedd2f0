//! Branch names and revision lookup

use crate::error::StorageError;
use crate::store::{ObjectStore, StoredObject};
use crate::types::ObjectId;

pub const HEADS_PREFIX: &str = "refs/heads/";

/// Expand a short branch name to its full ref (`main` -> `refs/heads/main`).
pub fn branch_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("{}{}", HEADS_PREFIX, name)
    }
}

/// Short form of a ref name (`refs/heads/main` -> `main`).
pub fn short_name(refname: &str) -> &str {
    refname.strip_prefix(HEADS_PREFIX).unwrap_or(refname)
}

/// A revision string resolved to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    pub commit: ObjectId,
    /// Full ref name, or the commit's hex id when resolved by id.
    pub name: String,
}

/// Resolve a branch name, full ref name or hex commit id
///
/// Branch lookup (`refs/heads/<rev>`) takes precedence over the literal ref, which takes
/// precedence over a commit id.
pub fn resolve_revision(
    store: &dyn ObjectStore,
    rev: &str,
) -> Result<Option<ResolvedRevision>, StorageError> {
    let branch = branch_ref(rev);
    if let Some(commit) = store.read_ref(&branch)? {
        return Ok(Some(ResolvedRevision {
            commit,
            name: branch,
        }));
    }
    if branch != rev {
        if let Some(commit) = store.read_ref(rev)? {
            return Ok(Some(ResolvedRevision {
                commit,
                name: rev.to_string(),
            }));
        }
    }
    if let Some(id) = ObjectId::from_hex(rev) {
        if let Some(StoredObject::Commit(_)) = store.get_object(&id)? {
            return Ok(Some(ResolvedRevision {
                commit: id,
                name: id.to_hex(),
            }));
        }
    }
    Ok(None)
}
