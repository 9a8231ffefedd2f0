//! Copying subtrees between filesystem instances
//!
//! The source is detached with every file materialized, so the copy carries no references
//! into the source's backing store. Only the target instance is marked dirty.

use crate::error::FsError;
use crate::fs::filesystem::GitFileSystem;
use crate::fs::path::GitPath;
use tracing::{info, instrument};

/// Copy `source_path` of `source` to `target_path` of `target`
///
/// Missing parent directories are created in the target. An occupied target path is
/// replaced or rejected according to the target's overwrite policy. The source lock is
/// released before the target lock is taken, so the two instances need no lock ordering.
#[instrument(skip(source, target))]
pub fn copy_across(
    source: &GitFileSystem,
    source_path: &str,
    target: &GitFileSystem,
    target_path: &str,
) -> Result<(), FsError> {
    if std::ptr::eq(source, target) {
        return target.copy(source_path, target_path);
    }

    let from = GitPath::parse(source_path)?;
    let to = GitPath::parse(target_path)?;

    let detached = {
        let mut state = source.lock_state()?;
        state.cache.detach(&from, true)?
    };

    let policy = target.config().overwrite;
    let mut state = target.lock_state()?;
    state.cache.insert(&to, detached, policy)?;
    state.status.mark_dirty();

    info!(from = %from, to = %to, "Copied across file systems");
    Ok(())
}
