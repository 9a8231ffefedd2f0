//! Three-way merge into a filesystem instance
//!
//! # Overview
//!
//! A merge compares the instance's head ("ours") and a source revision ("theirs") against
//! their nearest common ancestor ("base"):
//!
//! 1. Identical heads, or a source already contained in ours, are up to date.
//! 2. A head that is an ancestor of the source fast-forwards.
//! 3. Otherwise the three trees are walked together. For each name the change on each side
//!    decides whether ours is kept, theirs is taken, directories are merged recursively, or
//!    the path conflicts.
//! 4. Edits are written through the node cache. A clean result is committed; a conflicting
//!    one stays in the cache with conflict markers and a [`MergeNote`](crate::fs::MergeNote).
//!
//! # Example
//!
//! ```ignore
//! use snapfs::merge::{merge, MergeStatus};
//!
//! let result = merge(&fs).source("theirs").execute()?;
//! if result.status == MergeStatus::Conflicting {
//!     for conflict in &result.conflicts {
//!         println!("{} ({})", conflict.path, conflict.kind);
//!     }
//! }
//! ```

mod change;
mod command;
mod conflict;
mod types;
mod walk;

pub use change::{changes_to_merge, resolve_axis, to_change};
pub use command::{merge, MergeCommand};
pub use conflict::{format_conflict, is_binary, merge_message};
pub use types::{
    ChangeMerge, Conflict, ConflictKind, EntryChange, EntryState, MergeResult, MergeStatus,
};
pub use walk::{Resolution, TreeMerge, TreeMerger};
