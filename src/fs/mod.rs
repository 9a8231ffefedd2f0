//! Mutable filesystem over content-addressed snapshots
//!
//! Paths resolve against a lazily loaded node cache that buffers every change in memory
//! until it is flushed back to the object store as new trees.

pub mod cache;
pub mod copy;
pub mod filesystem;
pub mod node;
pub mod path;
pub mod status;

pub use cache::NodeCache;
pub use copy::copy_across;
pub use filesystem::{FileSystemBuilder, GitFileSystem};
pub use node::{FileKind, NodeAttributes, NodeKind};
pub use path::GitPath;
pub use status::{MergeNote, StatusProvider};
