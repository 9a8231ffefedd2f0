//! Snapfs: a mutable filesystem over immutable snapshots
//!
//! A content-addressed tree snapshot is exposed as a hierarchical filesystem. Reads load
//! nodes lazily from the object store; writes, deletes, copies and moves are buffered in an
//! in-memory node cache until flushed back as new trees and committed. Divergent snapshots
//! are reconciled by a three-way merge that writes its result through the same cache.
//!
//! ```ignore
//! use snapfs::{FileSystemBuilder, MemoryObjectStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryObjectStore::new());
//! let fs = FileSystemBuilder::new(store).with_branch("main").build()?;
//! fs.write("/docs/readme.md", "hello")?;
//! let commit = fs.commit("Add readme")?;
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod merge;
pub mod store;
pub mod types;

pub use config::{ConfigLoader, FsConfig, OverwritePolicy, SnapfsConfig};
pub use error::{ConfigError, FsError, MergeError, StorageError};
pub use fs::{copy_across, FileSystemBuilder, GitFileSystem, GitPath, MergeNote, StatusProvider};
pub use merge::{merge, MergeResult, MergeStatus};
pub use store::{MemoryObjectStore, ObjectStore, SledObjectStore};
pub use types::ObjectId;
