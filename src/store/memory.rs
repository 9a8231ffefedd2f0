//! In-process object store

use crate::error::StorageError;
use crate::store::{ObjectStore, StoredObject};
use crate::types::ObjectId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Object store kept entirely in memory
///
/// Objects are immutable once inserted, so readers only ever take the shared lock.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
    refs: RwLock<HashMap<String, ObjectId>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// All ref names, sorted.
    pub fn ref_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.refs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get_object(&self, id: &ObjectId) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn put_object(&self, object: &StoredObject) -> Result<ObjectId, StorageError> {
        let id = object.id();
        self.objects
            .write()
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError> {
        Ok(self.refs.read().get(name).copied())
    }

    fn update_ref(&self, name: &str, id: &ObjectId) -> Result<(), StorageError> {
        self.refs.write().insert(name.to_string(), *id);
        Ok(())
    }
}
