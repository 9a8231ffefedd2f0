//! Persistence layer for the object store

use crate::error::StorageError;
use crate::store::{ObjectStore, StoredObject};
use crate::types::ObjectId;
use std::path::Path;
use tracing::debug;

const REF_PREFIX: &str = "ref:";

/// Sled-based implementation of ObjectStore
///
/// Objects live under their raw 32-byte id; refs under `ref:<name>`. Values are
/// bincode-encoded.
pub struct SledObjectStore {
    db: sled::Db,
}

impl SledObjectStore {
    /// Open (or create) a store at the given path
    ///
    /// The path can be a directory (sled will create a database there) or
    /// a file path (sled will use it as the database file).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self { db })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Check if an object exists in the store
    pub fn contains(&self, id: &ObjectId) -> Result<bool, StorageError> {
        self.db.contains_key(id.as_bytes()).map_err(|e| db_error("check object existence", e))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| db_error("flush database", e))?;
        Ok(())
    }
}

impl ObjectStore for SledObjectStore {
    fn get_object(&self, id: &ObjectId) -> Result<Option<StoredObject>, StorageError> {
        match self
            .db
            .get(id.as_bytes())
            .map_err(|e| db_error("get object", e))?
        {
            Some(value) => {
                let object: StoredObject = bincode::deserialize(&value)?;
                let actual = object.id();
                if actual != *id {
                    return Err(StorageError::HashMismatch {
                        expected: *id,
                        actual,
                    });
                }
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    fn put_object(&self, object: &StoredObject) -> Result<ObjectId, StorageError> {
        let id = object.id();
        if self.contains(&id)? {
            return Ok(id);
        }
        let value = bincode::serialize(object)?;
        self.db
            .insert(id.as_bytes(), value)
            .map_err(|e| db_error("put object", e))?;
        debug!(id = %id, kind = object.kind_name(), "Stored object");
        Ok(id)
    }

    fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError> {
        let key = format!("{}{}", REF_PREFIX, name);
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| db_error("get ref", e))?
        {
            Some(value) => ObjectId::from_slice(&value).map(Some).ok_or_else(|| {
                StorageError::Serialization(format!("Corrupt ref value for {}", name))
            }),
            None => Ok(None),
        }
    }

    fn update_ref(&self, name: &str, id: &ObjectId) -> Result<(), StorageError> {
        let key = format!("{}{}", REF_PREFIX, name);
        self.db
            .insert(key.as_bytes(), id.as_bytes().to_vec())
            .map_err(|e| db_error("update ref", e))?;
        Ok(())
    }
}

fn db_error(action: &str, err: sled::Error) -> StorageError {
    StorageError::IoError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Failed to {}: {}", action, err),
    ))
}
