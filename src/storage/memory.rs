//! In-memory object store
//!
//! Stores object sizes only, which is all the pipeline ever inspects. Used by
//! the test suite and by `parcel plan --listing`, which must not touch a
//! live backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{ObjectStore, ObjectSummary, StorageError, StorageResult};
use crate::core::task::ObjectLocation;

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ObjectLocation, u64>,
    injected_failures: VecDeque<StorageError>,
    copies: usize,
    deletes: usize,
}

/// Object store kept entirely in memory
///
/// Cloning shares the underlying state, so a test can hand one clone to the
/// executor and inspect the other.
///
/// ```
/// use parcel::core::task::ObjectLocation;
/// use parcel::storage::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.put(ObjectLocation::new("media", "a.jpg"), 3);
/// assert!(store.contains(&ObjectLocation::new("media", "a.jpg")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object of the given size
    pub fn put(&self, location: ObjectLocation, size: u64) {
        self.write().objects.insert(location, size);
    }

    /// Remove an object
    pub fn remove(&self, location: &ObjectLocation) {
        self.write().objects.remove(location);
    }

    /// Whether the object exists
    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.read().objects.contains_key(location)
    }

    /// Size of an object, if present
    pub fn size_of(&self, location: &ObjectLocation) -> Option<u64> {
        self.read().objects.get(location).copied()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of copy operations performed so far
    pub fn copy_count(&self) -> usize {
        self.read().copies
    }

    /// Number of delete operations performed so far
    pub fn delete_count(&self) -> usize {
        self.read().deletes
    }

    /// Make the next store call fail with `error`
    ///
    /// Injected failures queue up and are consumed one per call.
    pub fn fail_next(&self, error: StorageError) {
        self.write().injected_failures.push_back(error);
    }

    fn take_failure(&self) -> StorageResult<()> {
        match self.write().injected_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn object_size(&self, location: &ObjectLocation) -> StorageResult<Option<u64>> {
        self.take_failure()?;
        Ok(self.size_of(location))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectSummary>> {
        self.take_failure()?;
        let inner = self.read();
        Ok(inner
            .objects
            .iter()
            .filter(|(loc, _)| loc.bucket == bucket && loc.key.starts_with(prefix))
            .map(|(loc, size)| ObjectSummary {
                key: loc.key.clone(),
                size: *size,
            })
            .collect())
    }

    async fn copy_object(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> StorageResult<()> {
        self.take_failure()?;
        let mut inner = self.write();
        let size = inner.objects.get(source).copied().ok_or_else(|| StorageError::Service {
            code: "NoSuchKey".to_string(),
            message: format!("{} does not exist", source),
        })?;
        inner.objects.insert(destination.clone(), size);
        inner.copies += 1;
        Ok(())
    }

    async fn delete_object(&self, location: &ObjectLocation) -> StorageResult<()> {
        self.take_failure()?;
        let mut inner = self.write();
        inner.objects.remove(location);
        inner.deletes += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
