//! Object store capability used by the catalog and the transfer executor
//!
//! The pipeline never reaches for a global client: every step that touches
//! storage receives an `ObjectStore` implementation. `MemoryStore` backs tests
//! and dry runs, `S3Store` (feature `s3-native`) talks to AWS S3 or any
//! S3-compatible endpoint.
//!
//! # Example
//!
//! ```
//! use parcel::core::task::ObjectLocation;
//! use parcel::storage::{MemoryStore, ObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     store.put(ObjectLocation::new("media", "in/clip.mp4"), 10);
//!
//!     let size = store.object_size(&ObjectLocation::new("media", "in/clip.mp4")).await?;
//!     assert_eq!(size, Some(10));
//!     Ok(())
//! }
//! ```

pub mod error;
mod memory;

#[cfg(feature = "s3-native")]
mod s3;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;

#[cfg(feature = "s3-native")]
pub use s3::S3Store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::task::ObjectLocation;

/// One object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Full object key
    pub key: String,

    /// Object size in bytes
    pub size: u64,
}

/// Storage operations the pipeline depends on
///
/// Implementors must be `Send + Sync` so one store can be shared by every
/// worker driver.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size of the object in bytes, or `None` if it does not exist
    ///
    /// Deleted objects (delete markers) are reported as absent.
    async fn object_size(&self, location: &ObjectLocation) -> StorageResult<Option<u64>>;

    /// List every object under `prefix` in `bucket`, following pagination
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectSummary>>;

    /// Server-side copy of `source` onto `destination`, overwriting it
    async fn copy_object(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> StorageResult<()>;

    /// Delete an object; deleting a missing object is not an error
    async fn delete_object(&self, location: &ObjectLocation) -> StorageResult<()>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
