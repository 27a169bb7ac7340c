/*!
 * Transfer task descriptors
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bucket + key pair identifying one object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One file to move: where it is, where it goes, how big it is
///
/// Tasks are produced by the catalog and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    source: ObjectLocation,
    destination: ObjectLocation,
    size_bytes: u64,
}

impl Task {
    pub fn new(source: ObjectLocation, destination: ObjectLocation, size_bytes: u64) -> Self {
        Self {
            source,
            destination,
            size_bytes,
        }
    }

    pub fn source(&self) -> &ObjectLocation {
        &self.source
    }

    pub fn destination(&self) -> &ObjectLocation {
        &self.destination
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let loc = ObjectLocation::new("media", "source/clip.mp4");
        assert_eq!(loc.to_string(), "s3://media/source/clip.mp4");
    }

    #[test]
    fn test_task_accessors() {
        let task = Task::new(
            ObjectLocation::new("media", "source/a.jpg"),
            ObjectLocation::new("archive", "target/a.jpg"),
            2048,
        );
        assert_eq!(task.source().key, "source/a.jpg");
        assert_eq!(task.destination().bucket, "archive");
        assert_eq!(task.size_bytes(), 2048);
    }
}
