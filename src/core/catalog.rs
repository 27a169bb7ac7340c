/*!
 * Source enumeration: turns a bucket listing into transfer tasks
 */

use tracing::{debug, info, warn};

use super::destination::DestinationMapper;
use super::task::{ObjectLocation, Task};
use crate::config::SourceConfig;
use crate::error::{ParcelError, Result};
use crate::storage::ObjectStore;

/// Extension of the feed manifest that travels with media drops; never transferred
pub const MANIFEST_EXTENSION: &str = "mrss";

/// Why a listed object did not become a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Key ends with '/'
    Directory,
    /// File name has no extension
    NoExtension,
    /// The reserved manifest file
    Manifest,
    /// Extension not referenced by any destination rule
    UnknownFileType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedObject {
    pub key: String,
    pub reason: SkipReason,
}

/// Tasks built from one listing, plus what was left out
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub tasks: Vec<Task>,
    pub skipped: Vec<SkippedObject>,
}

impl Catalog {
    pub fn total_size_bytes(&self) -> u64 {
        self.tasks.iter().map(Task::size_bytes).sum()
    }

    /// Objects skipped because their file type is not mapped
    pub fn unknown_file_types(&self) -> impl Iterator<Item = &SkippedObject> {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::UnknownFileType(_)))
    }
}

/// Extension of the last path segment of `key`, if it has one
pub fn file_extension(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// List `source` and map every object with a known file type to a task
///
/// Unknown file types are logged and skipped; the listing itself failing is
/// the only error returned.
pub async fn build_catalog(
    store: &dyn ObjectStore,
    source: &SourceConfig,
    mapper: &DestinationMapper,
) -> Result<Catalog> {
    info!(
        "Inspecting files uploaded to s3://{}/{}",
        source.bucket, source.prefix
    );
    let objects = store.list_objects(&source.bucket, &source.prefix).await?;

    let mut catalog = Catalog::default();
    for object in objects {
        if object.key.ends_with('/') {
            catalog.skipped.push(SkippedObject {
                key: object.key,
                reason: SkipReason::Directory,
            });
            continue;
        }

        let Some(extension) = file_extension(&object.key).map(str::to_owned) else {
            debug!("{} has no file extension, skipping", object.key);
            catalog.skipped.push(SkippedObject {
                key: object.key,
                reason: SkipReason::NoExtension,
            });
            continue;
        };

        let destination = match mapper.lookup(&extension) {
            Ok(destination) => destination,
            Err(_) if extension == MANIFEST_EXTENSION => {
                catalog.skipped.push(SkippedObject {
                    key: object.key,
                    reason: SkipReason::Manifest,
                });
                continue;
            }
            Err(_) => {
                let err = ParcelError::UnknownFileType {
                    object: ObjectLocation::new(&source.bucket, &object.key),
                    extension: extension.clone(),
                };
                warn!("{}; ignoring it", err);
                catalog.skipped.push(SkippedObject {
                    key: object.key,
                    reason: SkipReason::UnknownFileType(extension),
                });
                continue;
            }
        };

        let relative = object
            .key
            .strip_prefix(source.prefix.as_str())
            .unwrap_or(&object.key);
        let target = destination.location_for(relative);
        let src = ObjectLocation::new(&source.bucket, &object.key);
        catalog.tasks.push(Task::new(src, target, object.size));
    }

    info!(
        tasks = catalog.tasks.len(),
        skipped = catalog.skipped.len(),
        total_bytes = catalog.total_size_bytes(),
        "Catalog built"
    );
    Ok(catalog)
}
