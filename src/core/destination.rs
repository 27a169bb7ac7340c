/*!
 * File type to destination lookup
 */

use std::collections::HashMap;

use crate::config::DestinationRule;
use crate::error::{ParcelError, Result};

use super::task::ObjectLocation;

/// Destination bucket and key prefix for one file type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub bucket: String,
    pub path: String,
}

impl Destination {
    /// Location of `relative_name` under this destination
    ///
    /// The path is used as a plain key prefix, exactly as configured.
    pub fn location_for(&self, relative_name: &str) -> ObjectLocation {
        ObjectLocation::new(self.bucket.clone(), format!("{}{}", self.path, relative_name))
    }
}

/// Maps file extensions to destinations, built once from configuration
#[derive(Debug, Clone, Default)]
pub struct DestinationMapper {
    by_extension: HashMap<String, Destination>,
}

impl DestinationMapper {
    /// Build the lookup table; when an extension appears in several rules
    /// the last rule wins
    pub fn from_rules(rules: &[DestinationRule]) -> Self {
        let mut by_extension = HashMap::new();
        for rule in rules {
            let destination = Destination {
                bucket: rule.bucket.clone(),
                path: rule.path.clone(),
            };
            for file_type in &rule.file_types {
                by_extension.insert(file_type.clone(), destination.clone());
            }
        }
        Self { by_extension }
    }

    /// Destination for `extension` (exact, case-sensitive match)
    pub fn lookup(&self, extension: &str) -> Result<&Destination> {
        self.by_extension
            .get(extension)
            .ok_or_else(|| ParcelError::NotFound {
                extension: extension.to_string(),
            })
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.by_extension.contains_key(extension)
    }

    /// Number of mapped extensions
    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}
