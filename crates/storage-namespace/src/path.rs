use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ResourceType;

/// Parsed `/<version>/<account>[/<container>[/<object>]]` request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePath {
    pub version: String,
    pub account: String,
    pub container: Option<String>,
    /// Object names keep any embedded slashes.
    pub object: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid path: {0}")]
    Invalid(String),
    #[error("path too shallow: {0}")]
    TooShallow(String),
}

impl ResourcePath {
    /// Split a raw request path into its hierarchy components.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw
            .strip_prefix('/')
            .ok_or_else(|| PathError::Invalid(raw.to_string()))?;
        let mut segments = trimmed.splitn(4, '/');

        let version = segments.next().unwrap_or_default();
        let account = segments.next().unwrap_or_default();
        if version.is_empty() || account.is_empty() {
            return Err(PathError::TooShallow(raw.to_string()));
        }

        let container = segments.next().filter(|segment| !segment.is_empty());
        let object = segments.next().filter(|segment| !segment.is_empty());
        if container.is_none() && object.is_some() {
            return Err(PathError::Invalid(raw.to_string()));
        }

        Ok(Self {
            version: version.to_string(),
            account: account.to_string(),
            container: container.map(str::to_string),
            object: object.map(str::to_string),
        })
    }

    /// Depth of the deepest component present on the path.
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        if self.object.is_some() {
            ResourceType::Object
        } else if self.container.is_some() {
            ResourceType::Container
        } else {
            ResourceType::Account
        }
    }
}
