/*!
 * Inclusion policy for operator catalogs
 */

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

const CONFLICT_MESSAGE: &str = "cannot use channels/full and min/max versions at the same time";

/// Which packages of a catalog to mirror
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeConfig {
    /// Empty means every package in the catalog
    #[serde(default)]
    pub packages: Vec<IncludePackage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludePackage {
    pub name: String,

    /// Explicit channels; the package default channel is used when empty
    #[serde(default)]
    pub channels: Vec<IncludeChannel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeChannel {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

impl IncludePackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_version_bounds(&self) -> bool {
        self.min_version.is_some() || self.max_version.is_some()
    }

    /// Reject filters that cannot be combined
    pub fn validate(&self, full: bool) -> Result<()> {
        if self.has_version_bounds() && (full || !self.channels.is_empty()) {
            return Err(MirrorError::ConfigurationConflict(format!(
                "package {}: {}",
                self.name, CONFLICT_MESSAGE
            )));
        }
        Ok(())
    }
}

impl IncludeChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl IncludeConfig {
    /// Validate every package before any filtering starts
    pub fn validate(&self, full: bool) -> Result<()> {
        self.packages.iter().try_for_each(|p| p.validate(full))
    }
}
