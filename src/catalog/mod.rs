/*!
 * Operator catalog model
 *
 * A catalog is a flat stream of declarative-config records, each tagged by
 * its `schema` field. Only packages, channels and bundles matter for
 * mirroring; every other schema is skipped while decoding.
 */

pub mod filter;
pub mod include;
pub mod reader;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use filter::{CatalogFilter, RelatedImage};
pub use include::{IncludeChannel, IncludeConfig, IncludePackage};
pub use reader::read_catalog;

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "schema")]
pub enum CatalogRecord {
    #[serde(rename = "olm.package")]
    Package(Package),
    #[serde(rename = "olm.channel")]
    Channel(Channel),
    #[serde(rename = "olm.bundle")]
    Bundle(Bundle),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Package {
    pub name: String,
    #[serde(rename = "defaultChannel", default)]
    pub default_channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Channel {
    pub name: String,
    pub package: String,
    #[serde(default)]
    pub entries: Vec<ChannelEntry>,
}

/// A bundle's position in a channel's upgrade graph
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ChannelEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skips: Vec<String>,
    #[serde(rename = "skipRange", default, skip_serializing_if = "Option::is_none")]
    pub skip_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Bundle {
    pub name: String,
    pub package: String,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "relatedImages", default)]
    pub related_images: Vec<BundleImage>,
}

/// An image a bundle declares it needs at runtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BundleImage {
    #[serde(default)]
    pub name: String,
    pub image: String,
}

/// All records of one catalog
#[derive(Debug, Clone, Default)]
pub struct DeclarativeConfig {
    pub packages: Vec<Package>,
    pub channels: Vec<Channel>,
    pub bundles: Vec<Bundle>,
}

impl DeclarativeConfig {
    /// Add a decoded record; returns false for skipped schemas
    pub fn push(&mut self, record: CatalogRecord) -> bool {
        match record {
            CatalogRecord::Package(package) => self.packages.push(package),
            CatalogRecord::Channel(channel) => self.channels.push(channel),
            CatalogRecord::Bundle(bundle) => self.bundles.push(bundle),
            CatalogRecord::Unknown => return false,
        }
        true
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    pub fn channel(&self, package: &str, name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.package == package && c.name == name)
    }

    pub fn bundles_for<'a>(&'a self, package: &'a str) -> impl Iterator<Item = &'a Bundle> + 'a {
        self.bundles.iter().filter(move |b| b.package == package)
    }

    /// Default channel of every package, in one pass over the catalog
    pub fn default_channels(&self) -> HashMap<&str, &str> {
        self.packages
            .iter()
            .map(|p| (p.name.as_str(), p.default_channel.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.channels.is_empty() && self.bundles.is_empty()
    }
}
