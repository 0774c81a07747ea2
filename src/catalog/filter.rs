/*!
 * Catalog version filter
 *
 * Resolves an inclusion policy against a catalog into the bundles to mirror
 * and the images each of them needs.
 *
 * Per channel, entries are walked in catalog order while tracking the
 * channel head: the first parseable entry, replaced by any later entry with
 * a strictly higher version or by a later entry that skips the current
 * head. Without version bounds (and without `full`) only that head is kept.
 */

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use semver::Version;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{Bundle, ChannelEntry, DeclarativeConfig, IncludeConfig, IncludePackage};
use crate::error::{MirrorError, Result};
use crate::image::{ImageSpec, ImageType, OCI_PROTOCOL};

/// Channel entry names look like `<package>.v<major>.<minor>.<patch>`
const MIN_ENTRY_COMPONENTS: usize = 4;

/// An image a selected bundle needs mirrored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedImage {
    pub name: String,
    pub image: String,
    #[serde(rename = "type")]
    pub image_type: ImageType,
}

/// Parse a version leniently: optional leading `v`, missing minor/patch read as 0
pub fn parse_tolerant(input: &str) -> Result<Version> {
    let version_error = |reason: String| MirrorError::VersionParse {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    let (core, suffix) = trimmed.split_at(trimmed.find(['-', '+']).unwrap_or(trimmed.len()));

    let mut numbers = Vec::with_capacity(3);
    for part in core.split('.') {
        let number = part
            .parse::<u64>()
            .map_err(|_| version_error(format!("invalid version component {:?}", part)))?;
        numbers.push(number);
    }
    if numbers.len() > 3 {
        return Err(version_error("more than three version components".to_string()));
    }
    numbers.resize(3, 0);

    Version::parse(&format!(
        "{}.{}.{}{}",
        numbers[0], numbers[1], numbers[2], suffix
    ))
    .map_err(|e| version_error(e.to_string()))
}

/// Version encoded in a channel entry name
pub fn channel_entry_version(entry_name: &str) -> Result<Version> {
    let components: Vec<&str> = entry_name.split('.').collect();
    if components.len() < MIN_ENTRY_COMPONENTS {
        return Err(MirrorError::VersionParse {
            input: entry_name.to_string(),
            reason: format!(
                "expected at least {} dot-separated components",
                MIN_ENTRY_COMPONENTS
            ),
        });
    }

    parse_tolerant(&components[1..].join(".")).map_err(|e| match e {
        MirrorError::VersionParse { reason, .. } => MirrorError::VersionParse {
            input: entry_name.to_string(),
            reason,
        },
        other => other,
    })
}

/// Inclusive version range; an absent side is unbounded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionBounds {
    pub min: Option<Version>,
    pub max: Option<Version>,
}

impl VersionBounds {
    pub fn parse(min: Option<&str>, max: Option<&str>) -> Result<Self> {
        Ok(Self {
            min: min.map(parse_tolerant).transpose()?,
            max: max.map(parse_tolerant).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.min.as_ref().is_none_or(|min| version >= min)
            && self.max.as_ref().is_none_or(|max| version <= max)
    }
}

fn same_release(a: &Version, b: &Version) -> bool {
    a.major == b.major && a.minor == b.minor && a.patch == b.patch
}

/// Select the bundle names of one channel
///
/// Returned names keep the channel's entry order. Entries whose names carry
/// no parseable version are logged and skipped.
pub fn filter_bundles(entries: &[ChannelEntry], bounds: &VersionBounds, full: bool) -> Vec<String> {
    let collect_range = full || !bounds.is_empty();

    let mut head: Option<&str> = None;
    let mut highest: Option<Version> = None;
    let mut included: Vec<Version> = Vec::new();
    let mut selected: HashSet<&str> = HashSet::new();
    let mut pre_releases: Vec<(&str, Version)> = Vec::new();

    for entry in entries {
        let version = match channel_entry_version(&entry.name) {
            Ok(version) => version,
            Err(e) => {
                warn!("skipping channel entry: {}", e);
                continue;
            }
        };

        let is_highest = highest.as_ref().is_none_or(|top| version > *top);
        let skips_head = head.is_some_and(|h| entry.skips.iter().any(|s| s == h));
        if is_highest || skips_head {
            head = Some(entry.name.as_str());
        }
        if is_highest {
            highest = Some(version.clone());
        }

        if !collect_range {
            continue;
        }
        if bounds.contains(&version) {
            selected.insert(entry.name.as_str());
            included.push(version);
        } else if !version.pre.is_empty() {
            pre_releases.push((entry.name.as_str(), version));
        }
    }

    if !collect_range {
        return head.map(|h| vec![h.to_string()]).unwrap_or_default();
    }

    for (name, version) in pre_releases {
        if included.iter().any(|v| same_release(v, &version)) {
            debug!("including pre-release {} alongside its release", name);
            selected.insert(name);
        }
    }

    entries
        .iter()
        .filter(|e| selected.contains(e.name.as_str()))
        .map(|e| e.name.clone())
        .collect()
}

/// Resolves inclusion policies against one catalog
pub struct CatalogFilter<'a> {
    catalog: &'a DeclarativeConfig,
    default_channels: HashMap<&'a str, &'a str>,
}

impl<'a> CatalogFilter<'a> {
    pub fn new(catalog: &'a DeclarativeConfig) -> Self {
        Self {
            catalog,
            default_channels: catalog.default_channels(),
        }
    }

    /// Related images of every bundle the policy selects, keyed by bundle name
    ///
    /// An empty package list selects every package of the catalog. Listed
    /// packages missing from the catalog are logged and skipped.
    pub fn filter(
        &self,
        include: &IncludeConfig,
        full: bool,
    ) -> Result<BTreeMap<String, Vec<RelatedImage>>> {
        include.validate(full)?;

        let packages: Vec<IncludePackage> = if include.packages.is_empty() {
            self.catalog
                .packages
                .iter()
                .map(|p| IncludePackage::new(p.name.clone()))
                .collect()
        } else {
            include.packages.clone()
        };

        let mut result = BTreeMap::new();
        for package in &packages {
            if !self.default_channels.contains_key(package.name.as_str()) {
                warn!("package {} not found in catalog, skipping", package.name);
                continue;
            }

            let images = self.filter_package(package, full)?;
            if images.is_empty() {
                warn!("no bundles selected for package {}", package.name);
            }
            result.extend(images);
        }
        Ok(result)
    }

    /// Related images of the bundles selected for one package
    pub fn filter_package(
        &self,
        package: &IncludePackage,
        full: bool,
    ) -> Result<BTreeMap<String, Vec<RelatedImage>>> {
        package.validate(full)?;

        let selected = self.select_bundles(package, full)?;
        let all_bundles = full && package.channels.is_empty();

        let mut images = BTreeMap::new();
        for bundle in self.catalog.bundles_for(&package.name) {
            if all_bundles || selected.contains(&bundle.name) {
                images.insert(bundle.name.clone(), bundle_images(bundle)?);
            }
        }
        Ok(images)
    }

    /// Union of the bundle names selected across the package's channels
    pub fn select_bundles(&self, package: &IncludePackage, full: bool) -> Result<BTreeSet<String>> {
        let mut selected = BTreeSet::new();

        if package.channels.is_empty() {
            let default_channel = self.default_channel(&package.name)?;
            let channel = self.catalog.channel(&package.name, default_channel).ok_or_else(|| {
                MirrorError::Catalog(format!(
                    "default channel {} of package {} not found",
                    default_channel, package.name
                ))
            })?;
            let bounds = match VersionBounds::parse(
                package.min_version.as_deref(),
                package.max_version.as_deref(),
            ) {
                Ok(bounds) => bounds,
                Err(e) => {
                    error!("package {}: {}", package.name, e);
                    return Ok(selected);
                }
            };
            selected.extend(filter_bundles(&channel.entries, &bounds, full));
            return Ok(selected);
        }

        for include_channel in &package.channels {
            let Some(channel) = self.catalog.channel(&package.name, &include_channel.name) else {
                warn!(
                    "channel {} of package {} not found in catalog",
                    include_channel.name, package.name
                );
                continue;
            };

            let bounds = match VersionBounds::parse(
                include_channel.min_version.as_deref(),
                include_channel.max_version.as_deref(),
            ) {
                Ok(bounds) => bounds,
                Err(e) => {
                    error!(
                        "channel {} of package {}: {}",
                        channel.name, package.name, e
                    );
                    continue;
                }
            };
            selected.extend(filter_bundles(&channel.entries, &bounds, full));
        }
        Ok(selected)
    }

    fn default_channel(&self, package: &str) -> Result<&'a str> {
        match self.default_channels.get(package) {
            Some(channel) if !channel.is_empty() => Ok(*channel),
            _ => Err(MirrorError::Catalog(format!(
                "package {} has no default channel",
                package
            ))),
        }
    }
}

/// The bundle image followed by its related images
fn bundle_images(bundle: &Bundle) -> Result<Vec<RelatedImage>> {
    ImageSpec::parse(&bundle.image)?;
    let mut images = vec![RelatedImage {
        name: bundle.name.clone(),
        image: bundle.image.clone(),
        image_type: ImageType::OperatorBundle,
    }];

    for related in &bundle.related_images {
        if related.image.starts_with(OCI_PROTOCOL) {
            warn!(
                "bundle {}: skipping related image {} with unsupported transport",
                bundle.name, related.image
            );
            continue;
        }
        if images.iter().any(|i| i.image == related.image) {
            continue;
        }
        ImageSpec::parse(&related.image)?;
        images.push(RelatedImage {
            name: related.name.clone(),
            image: related.image.clone(),
            image_type: ImageType::OperatorRelatedImage,
        });
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BundleImage, CatalogRecord, Channel, IncludeChannel, Package};

    fn entry(name: &str) -> ChannelEntry {
        ChannelEntry {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn entry_skipping(name: &str, skips: &[&str]) -> ChannelEntry {
        ChannelEntry {
            name: name.to_string(),
            skips: skips.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn bounds(min: Option<&str>, max: Option<&str>) -> VersionBounds {
        VersionBounds::parse(min, max).unwrap()
    }

    #[test]
    fn test_parse_tolerant() {
        assert_eq!(parse_tolerant("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_tolerant("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_tolerant(" 4 ").unwrap(), Version::new(4, 0, 0));
        assert_eq!(parse_tolerant("v01.02.03").unwrap(), Version::new(1, 2, 3));
        assert_eq!(
            parse_tolerant("v1.0.0-rc.1").unwrap().pre.as_str(),
            "rc.1"
        );
        assert!(parse_tolerant("one.two").is_err());
        assert!(parse_tolerant("1.2.3.4").is_err());
    }

    #[test]
    fn test_channel_entry_version() {
        assert_eq!(
            channel_entry_version("etcdoperator.v0.9.4").unwrap(),
            Version::new(0, 9, 4)
        );
        assert_eq!(
            channel_entry_version("op.v1.0.0-rc.1").unwrap().pre.as_str(),
            "rc.1"
        );
        let err = channel_entry_version("op.v1").unwrap_err();
        assert!(matches!(err, MirrorError::VersionParse { ref input, .. } if input == "op.v1"));
    }

    #[test]
    fn test_head_only_without_bounds() {
        let entries = vec![entry("op.v1.0.0"), entry("op.v1.1.0"), entry("op.v1.2.0")];
        assert_eq!(
            filter_bundles(&entries, &VersionBounds::default(), false),
            vec!["op.v1.2.0".to_string()]
        );
    }

    #[test]
    fn test_head_follows_highest_regardless_of_order() {
        let entries = vec![entry("op.v1.2.0"), entry("op.v1.0.0"), entry("op.v1.1.0")];
        assert_eq!(
            filter_bundles(&entries, &VersionBounds::default(), false),
            vec!["op.v1.2.0".to_string()]
        );
    }

    #[test]
    fn test_skips_override_head() {
        let entries = vec![
            entry("op.v1.2.0"),
            entry_skipping("op.v1.2.0-hotfix", &["op.v1.2.0"]),
        ];
        assert_eq!(
            filter_bundles(&entries, &VersionBounds::default(), false),
            vec!["op.v1.2.0-hotfix".to_string()]
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let entries = vec![
            entry("op.v1.0.0"),
            entry("op.v1.1.0"),
            entry("op.v1.2.0"),
            entry("op.v1.3.0"),
        ];
        assert_eq!(
            filter_bundles(&entries, &bounds(Some("1.1.0"), Some("1.2.0")), false),
            vec!["op.v1.1.0".to_string(), "op.v1.2.0".to_string()]
        );
        assert_eq!(
            filter_bundles(&entries, &bounds(Some("1.2.0"), None), false),
            vec!["op.v1.2.0".to_string(), "op.v1.3.0".to_string()]
        );
    }

    #[test]
    fn test_pre_release_joins_included_release() {
        let entries = vec![entry("op.v1.0.0-rc.1"), entry("op.v1.0.0"), entry("op.v1.1.0")];
        assert_eq!(
            filter_bundles(&entries, &bounds(Some("1.0.0"), Some("1.0.0")), false),
            vec!["op.v1.0.0-rc.1".to_string(), "op.v1.0.0".to_string()]
        );
    }

    #[test]
    fn test_full_takes_every_entry() {
        let entries = vec![entry("op.v1.0.0"), entry("broken"), entry("op.v1.1.0")];
        assert_eq!(
            filter_bundles(&entries, &VersionBounds::default(), true),
            vec!["op.v1.0.0".to_string(), "op.v1.1.0".to_string()]
        );
    }

    #[test]
    fn test_unparseable_entries_are_skipped() {
        let entries = vec![entry("op.latest"), entry("op.v2.0.0")];
        assert_eq!(
            filter_bundles(&entries, &VersionBounds::default(), false),
            vec!["op.v2.0.0".to_string()]
        );
    }

    fn catalog() -> DeclarativeConfig {
        let mut config = DeclarativeConfig::default();
        config.push(CatalogRecord::Package(Package {
            name: "op".to_string(),
            default_channel: "stable".to_string(),
        }));
        config.push(CatalogRecord::Channel(Channel {
            name: "stable".to_string(),
            package: "op".to_string(),
            entries: vec![entry("op.v1.0.0"), entry("op.v1.1.0")],
        }));
        config.push(CatalogRecord::Channel(Channel {
            name: "fast".to_string(),
            package: "op".to_string(),
            entries: vec![entry("op.v1.1.0"), entry("op.v1.2.0")],
        }));
        for version in ["1.0.0", "1.1.0", "1.2.0"] {
            config.push(CatalogRecord::Bundle(Bundle {
                name: format!("op.v{}", version),
                package: "op".to_string(),
                image: format!("quay.io/ns/op-bundle:v{}", version),
                related_images: vec![
                    BundleImage {
                        name: String::new(),
                        image: format!("quay.io/ns/op-bundle:v{}", version),
                    },
                    BundleImage {
                        name: "operator".to_string(),
                        image: format!("quay.io/ns/op:v{}", version),
                    },
                    BundleImage {
                        name: "local".to_string(),
                        image: "oci:///tmp/layout".to_string(),
                    },
                ],
            }));
        }
        config
    }

    #[test]
    fn test_default_channel_head() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let images = filter.filter_package(&IncludePackage::new("op"), false).unwrap();

        assert_eq!(images.keys().collect::<Vec<_>>(), vec!["op.v1.1.0"]);
        let bundle = &images["op.v1.1.0"];
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0].image_type, ImageType::OperatorBundle);
        assert_eq!(bundle[1].image_type, ImageType::OperatorRelatedImage);
        assert_eq!(bundle[1].image, "quay.io/ns/op:v1.1.0");
    }

    #[test]
    fn test_explicit_channels_union() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let package = IncludePackage {
            channels: vec![IncludeChannel::new("stable"), IncludeChannel::new("fast")],
            ..IncludePackage::new("op")
        };
        let selected = filter.select_bundles(&package, false).unwrap();
        assert_eq!(
            selected.into_iter().collect::<Vec<_>>(),
            vec!["op.v1.1.0".to_string(), "op.v1.2.0".to_string()]
        );
    }

    #[test]
    fn test_full_without_channels_takes_all_bundles() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let images = filter.filter_package(&IncludePackage::new("op"), true).unwrap();
        assert_eq!(images.len(), 3);
    }

    #[test]
    fn test_malformed_channel_bound_skips_channel() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let package = IncludePackage {
            channels: vec![
                IncludeChannel {
                    name: "stable".to_string(),
                    min_version: Some("not-a-version".to_string()),
                    max_version: None,
                },
                IncludeChannel::new("fast"),
            ],
            ..IncludePackage::new("op")
        };
        let selected = filter.select_bundles(&package, false).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(selected.contains("op.v1.2.0"));
    }

    #[test]
    fn test_malformed_package_bound_skips_only_that_package() {
        let mut catalog = catalog();
        catalog.push(CatalogRecord::Package(Package {
            name: "other".to_string(),
            default_channel: "stable".to_string(),
        }));
        catalog.push(CatalogRecord::Channel(Channel {
            name: "stable".to_string(),
            package: "other".to_string(),
            entries: vec![entry("other.v2.0.0")],
        }));
        catalog.push(CatalogRecord::Bundle(Bundle {
            name: "other.v2.0.0".to_string(),
            package: "other".to_string(),
            image: "quay.io/ns/other-bundle:v2.0.0".to_string(),
            related_images: Vec::new(),
        }));

        let filter = CatalogFilter::new(&catalog);
        let include = IncludeConfig {
            packages: vec![
                IncludePackage {
                    min_version: Some("not-a-version".to_string()),
                    ..IncludePackage::new("op")
                },
                IncludePackage::new("other"),
            ],
        };
        let images = filter.filter(&include, false).unwrap();
        assert_eq!(images.keys().collect::<Vec<_>>(), vec!["other.v2.0.0"]);
    }

    #[test]
    fn test_conflicting_filters_rejected() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let package = IncludePackage {
            channels: vec![IncludeChannel::new("stable")],
            min_version: Some("1.0.0".to_string()),
            ..IncludePackage::new("op")
        };
        assert!(matches!(
            filter.filter_package(&package, false),
            Err(MirrorError::ConfigurationConflict(_))
        ));
    }

    #[test]
    fn test_unknown_package_is_skipped() {
        let catalog = catalog();
        let filter = CatalogFilter::new(&catalog);
        let include = IncludeConfig {
            packages: vec![IncludePackage::new("missing"), IncludePackage::new("op")],
        };
        let images = filter.filter(&include, false).unwrap();
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn test_bad_related_image_aborts_package() {
        let mut catalog = catalog();
        catalog.bundles[1].related_images.push(BundleImage {
            name: "broken".to_string(),
            image: "no-domain".to_string(),
        });
        let filter = CatalogFilter::new(&catalog);
        assert!(matches!(
            filter.filter_package(&IncludePackage::new("op"), false),
            Err(MirrorError::ReferenceParse { .. })
        ));
    }

    #[test]
    fn test_missing_default_channel_is_fatal() {
        let mut catalog = catalog();
        catalog.packages[0].default_channel = "gone".to_string();
        let filter = CatalogFilter::new(&catalog);
        assert!(matches!(
            filter.filter_package(&IncludePackage::new("op"), false),
            Err(MirrorError::Catalog(_))
        ));
    }
}
