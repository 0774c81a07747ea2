/*!
 * Mirror-set generation
 *
 * Turns the planned copies into `ImageDigestMirrorSet` and
 * `ImageTagMirrorSet` documents so a disconnected cluster pulls upstream
 * references from the mirror registry.
 *
 * Mirrors are grouped by category (release, operator, generic) and keyed by
 * a source scope. The namespace scope is used when the destination path
 * ends with the source path, since every repository below the namespace is
 * then mirrored the same way; otherwise the repository scope is used.
 */

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MirrorError, Result};
use crate::image::{CopyImageSchema, ImageSpec, ImageType, MirrorCategory};

pub const MIRROR_SET_API_VERSION: &str = "config.openshift.io/v1";
pub const CLUSTER_RESOURCES_DIR: &str = "cluster-resources";

/// Which side of the mirror-set pair to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorSetMode {
    /// Tag-addressed origins, emitted as ImageTagMirrorSet
    TagsOnly,
    /// Digest-addressed origins (plus release images), emitted as ImageDigestMirrorSet
    DigestsOnly,
}

impl MirrorSetMode {
    pub fn prefix(&self) -> &'static str {
        match self {
            MirrorSetMode::TagsOnly => "itms",
            MirrorSetMode::DigestsOnly => "idms",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MirrorSetMode::TagsOnly => "ImageTagMirrorSet",
            MirrorSetMode::DigestsOnly => "ImageDigestMirrorSet",
        }
    }

    /// File holding every category of this kind
    pub fn file_name(&self) -> String {
        format!("{}-ferry.yaml", self.prefix())
    }

    /// Deterministic resource name for a category
    pub fn resource_name(&self, category: MirrorCategory) -> String {
        format!("{}-{}-0", self.prefix(), category)
    }

    fn keeps(&self, origin: &ImageSpec, image_type: ImageType) -> bool {
        match self {
            MirrorSetMode::TagsOnly => !origin.is_by_digest_only(),
            MirrorSetMode::DigestsOnly => {
                origin.is_by_digest_only() || image_type == ImageType::ReleaseImage
            }
        }
    }
}

/// Mirrors of one category: source scope to destination scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorizedMirrors {
    pub category: MirrorCategory,
    pub mirrors: BTreeMap<String, BTreeSet<String>>,
}

/// Group the planned copies into per-category mirror maps
///
/// Categories come back in a fixed order (release, operator, generic) and
/// only when they hold at least one mirror.
pub fn generate_image_mirrors(
    images: &[CopyImageSchema],
    mode: MirrorSetMode,
    force_repository_scope: bool,
) -> Result<Vec<CategorizedMirrors>> {
    let mut by_category: BTreeMap<MirrorCategory, BTreeMap<String, BTreeSet<String>>> =
        BTreeMap::new();

    for image in images {
        if image.origin.is_empty() {
            return Err(MirrorError::MissingOrigin {
                source_ref: image.source.clone(),
                destination: image.destination.clone(),
            });
        }
        if matches!(
            image.image_type,
            ImageType::UpdateGraph | ImageType::OperatorCatalog
        ) {
            continue;
        }

        let origin = ImageSpec::parse(&image.origin)?;
        let destination = ImageSpec::parse(&image.destination)?;
        if !mode.keeps(&origin, image.image_type) {
            continue;
        }

        let (source_scope, mirror_scope) = if force_repository_scope {
            (origin.repository_scope(), destination.repository_scope())
        } else {
            attempt_namespace_scope(&origin, &destination)
        };

        by_category
            .entry(image.image_type.category())
            .or_default()
            .entry(source_scope)
            .or_default()
            .insert(mirror_scope);
    }

    Ok(by_category
        .into_iter()
        .map(|(category, mirrors)| CategorizedMirrors { category, mirrors })
        .collect())
}

fn attempt_namespace_scope(origin: &ImageSpec, destination: &ImageSpec) -> (String, String) {
    if destination
        .path_component
        .ends_with(origin.path_component.as_str())
    {
        (origin.namespace_scope(), destination.namespace_scope())
    } else {
        (origin.repository_scope(), destination.repository_scope())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(
        rename = "creationTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMirrors {
    pub source: String,
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSetSpec {
    #[serde(
        rename = "imageDigestMirrors",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_digest_mirrors: Option<Vec<ImageMirrors>>,
    #[serde(
        rename = "imageTagMirrors",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_tag_mirrors: Option<Vec<ImageMirrors>>,
}

/// An ImageDigestMirrorSet or ImageTagMirrorSet resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSetDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MirrorSetSpec,
}

impl MirrorSetDocument {
    pub fn new(mode: MirrorSetMode, categorized: &CategorizedMirrors) -> Self {
        let entries: Vec<ImageMirrors> = categorized
            .mirrors
            .iter()
            .map(|(source, mirrors)| ImageMirrors {
                source: source.clone(),
                mirrors: mirrors.iter().cloned().collect(),
            })
            .collect();

        let spec = match mode {
            MirrorSetMode::DigestsOnly => MirrorSetSpec {
                image_digest_mirrors: Some(entries),
                ..Default::default()
            },
            MirrorSetMode::TagsOnly => MirrorSetSpec {
                image_tag_mirrors: Some(entries),
                ..Default::default()
            },
        };

        Self {
            api_version: MIRROR_SET_API_VERSION.to_string(),
            kind: mode.kind().to_string(),
            metadata: ObjectMeta {
                name: mode.resource_name(categorized.category),
                creation_timestamp: Some(Utc::now()),
            },
            spec,
        }
    }

    /// Source scope to mirrors, whichever side the document carries
    pub fn mirror_map(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.spec
            .image_digest_mirrors
            .iter()
            .chain(self.spec.image_tag_mirrors.iter())
            .flatten()
            .map(|m| (m.source.clone(), m.mirrors.iter().cloned().collect()))
            .collect()
    }
}

/// Serialize documents as a YAML stream, each introduced by `---`
///
/// Creation timestamps are dropped so regenerating unchanged input yields
/// identical files.
pub fn render_mirror_sets(documents: &[MirrorSetDocument]) -> Result<String> {
    let mut out = String::new();
    for document in documents {
        let mut document = document.clone();
        document.metadata.creation_timestamp = None;
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&document)?);
    }
    Ok(out)
}

/// Parse a YAML stream produced by [`render_mirror_sets`]
pub fn parse_mirror_sets(yaml: &str) -> Result<Vec<MirrorSetDocument>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(serde_yaml::from_value(value)?);
        }
    }
    Ok(documents)
}

/// Writes mirror-set files under `<working_dir>/cluster-resources`
pub struct MirrorSetGenerator {
    output_dir: PathBuf,
}

impl MirrorSetGenerator {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            output_dir: working_dir.join(CLUSTER_RESOURCES_DIR),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate and write both IDMS and ITMS files; returns the written paths
    pub fn generate(
        &self,
        images: &[CopyImageSchema],
        force_repository_scope: bool,
    ) -> Result<Vec<PathBuf>> {
        if images.is_empty() {
            info!("no images to mirror, skipping IDMS/ITMS generation");
            return Ok(Vec::new());
        }

        let mut written = Vec::new();
        for mode in [MirrorSetMode::DigestsOnly, MirrorSetMode::TagsOnly] {
            let categorized = generate_image_mirrors(images, mode, force_repository_scope)?;
            if categorized.is_empty() {
                info!("no images found for {}, skipping", mode.kind());
                continue;
            }

            let documents: Vec<MirrorSetDocument> = categorized
                .iter()
                .map(|category| MirrorSetDocument::new(mode, category))
                .collect();

            fs::create_dir_all(&self.output_dir)?;
            let path = self.output_dir.join(mode.file_name());
            fs::write(&path, render_mirror_sets(&documents)?)?;
            info!(
                "{} file generated with {} categories: {}",
                mode.prefix().to_uppercase(),
                documents.len(),
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }
}
