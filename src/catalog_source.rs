/*!
 * CatalogSource generation
 *
 * Every mirrored operator catalog gets a `CatalogSource` resource in
 * `openshift-marketplace` pointing at its copy in the mirror registry.
 * Files are written next to the mirror sets as `<name>.yaml`.
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MirrorError, Result};
use crate::image::{CopyImageSchema, ImageSpec, ImageType, SHORT_DIGEST_LEN};
use crate::mirror_sets::{ObjectMeta, CLUSTER_RESOURCES_DIR};

pub const CATALOG_SOURCE_API_VERSION: &str = "operators.coreos.com/v1alpha1";
pub const CATALOG_SOURCE_NAMESPACE: &str = "openshift-marketplace";

const MAX_NAME_LEN: usize = 63;

static DNS_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSourceMeta {
    #[serde(flatten)]
    pub object: ObjectMeta,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    pub source_type: String,
    pub image: String,
}

/// A `CatalogSource` serving a mirrored catalog over grpc
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSourceDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CatalogSourceMeta,
    pub spec: CatalogSourceSpec,
}

impl CatalogSourceDocument {
    /// Build the resource for a catalog copied to `destination`
    pub fn new(destination: &str) -> Result<Self> {
        let spec = ImageSpec::parse(destination)?;
        Ok(Self {
            api_version: CATALOG_SOURCE_API_VERSION.to_string(),
            kind: "CatalogSource".to_string(),
            metadata: CatalogSourceMeta {
                object: ObjectMeta {
                    name: catalog_source_name(&spec)?,
                    creation_timestamp: None,
                },
                namespace: CATALOG_SOURCE_NAMESPACE.to_string(),
            },
            spec: CatalogSourceSpec {
                source_type: "grpc".to_string(),
                image: spec.reference,
            },
        })
    }
}

/// `cs-<repository>-<suffix>`, the suffix being the short digest or the sanitized tag
pub fn catalog_source_name(spec: &ImageSpec) -> Result<String> {
    let suffix = if spec.is_by_digest_only() {
        spec.short_digest().to_string()
    } else {
        spec.tag
            .chars()
            .take(SHORT_DIGEST_LEN)
            .map(|c| match c.to_ascii_lowercase() {
                c @ ('a'..='z' | '0'..='9' | '-') => c,
                _ => '-',
            })
            .collect()
    };
    let suffix = if suffix.is_empty() { "0".to_string() } else { suffix };

    let name = format!("cs-{}-{}", spec.component_name(), suffix)
        .to_ascii_lowercase()
        .replace(['.', '_'], "-");
    if name.len() > MAX_NAME_LEN || !DNS_LABEL_RE.is_match(&name) {
        return Err(MirrorError::ReferenceParse {
            reference: spec.reference.clone(),
            reason: format!("{:?} is not a valid CatalogSource name", name),
        });
    }
    Ok(name)
}

/// Writes one CatalogSource file per mirrored catalog under `<working_dir>/cluster-resources`
pub struct CatalogSourceGenerator {
    output_dir: PathBuf,
}

impl CatalogSourceGenerator {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            output_dir: working_dir.join(CLUSTER_RESOURCES_DIR),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generate a file for every `OperatorCatalog` image; returns the written paths
    pub fn generate(&self, images: &[CopyImageSchema]) -> Result<Vec<PathBuf>> {
        let catalogs: Vec<&CopyImageSchema> = images
            .iter()
            .filter(|i| i.image_type == ImageType::OperatorCatalog)
            .collect();
        if catalogs.is_empty() {
            info!("no catalogs mirrored, skipping CatalogSource generation");
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.output_dir)?;
        let mut written = Vec::new();
        for catalog in catalogs {
            let document = CatalogSourceDocument::new(&catalog.destination)?;
            let path = self
                .output_dir
                .join(format!("{}.yaml", document.metadata.object.name));
            fs::write(&path, serde_yaml::to_string(&document)?)?;
            debug!("catalog {} served by {}", catalog.origin, path.display());
            written.push(path);
        }
        info!("{} CatalogSource file(s) generated", written.len());
        Ok(written)
    }
}
