/*!
 * Copy planning
 *
 * Turns the images selected from operator catalogs, together with the
 * configured release and additional images, into the list of copies the
 * batch worker runs. Each origin is copied once; when the same origin is
 * added twice the first image type wins.
 *
 * Operator catalog images are planned too, so the cluster can serve the
 * mirrored catalog through a CatalogSource.
 */

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::catalog::RelatedImage;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::image::{
    with_max_nested_paths, CopyImageSchema, ImageSpec, ImageType, DOCKER_PROTOCOL, OCI_PROTOCOL,
};

/// Builds [`CopyImageSchema`] entries against one destination registry
#[derive(Debug, Clone)]
pub struct CopyPlanner {
    destination: String,
    max_nested_paths: usize,
    seen: HashSet<String>,
    images: Vec<CopyImageSchema>,
}

impl CopyPlanner {
    /// `destination` is a registry with an optional path, with or without `docker://`
    pub fn new(destination: &str, max_nested_paths: usize) -> Result<Self> {
        let registry = destination
            .trim()
            .trim_start_matches(DOCKER_PROTOCOL)
            .trim_end_matches('/');
        if registry.is_empty() {
            return Err(MirrorError::Config(
                "destination registry is not set".to_string(),
            ));
        }
        if registry.contains("://") {
            return Err(MirrorError::Config(format!(
                "destination {} must be a docker registry",
                destination
            )));
        }

        Ok(Self {
            destination: registry.to_string(),
            max_nested_paths,
            seen: HashSet::new(),
            images: Vec::new(),
        })
    }

    /// Plan one copy; returns false when the origin was already planned
    pub fn add(&mut self, origin: &str, image_type: ImageType) -> Result<bool> {
        let spec = ImageSpec::parse(origin)?;
        if spec.transport != DOCKER_PROTOCOL {
            return Err(MirrorError::ReferenceParse {
                reference: origin.to_string(),
                reason: format!("transport {} cannot be mirrored", spec.transport),
            });
        }
        if !self.seen.insert(spec.reference.clone()) {
            debug!("{} already planned, skipping", spec.reference);
            return Ok(false);
        }

        let destination = format!(
            "{}{}/{}{}",
            DOCKER_PROTOCOL,
            self.destination,
            spec.path_component,
            spec.locator()
        );
        let destination = with_max_nested_paths(&destination, self.max_nested_paths)?;

        self.images.push(CopyImageSchema {
            source: format!("{}{}", DOCKER_PROTOCOL, spec.reference),
            destination,
            origin: spec.reference,
            image_type,
        });
        Ok(true)
    }

    /// Plan every image of every selected bundle
    pub fn add_related(&mut self, related: &BTreeMap<String, Vec<RelatedImage>>) -> Result<()> {
        for (bundle, images) in related {
            debug!("planning {} images of bundle {}", images.len(), bundle);
            for image in images {
                self.add(&image.image, image.image_type)?;
            }
        }
        Ok(())
    }

    pub fn add_all(&mut self, origins: &[String], image_type: ImageType) -> Result<()> {
        for origin in origins {
            self.add(origin, image_type)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn finish(self) -> Vec<CopyImageSchema> {
        info!("planned {} images", self.images.len());
        self.images
    }
}

/// Plan a run: catalogs and operator images first, then release images, then additional images
pub fn plan_copies(
    config: &MirrorConfig,
    related: &BTreeMap<String, Vec<RelatedImage>>,
) -> Result<Vec<CopyImageSchema>> {
    let mut planner = CopyPlanner::new(&config.destination, config.max_nested_paths)?;
    for operator in &config.operators {
        if operator.catalog.starts_with(OCI_PROTOCOL) {
            warn!("catalog {} is a local layout, not mirroring it", operator.catalog);
            continue;
        }
        planner.add(&operator.catalog, ImageType::OperatorCatalog)?;
    }
    planner.add_related(related)?;
    planner.add_all(&config.release_images, ImageType::ReleaseImage)?;
    planner.add_all(&config.additional_images, ImageType::Generic)?;
    Ok(planner.finish())
}
