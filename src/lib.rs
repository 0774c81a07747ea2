/*!
 * Ferry - disconnected registry mirroring
 *
 * Resolves which container images must be copied into a disconnected mirror
 * and copies them:
 * - operator catalog filtering by channel head, version range or full catalog
 * - copy planning against a destination registry
 * - fixed-size concurrent batches with fail-fast semantics
 * - ImageDigestMirrorSet / ImageTagMirrorSet and CatalogSource generation
 * - dry-run mapping and failure reports
 *
 * The image transport itself is pluggable through
 * [`ferry_core_interface::MirrorSystem`].
 */

pub mod batch;
pub mod catalog;
pub mod catalog_source;
pub mod commands;
pub mod config;
pub mod dry_run;
pub mod error;
pub mod image;
pub mod logging;
pub mod mirror_sets;
pub mod plan;
pub mod system;

// Re-export commonly used types
pub use batch::{BatchPlan, BatchSummary, BatchWorker};
pub use catalog::{read_catalog, CatalogFilter, IncludeConfig, RelatedImage};
pub use catalog_source::CatalogSourceGenerator;
pub use config::{MirrorConfig, OperatorConfig};
pub use error::{MirrorError, Result};
pub use image::{CopyImageSchema, ImageSpec, ImageType, MirrorCategory};
pub use mirror_sets::{MirrorSetGenerator, MirrorSetMode};
pub use plan::{plan_copies, CopyPlanner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
