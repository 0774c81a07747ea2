/*!
 * Dry-run mode
 *
 * Previews a mirroring run without copying anything. The planned copies are
 * written to `<working_dir>/dry-run/mapping.txt`, one `source=destination`
 * line each, and summarized per category.
 */

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::image::{CopyImageSchema, MirrorCategory};

pub const DRY_RUN_DIR: &str = "dry-run";
pub const MAPPING_FILE: &str = "mapping.txt";

/// Counts of planned copies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunSummary {
    pub release: usize,
    pub operator: usize,
    pub additional: usize,
}

impl DryRunSummary {
    pub fn total(&self) -> usize {
        self.release + self.operator + self.additional
    }
}

/// Records the copies a run would perform
#[derive(Debug, Clone)]
pub struct DryRunSimulator {
    output_dir: PathBuf,
    planned: Vec<CopyImageSchema>,
}

impl DryRunSimulator {
    pub fn new(working_dir: &Path) -> Self {
        Self {
            output_dir: working_dir.join(DRY_RUN_DIR),
            planned: Vec::new(),
        }
    }

    pub fn record_copy(&mut self, image: &CopyImageSchema) {
        info!(
            target: "dry_run",
            "[DRY-RUN] Would copy: {} -> {} ({})",
            image.source,
            image.destination,
            image.image_type
        );
        self.planned.push(image.clone());
    }

    pub fn record_all(&mut self, images: &[CopyImageSchema]) {
        for image in images {
            self.record_copy(image);
        }
    }

    pub fn planned(&self) -> &[CopyImageSchema] {
        &self.planned
    }

    pub fn summary(&self) -> DryRunSummary {
        let mut summary = DryRunSummary::default();
        for image in &self.planned {
            match image.image_type.category() {
                MirrorCategory::Release => summary.release += 1,
                MirrorCategory::Operator => summary.operator += 1,
                MirrorCategory::Generic => summary.additional += 1,
            }
        }
        summary
    }

    /// Write the mapping file and return its path
    pub fn write_mapping(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(MAPPING_FILE);

        let mut writer = BufWriter::new(File::create(&path)?);
        for image in &self.planned {
            writeln!(writer, "{}={}", image.source, image.destination)?;
        }
        writer.flush()?;

        info!("dry-run mapping written to {}", path.display());
        Ok(path)
    }

    /// Print summary to stdout
    pub fn print_summary(&self, mapping: &Path) {
        let summary = self.summary();
        println!("\nDry-run summary");
        println!("  Release images:    {}", summary.release);
        println!("  Operator images:   {}", summary.operator);
        println!("  Additional images: {}", summary.additional);
        println!("  Total:             {}", summary.total());
        println!("\n  Nothing was copied (dry-run mode).");
        println!("  Mapping: {}\n", mapping.display());
    }
}
