/*!
 * Failure reports
 *
 * When a batch aborts, every failure is written to
 * `mirroring_errors_<YYYYMMDD_HHMMSS>.txt` in the logs directory so the
 * run can be diagnosed after the console output is gone.
 */

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::Result;
use crate::image::CopyImageSchema;

/// One failed copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFailure {
    pub image: CopyImageSchema,
    pub error: String,
}

impl ImageFailure {
    pub fn new(image: CopyImageSchema, error: impl ToString) -> Self {
        Self {
            image,
            error: error.to_string(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "error mirroring image {} ({}) error: {}",
            self.image.origin, self.image.image_type, self.error
        )
    }
}

/// Write `failures` to a timestamped report; returns None when there is nothing to report
pub fn save_failures(logs_dir: &Path, failures: &[ImageFailure]) -> Result<Option<PathBuf>> {
    if failures.is_empty() {
        return Ok(None);
    }

    fs::create_dir_all(logs_dir)?;
    let file_name = format!(
        "mirroring_errors_{}.txt",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = logs_dir.join(file_name);

    let mut writer = BufWriter::new(File::create(&path)?);
    for failure in failures {
        writeln!(writer, "{}", failure.message())?;
    }
    writer.flush()?;

    Ok(Some(path))
}
