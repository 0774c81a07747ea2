/*!
 * Batch concurrent worker
 *
 * Copies images in fixed-size batches. Every image of a batch runs as its
 * own task; the batch ends at a barrier where all tasks have finished.
 * Failures travel over a collector channel that is drained only after the
 * barrier, and any failure stops the run before the next batch starts.
 *
 * ```text
 * images: [ 0..8 ][ 8..16 ][16..20]
 *          batch 1  batch 2  remainder
 *            |        |        |
 *         barrier  barrier  barrier -> "successfully completed all batches"
 * ```
 */

pub mod report;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ferry_core_interface::{CopyOptions, MirrorSystem, MirrorSystemError};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{MirrorError, Result};
use crate::image::{CopyImageSchema, MirrorCategory};

pub use report::{save_failures, ImageFailure};

const WORKER_PREFIX: &str = "[Worker] ";

/// How a list of images is cut into batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub total: usize,
    /// Number of full batches
    pub count: usize,
    pub size: usize,
    /// Images left for a final partial batch
    pub remainder: usize,
}

impl BatchPlan {
    pub fn new(total: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        if total == 0 {
            return Self {
                total: 0,
                count: 0,
                size: 0,
                remainder: 0,
            };
        }
        if total < batch_size {
            return Self {
                total,
                count: 1,
                size: total,
                remainder: 0,
            };
        }
        Self {
            total,
            count: total / batch_size,
            size: batch_size,
            remainder: total % batch_size,
        }
    }
}

/// Copied images and per-category counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub copied: Vec<CopyImageSchema>,
    pub release: usize,
    pub operator: usize,
    pub additional: usize,
}

impl BatchSummary {
    fn record(&mut self, image: CopyImageSchema) {
        match image.image_type.category() {
            MirrorCategory::Release => self.release += 1,
            MirrorCategory::Operator => self.operator += 1,
            MirrorCategory::Generic => self.additional += 1,
        }
        self.copied.push(image);
    }

    pub fn total(&self) -> usize {
        self.copied.len()
    }
}

/// Runs planned copies through a [`MirrorSystem`] batch by batch
pub struct BatchWorker<S: MirrorSystem> {
    system: Arc<S>,
    options: CopyOptions,
    batch_size: usize,
    logs_dir: PathBuf,
    show_progress: bool,
}

impl<S: MirrorSystem> BatchWorker<S> {
    pub fn new(system: Arc<S>, options: CopyOptions) -> Self {
        Self {
            system,
            options,
            batch_size: DEFAULT_BATCH_SIZE,
            logs_dir: PathBuf::from("logs"),
            show_progress: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs_dir.into();
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Copy every image, stopping after the first batch that has a failure
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        images: &[CopyImageSchema],
    ) -> Result<BatchSummary> {
        let plan = BatchPlan::new(images.len(), self.batch_size);
        let mut summary = BatchSummary::default();
        if plan.total == 0 {
            info!("{}no images to copy", WORKER_PREFIX);
            return Ok(summary);
        }

        info!(
            "{}images to copy {} (batches {} of size {}, remainder {}) using {}",
            WORKER_PREFIX,
            plan.total,
            plan.count,
            plan.size,
            plan.remainder,
            self.system.name()
        );
        info!("{}Start copying the images...", WORKER_PREFIX);

        let progress = self.progress_bar(plan.total);
        let full = plan.count * plan.size;

        for (index, batch) in images[..full].chunks(plan.size).enumerate() {
            self.run_batch(index, batch, cancel, &mut summary, &progress)
                .await?;
        }

        if plan.remainder > 0 {
            debug!("{}remainder batch of {}", WORKER_PREFIX, plan.remainder);
            self.run_batch(plan.count, &images[full..], cancel, &mut summary, &progress)
                .await?;
        }

        progress.finish_and_clear();
        info!("{}successfully completed all batches", WORKER_PREFIX);
        info!(
            "{}images copied: release {} / operator {} / additional {}",
            WORKER_PREFIX, summary.release, summary.operator, summary.additional
        );
        Ok(summary)
    }

    async fn run_batch(
        &self,
        index: usize,
        batch: &[CopyImageSchema],
        cancel: &CancellationToken,
        summary: &mut BatchSummary,
        progress: &ProgressBar,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }
        debug!("{}batch {}: {} images", WORKER_PREFIX, index + 1, batch.len());

        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<ImageFailure>();
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for image in batch {
            let system = Arc::clone(&self.system);
            let options = self.options.clone();
            let token = cancel.clone();
            let failures = failures_tx.clone();
            let task_image = image.clone();

            let handle = tasks.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(MirrorSystemError::Cancelled {
                        source_ref: task_image.source.clone(),
                        destination: task_image.destination.clone(),
                    }),
                    result = system.copy(&token, &task_image.source, &task_image.destination, &options) => result,
                };
                match result {
                    Ok(()) => true,
                    Err(e) => {
                        let _ = failures.send(ImageFailure::new(task_image, e));
                        false
                    }
                }
            });
            in_flight.insert(handle.id(), image.clone());
        }

        // Barrier: every task of the batch has finished past this loop
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, copied)) => {
                    progress.inc(1);
                    if let Some(image) = in_flight.remove(&id) {
                        if copied {
                            debug!("{}copied {}", WORKER_PREFIX, image.origin);
                            summary.record(image);
                        }
                    }
                }
                Err(join_error) => {
                    progress.inc(1);
                    if let Some(image) = in_flight.remove(&join_error.id()) {
                        let _ = failures_tx.send(ImageFailure::new(image, join_error));
                    }
                }
            }
        }
        drop(failures_tx);

        let mut failures = Vec::new();
        while let Some(failure) = failures_rx.recv().await {
            failures.push(failure);
        }
        if failures.is_empty() {
            return Ok(());
        }

        progress.abandon();
        for failure in &failures {
            error!("{}{}", WORKER_PREFIX, failure.message());
        }
        match save_failures(&self.logs_dir, &failures) {
            Ok(Some(path)) => error!(
                "{}{} image(s) failed in batch {}, see {}",
                WORKER_PREFIX,
                failures.len(),
                index + 1,
                path.display()
            ),
            Ok(None) => {}
            Err(e) => error!("{}unable to save failure report: {}", WORKER_PREFIX, e),
        }

        Err(MirrorError::BatchAbort {
            batch: index,
            failed: failures.len(),
        })
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar
    }
}
