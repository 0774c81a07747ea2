//! Mock copy implementation for testing
//!
//! Records every copy in memory, fails sources registered with
//! [`MockSystem::fail_on`], and tracks how many copies ran at once.

use ferry_core_interface::{CopyOptions, MirrorSystem, MirrorSystemError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct MockSystem {
    attempts: Arc<RwLock<Vec<String>>>,
    copies: Arc<RwLock<Vec<(String, String)>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every copy for `delay` before completing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make copies of `source` fail
    pub fn fail_on(&self, source: impl Into<String>) {
        self.failing.write().unwrap().insert(source.into());
    }

    /// Completed copies as (source, destination)
    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.read().unwrap().clone()
    }

    /// Sources handed to `copy`, successful or not
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.read().unwrap().clone()
    }

    /// Highest number of copies observed running together
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MirrorSystem for MockSystem {
    async fn copy(
        &self,
        cancel: &CancellationToken,
        source: &str,
        destination: &str,
        _options: &CopyOptions,
    ) -> Result<()> {
        self.attempts.write().unwrap().push(source.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let outcome = async {
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(MirrorSystemError::Cancelled {
                            source_ref: source.to_string(),
                            destination: destination.to_string(),
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if self.failing.read().unwrap().contains(source) {
                return Err(MirrorSystemError::CopyFailed {
                    source_ref: source.to_string(),
                    destination: destination.to_string(),
                    reason: "manifest unknown".to_string(),
                });
            }

            self.copies
                .write()
                .unwrap()
                .push((source.to_string(), destination.to_string()));
            Ok(())
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
