//! Ferry Core Interface: Image Copy Capability
//!
//! This crate defines the `MirrorSystem` trait, the single capability the batch
//! worker needs from an image transport: copy one artifact from a source
//! reference to a destination reference.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferry_core_interface::{CopyOptions, MirrorSystem};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn mirror_one<S: MirrorSystem>(system: &S) -> ferry_core_interface::Result<()> {
//!     let token = CancellationToken::new();
//!     system
//!         .copy(
//!             &token,
//!             "docker://quay.io/ns/repo:v1",
//!             "docker://registry.local:5000/ns/repo:v1",
//!             &CopyOptions::default(),
//!         )
//!         .await
//! }
//! ```
//!
//! Implementations must honour the cancellation token: once it fires, an
//! in-flight copy returns `MirrorSystemError::Cancelled` promptly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum MirrorSystemError {
    #[error("copy cancelled: {source_ref} -> {destination}")]
    Cancelled {
        source_ref: String,
        destination: String,
    },

    #[error("copy failed: {source_ref} -> {destination}: {reason}")]
    CopyFailed {
        source_ref: String,
        destination: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System error: {0}")]
    System(String),
}

impl MirrorSystemError {
    /// True when the error came from the cancellation token rather than the transport
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MirrorSystemError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, MirrorSystemError>;

/// Per-copy transport options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    /// Drop signatures when copying (mirrors rarely hold the signing keys)
    #[serde(default = "default_true")]
    pub remove_signatures: bool,

    /// Verify TLS certificates of the source registry
    #[serde(default = "default_true")]
    pub src_tls_verify: bool,

    /// Verify TLS certificates of the destination registry
    #[serde(default = "default_true")]
    pub dest_tls_verify: bool,

    /// Refuse copies that would change the manifest digest
    #[serde(default = "default_true")]
    pub preserve_digests: bool,

    /// Copy every architecture of a manifest list
    #[serde(default = "default_true")]
    pub all_architectures: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            remove_signatures: true,
            src_tls_verify: true,
            dest_tls_verify: true,
            preserve_digests: true,
            all_architectures: true,
        }
    }
}

/// The copy capability consumed by the batch worker
///
/// - **SkopeoSystem**: shells out to an external copy tool
/// - **MockSystem**: records calls for tests
///
/// Implementations must be `Send + Sync + 'static` so one instance can be
/// shared by every task of a batch.
#[async_trait]
pub trait MirrorSystem: Send + Sync + 'static {
    /// Copy `source` to `destination`
    ///
    /// # Errors
    ///
    /// Returns `MirrorSystemError::Cancelled` when `cancel` fires before the
    /// copy finishes, `MirrorSystemError::CopyFailed` when the transport rejects it.
    async fn copy(
        &self,
        cancel: &CancellationToken,
        source: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Result<()>;

    /// Short human-readable name used in logs
    fn name(&self) -> &'static str;
}
