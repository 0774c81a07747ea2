/*!
 * Configuration types for Ferry
 */

use std::path::{Path, PathBuf};

use ferry_core_interface::CopyOptions;
use serde::{Deserialize, Serialize};

use crate::catalog::IncludeConfig;
use crate::error::Result;

/// Number of images copied concurrently per batch
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Main configuration for a mirroring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Directory holding generated cluster resources and dry-run output
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Directory for failure reports (defaults to `<working_dir>/logs`)
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    /// Destination registry, e.g. `docker://registry.local:5000/mirror`
    #[serde(default)]
    pub destination: String,

    /// Images copied concurrently before the next barrier
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Always key mirror sets by repository instead of namespace
    #[serde(default)]
    pub force_repository_scope: bool,

    /// Fold destination paths deeper than this (0 = unlimited)
    #[serde(default)]
    pub max_nested_paths: usize,

    /// Plan and generate mirror sets without copying
    #[serde(default)]
    pub dry_run: bool,

    /// Show a progress bar while copying
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,

    /// Path of the external copy tool
    #[serde(default = "default_skopeo_path")]
    pub skopeo_path: PathBuf,

    /// Transport options passed to every copy
    #[serde(default)]
    pub copy: CopyOptions,

    /// Operator catalogs to filter
    #[serde(default)]
    pub operators: Vec<OperatorConfig>,

    /// Release payload images, mirrored as-is
    #[serde(default)]
    pub release_images: Vec<String>,

    /// Additional images, mirrored as-is
    #[serde(default)]
    pub additional_images: Vec<String>,
}

/// One operator catalog and what to take from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Catalog image reference; mirrored alongside the selected bundles
    pub catalog: String,

    /// Rendered declarative config on disk (file or directory)
    pub catalog_path: PathBuf,

    /// Take every bundle instead of channel heads
    #[serde(default)]
    pub full: bool,

    #[serde(flatten)]
    pub include: IncludeConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            logs_dir: None,
            destination: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            force_repository_scope: false,
            max_nested_paths: 0,
            dry_run: false,
            show_progress: true,
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
            skopeo_path: default_skopeo_path(),
            copy: CopyOptions::default(),
            operators: Vec::new(),
            release_images: Vec::new(),
            additional_images: Vec::new(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("working-dir")
}

fn default_skopeo_path() -> PathBuf {
    PathBuf::from("skopeo")
}

impl MirrorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MirrorConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Where failure reports are written
    pub fn logs_dir(&self) -> PathBuf {
        self.logs_dir
            .clone()
            .unwrap_or_else(|| self.working_dir.join("logs"))
    }

    /// Configuration for registries with self-signed certificates
    pub fn insecure_preset() -> Self {
        Self {
            copy: CopyOptions {
                src_tls_verify: false,
                dest_tls_verify: false,
                ..CopyOptions::default()
            },
            ..Default::default()
        }
    }

    /// Configuration for registries limited to two path levels
    pub fn flat_registry_preset() -> Self {
        Self {
            max_nested_paths: 2,
            force_repository_scope: true,
            ..Default::default()
        }
    }
}
