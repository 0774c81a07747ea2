/*!
 * Logging setup
 *
 * Human-readable lines go to stdout unless a log file is configured, in
 * which case every event is written to that file as one JSON object per
 * line. `RUST_LOG` overrides the configured level.
 */

use std::fs::{self, File};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};

/// Level actually used: `verbose` wins over the configured level
pub fn effective_level(config: &MirrorConfig) -> Level {
    if config.verbose {
        Level::DEBUG
    } else {
        config.log_level.to_tracing_level()
    }
}

/// Filter for ferry's own events, unless `RUST_LOG` says otherwise
pub fn log_filter(config: &MirrorConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(format!("ferry={}", effective_level(config)))
        .map_err(|e| MirrorError::Config(format!("invalid log filter: {}", e)))
}

/// Install the global subscriber; fails if one is already installed
pub fn init_logging(config: &MirrorConfig) -> Result<()> {
    let filter = log_filter(config)?;

    let json_file = match config.log_file.as_deref() {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(path).map_err(|e| {
                MirrorError::Config(format!("cannot create log file {}: {}", path.display(), e))
            })?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_current_span(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };
    let console = json_file
        .is_none()
        .then(|| fmt::layer().compact().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json_file)
        .try_init()
        .map_err(|e| MirrorError::Config(format!("logging already initialized: {}", e)))
}

#[cfg(test)]
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new("ferry=debug"))
            .with(fmt::layer().with_test_writer().compact())
            .try_init();
    });
}
