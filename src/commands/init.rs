/*!
 * Ferry Init Command
 *
 * Writes a starter configuration file built from one of the presets, with an
 * example operator catalog entry the user edits before the first run.
 */

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::catalog::{IncludeConfig, IncludePackage};
use crate::config::{MirrorConfig, OperatorConfig};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "ferry.toml";

/// Starting point for a generated configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPreset {
    Default,
    /// Registries with self-signed certificates
    Insecure,
    /// Registries limited to two path levels
    Flat,
}

/// Build the configuration written by `ferry init`
pub fn starter_config(preset: InitPreset) -> MirrorConfig {
    let mut config = match preset {
        InitPreset::Default => MirrorConfig::default(),
        InitPreset::Insecure => MirrorConfig::insecure_preset(),
        InitPreset::Flat => MirrorConfig::flat_registry_preset(),
    };

    config.destination = "docker://registry.example.com:5000/mirror".to_string();
    config.operators = vec![OperatorConfig {
        catalog: "registry.redhat.io/redhat/redhat-operator-index:v4.16".to_string(),
        catalog_path: PathBuf::from("catalogs/redhat-operator-index"),
        full: false,
        include: IncludeConfig {
            packages: vec![IncludePackage::new("example-operator")],
        },
    }];
    config
}

/// Write a starter configuration to `path`
pub fn run_init(path: &Path, preset: InitPreset, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "configuration {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let config = starter_config(preset);
    config
        .to_file(path)
        .with_context(|| format!("Failed to save configuration to {}", path.display()))?;

    print_summary(path, &config);
    Ok(())
}

fn print_summary(config_path: &Path, config: &MirrorConfig) {
    println!();
    println!("  Configuration saved: {}", config_path.display());
    println!();
    println!("  Destination:       {}", config.destination);
    println!("  Batch size:        {}", config.batch_size);
    println!("  Max nested paths:  {}", config.max_nested_paths);
    println!("  Repository scope:  {}", config.force_repository_scope);
    println!("  TLS verify (dest): {}", config.copy.dest_tls_verify);
    println!();
    println!("  Next steps:");
    println!("  1. Point `catalog_path` at a rendered catalog and list the packages you need");
    println!("  2. Run 'ferry --config {} mirror --dry-run'", config_path.display());
    println!();
}
