/*!
 * Ferry CLI - Command Line Interface
 *
 * `ferry mirror` runs the whole pipeline: filter operator catalogs, plan the
 * copies, copy them in batches (or write a dry-run mapping) and generate the
 * IDMS/ITMS and CatalogSource files. The other subcommands expose single stages.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ferry::{
    batch::BatchWorker,
    catalog::{read_catalog, CatalogFilter, IncludeChannel, IncludeConfig, IncludePackage},
    catalog_source::CatalogSourceGenerator,
    commands::init::{run_init, InitPreset, DEFAULT_CONFIG_FILE},
    config::{LogLevel, MirrorConfig},
    dry_run::DryRunSimulator,
    error::{MirrorError, EXIT_FATAL, EXIT_SUCCESS},
    image::CopyImageSchema,
    logging,
    mirror_sets::MirrorSetGenerator,
    plan::plan_copies,
    system::SkopeoSystem,
    RelatedImage,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(version, about = "Mirror operator catalogs, release and additional images into a disconnected registry", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stdout
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter catalogs, copy images and generate IDMS/ITMS
    Mirror {
        /// Destination registry, e.g. docker://registry.local:5000/mirror
        #[arg(short = 'd', long = "dest")]
        destination: Option<String>,

        /// Working directory for cluster resources and dry-run output
        #[arg(short = 'w', long)]
        working_dir: Option<PathBuf>,

        /// Plan and generate mirror sets without copying
        #[arg(long)]
        dry_run: bool,

        /// Key mirror sets by repository instead of namespace
        #[arg(long)]
        force_repository_scope: bool,

        /// Images copied concurrently per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Fold destination paths deeper than this
        #[arg(long)]
        max_nested_paths: Option<usize>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the images an operator catalog filter selects, as JSON
    Filter {
        /// Rendered catalog (file or directory)
        #[arg(long, value_name = "PATH")]
        catalog: PathBuf,

        /// Package to include (repeatable; none means every package)
        #[arg(short = 'p', long = "package")]
        packages: Vec<String>,

        /// Channel to include (repeatable; requires exactly one --package)
        #[arg(long = "channel")]
        channels: Vec<String>,

        /// Lowest version to include
        #[arg(long)]
        min_version: Option<String>,

        /// Highest version to include
        #[arg(long)]
        max_version: Option<String>,

        /// Take every bundle instead of channel heads
        #[arg(long)]
        full: bool,
    },

    /// Generate IDMS/ITMS from a JSON list of copied images
    MirrorSets {
        /// JSON array of {source, destination, origin, type}
        #[arg(long, value_name = "FILE")]
        images: PathBuf,

        /// Working directory; files land in <dir>/cluster-resources
        #[arg(short = 'w', long, default_value = "working-dir")]
        working_dir: PathBuf,

        /// Key mirror sets by repository instead of namespace
        #[arg(long)]
        force_repository_scope: bool,
    },

    /// Write a starter configuration file
    Init {
        /// Where to write the configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Preset to start from
        #[arg(long, value_enum, default_value = "default")]
        preset: PresetArg,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Default,
    Insecure,
    Flat,
}

impl From<PresetArg> for InitPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Default => InitPreset::Default,
            PresetArg::Insecure => InitPreset::Insecure,
            PresetArg::Flat => InitPreset::Flat,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<MirrorError>()
                .map(MirrorError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => MirrorConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => MirrorConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    if !matches!(cli.command, Commands::Init { .. }) {
        if let Err(e) = logging::init_logging(&config) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }
    }

    match cli.command {
        Commands::Mirror {
            destination,
            working_dir,
            dry_run,
            force_repository_scope,
            batch_size,
            max_nested_paths,
            no_progress,
        } => {
            if let Some(destination) = destination {
                config.destination = destination;
            }
            if let Some(working_dir) = working_dir {
                config.working_dir = working_dir;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if let Some(max_nested_paths) = max_nested_paths {
                config.max_nested_paths = max_nested_paths;
            }
            config.dry_run |= dry_run;
            config.force_repository_scope |= force_repository_scope;
            config.show_progress &= !no_progress;
            handle_mirror_command(&config)
        }
        Commands::Filter {
            catalog,
            packages,
            channels,
            min_version,
            max_version,
            full,
        } => handle_filter_command(
            &catalog,
            packages,
            channels,
            min_version,
            max_version,
            full,
        ),
        Commands::MirrorSets {
            images,
            working_dir,
            force_repository_scope,
        } => handle_mirror_sets_command(&images, &working_dir, force_repository_scope),
        Commands::Init {
            output,
            preset,
            force,
        } => run_init(&output, preset.into(), force),
    }
}

fn handle_mirror_command(config: &MirrorConfig) -> Result<()> {
    let mut related: BTreeMap<String, Vec<RelatedImage>> = BTreeMap::new();
    for operator in &config.operators {
        info!("filtering catalog {}", operator.catalog);
        let catalog = read_catalog(&operator.catalog_path)?;
        let selected = CatalogFilter::new(&catalog).filter(&operator.include, operator.full)?;
        related.extend(selected);
    }

    let images = plan_copies(config, &related)?;
    let generator = MirrorSetGenerator::new(&config.working_dir);
    let catalog_sources = CatalogSourceGenerator::new(&config.working_dir);

    if config.dry_run {
        let mut simulator = DryRunSimulator::new(&config.working_dir);
        simulator.record_all(&images);
        let mapping = simulator.write_mapping()?;
        generator.generate(&images, config.force_repository_scope)?;
        catalog_sources.generate(&images)?;
        simulator.print_summary(&mapping);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let summary = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling copies");
                on_signal.cancel();
            }
        });

        let system = Arc::new(SkopeoSystem::new(config.skopeo_path.clone()));
        BatchWorker::new(system, config.copy.clone())
            .with_batch_size(config.batch_size)
            .with_logs_dir(config.logs_dir())
            .with_progress(config.show_progress)
            .run(&cancel, &images)
            .await
    })?;

    let written = generator.generate(&summary.copied, config.force_repository_scope)?;
    let sources = catalog_sources.generate(&summary.copied)?;
    println!(
        "Mirrored {} images (release {}, operator {}, additional {}); {} mirror set and {} CatalogSource file(s) in {}",
        summary.total(),
        summary.release,
        summary.operator,
        summary.additional,
        written.len(),
        sources.len(),
        generator.output_dir().display()
    );
    Ok(())
}

fn handle_filter_command(
    catalog_path: &Path,
    packages: Vec<String>,
    channels: Vec<String>,
    min_version: Option<String>,
    max_version: Option<String>,
    full: bool,
) -> Result<()> {
    let has_package_options = !channels.is_empty() || min_version.is_some() || max_version.is_some();
    if has_package_options && packages.len() != 1 {
        return Err(MirrorError::ConfigurationConflict(
            "--channel, --min-version and --max-version need exactly one --package".to_string(),
        )
        .into());
    }

    let include = IncludeConfig {
        packages: packages
            .into_iter()
            .map(|name| IncludePackage {
                name,
                channels: channels.iter().cloned().map(IncludeChannel::new).collect(),
                min_version: min_version.clone(),
                max_version: max_version.clone(),
            })
            .collect(),
    };

    let catalog = read_catalog(catalog_path)?;
    let selected = CatalogFilter::new(&catalog).filter(&include, full)?;
    println!("{}", serde_json::to_string_pretty(&selected)?);
    Ok(())
}

fn handle_mirror_sets_command(
    images_path: &Path,
    working_dir: &Path,
    force_repository_scope: bool,
) -> Result<()> {
    let contents = std::fs::read_to_string(images_path)
        .with_context(|| format!("Failed to read {}", images_path.display()))?;
    let images: Vec<CopyImageSchema> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", images_path.display()))?;

    let written = MirrorSetGenerator::new(working_dir).generate(&images, force_repository_scope)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
