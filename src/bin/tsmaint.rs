use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};

use tsmaint::config::MaintenanceConfig;
use tsmaint::lifecycle::MaintenanceManager;
use tsmaint::store::DirConnector;

#[derive(Parser, Debug)]
#[command(name = "tsmaint")]
#[command(author, version, about = "Backup, synchronization and rotation of time-series stores", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Directory holding the stores named in the configuration
    /// (defaults to the directory of the configuration file)
    #[arg(long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy new records of every table into the backup target
    Backup,
    /// Merge the configured dump into the primary store
    Synchronize,
    /// Trim or homogenize data older than the retention period
    Rotate {
        /// Rewrite every eligible day instead of only the newest one
        #[arg(long)]
        full: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = MaintenanceConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    let root = cli
        .root
        .unwrap_or_else(|| config_dir(&cli.config).to_path_buf());

    let mut manager = MaintenanceManager::open(config, Box::new(DirConnector::new(&root)))
        .context("Failed to open primary store")?;

    let stats = match cli.command {
        Commands::Backup => manager.run_backup().context("Backup failed")?,
        Commands::Synchronize => manager
            .run_synchronize()
            .context("Synchronization failed")?,
        Commands::Rotate { full } => manager.run_rotate(full).context("Rotation failed")?,
    };

    let stats = stats.ensure_success()?;
    info!("Finished {} of {} tables", stats.operation, stats.scanned_count);
    Ok(())
}

fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
