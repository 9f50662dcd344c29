//! Ambient CLI - PBR material dataset pipeline
//!
//! # Commands
//!
//! - `ambient check` - Validate the config and report missing directories/programs
//! - `ambient fetch-catalog` - Download the material catalog CSV
//! - `ambient download` - Download material zips listed in the catalog
//! - `ambient unzip` - Extract downloaded zips into the dataset directory
//! - `ambient render` - Produce the canonical render of every material
//! - `ambient pack` - Build the record store from the dataset
//! - `ambient inspect` - Show store contents
//!
//! # Usage
//!
//! ```bash
//! ambient fetch-catalog && ambient download && ambient unzip
//! ambient render
//! ambient pack --rebuild
//! ```
//!
//! Every command reads `ambientCFG.json` from the current directory unless
//! `--config` points elsewhere. Set `RUST_LOG=debug` for per-material progress.

mod check;
mod download;
mod inspect;
mod pack;
mod render;
mod unzip;

use std::path::{Path, PathBuf};

use ambientproc_core::{ConfigError, PackConfig, preflight};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// Ambient CLI - PBR material dataset pipeline
#[derive(Parser)]
#[command(name = "ambient")]
#[command(about = "Download, render and pack PBR material datasets")]
#[command(version)]
struct Cli {
    /// Pipeline config file (JSON, or TOML by extension)
    #[arg(short, long, global = true, default_value = "ambientCFG.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config and report missing directories or programs
    Check,

    /// Download the material catalog CSV into the cache directory
    FetchCatalog,

    /// Download material zips listed in the catalog CSV
    Download(download::DownloadArgs),

    /// Extract downloaded zips into the dataset directory
    Unzip,

    /// Render every material that has no render yet
    Render(render::RenderArgs),

    /// Build the record store from the dataset
    Pack(pack::PackArgs),

    /// Show store contents
    Inspect(inspect::InspectArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let validate = needs_pack_settings(&cli.command);
    let config = load_config(&cli.config, validate)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let missing = if validate {
        preflight::check(&config)
    } else {
        Vec::new()
    };

    match cli.command {
        Commands::Check => check::execute(&config, &missing),
        Commands::FetchCatalog => download::fetch_catalog(&config),
        Commands::Download(args) => download::execute(&config, args),
        Commands::Unzip => unzip::execute(&config),
        Commands::Render(args) => render::execute(&config, &missing, args),
        Commands::Pack(args) => pack::execute(&config, &missing, args),
        Commands::Inspect(args) => inspect::execute(&config, args),
    }
}

/// Download-side commands only use directories and download settings.
fn needs_pack_settings(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::FetchCatalog | Commands::Download(_) | Commands::Unzip
    )
}

fn load_config(path: &Path, validate: bool) -> Result<PackConfig, ConfigError> {
    if validate {
        PackConfig::load(path)
    } else {
        PackConfig::read(path)
    }
}
