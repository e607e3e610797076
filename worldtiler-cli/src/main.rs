//! WorldTiler CLI - Command-line interface
//!
//! Builds tile pyramids from a raster or a shapefile using the `worldtiler`
//! library. Settings come from `~/.worldtiler/config.ini` (or `--config`)
//! and are overridden by command flags.

mod commands;
mod error;
mod progress;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{init, overview, raster, vector};

#[derive(Debug, Parser)]
#[command(name = "worldtiler")]
#[command(version, about = "Build tile pyramids from rasters and shapefiles")]
struct Cli {
    /// Configuration file (defaults to ~/.worldtiler/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sample a raster into level N, then build levels N-1..0
    Raster(raster::RasterArgs),

    /// Build levels N-1..0 from tiles already present at level N
    Overview(overview::OverviewArgs),

    /// Clip a shapefile into one archive per tile
    Vector(vector::VectorArgs),

    /// Write a default configuration file
    InitConfig {
        /// Where to write the file (defaults to ~/.worldtiler/config.ini)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Raster(args) => raster::run(cli.config.as_deref(), cli.verbose, args),
        Commands::Overview(args) => overview::run(cli.config.as_deref(), cli.verbose, args),
        Commands::Vector(args) => vector::run(cli.config.as_deref(), cli.verbose, args),
        Commands::InitConfig { path } => init::run(path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
