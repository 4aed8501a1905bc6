use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use elevation::{IncompletePolicy, InterpolationMethod, Resolution, VoidPolicy};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// HGT point ingestion and elevation query tool
#[derive(Parser)]
#[command(name = "elevation")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format for decoded points
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// `latitude,longitude,elevation` CSV with header
    Csv,
    /// Persisted point store file
    Store,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one HGT tile into point records
    Load {
        /// Path to .hgt or .hgt.zip file, or - for stdin
        input: Option<PathBuf>,

        /// Tile name (e.g. N00E006); defaults to the file name, required for stdin
        #[arg(short, long)]
        tile: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },

    /// Decode several HGT tiles into one output
    LoadMany {
        /// Paths to .hgt or .hgt.zip files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },

    /// Query elevation for a single coordinate
    Query {
        /// Point store file or directory of .hgt files
        #[arg(short, long, env = "ELEVATION_STORE")]
        store: PathBuf,

        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Interpolation method: nearest, bilinear or bicubic
        #[arg(short, long, default_value = "bilinear")]
        interpolation: InterpolationMethod,

        /// Interpolate directly on the tile grid (tile directories only)
        #[arg(long)]
        grid: bool,

        /// Sample resolution of the stored points
        #[arg(long, env = "ELEVATION_RESOLUTION", default_value = "srtm1")]
        resolution: Resolution,

        /// What to do when too few neighbors are found: reject or degrade
        #[arg(long, env = "ELEVATION_INCOMPLETE", default_value = "reject")]
        incomplete: IncompletePolicy,

        /// Void handling for grid interpolation: zero or nearest-valid
        #[arg(long, env = "ELEVATION_VOID_FILL", default_value = "zero")]
        void_fill: VoidPolicy,

        /// Maximum tiles in cache
        #[arg(short, long, env = "ELEVATION_CACHE_SIZE", default_value = "100")]
        cache_size: u64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Display information about an HGT tile
    Info {
        /// Path to .hgt or .hgt.zip file
        tile: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            input,
            tile,
            output,
            format,
        } => commands::load::run(input, tile, output, format),
        Commands::LoadMany {
            inputs,
            output,
            format,
        } => commands::load::run_many(inputs, output, format),
        Commands::Query {
            store,
            lat,
            lng,
            interpolation,
            grid,
            resolution,
            incomplete,
            void_fill,
            cache_size,
            json,
        } => commands::query::run(commands::query::QueryArgs {
            store,
            lat,
            lng,
            method: interpolation,
            grid,
            resolution,
            incomplete,
            void_fill,
            cache_size,
            json,
        }),
        Commands::Info { tile } => commands::info::run(tile),
    }
}
