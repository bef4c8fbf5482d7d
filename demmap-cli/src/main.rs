use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::build::RasterFormat;
use commands::EngineArgs;

/// Tiled elevation engine CLI tool
#[derive(Parser)]
#[command(name = "demmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing elevation tiles; repeat for several, earlier wins.
    /// Defaults to DEMMAP_DATA_DIR
    #[arg(short, long = "data-dir", global = true)]
    data_dirs: Vec<PathBuf>,

    /// Tile cache budget in MiB [default: 512]
    #[arg(short, long, env = "DEMMAP_CACHE_MB", global = true)]
    cache_mb: Option<u64>,

    /// Cache eviction policy: lru or lfu [default: lru]
    #[arg(short, long, env = "DEMMAP_CACHE_POLICY", global = true)]
    policy: Option<demmap::PolicyKind>,

    /// Import the tile index from a manifest instead of scanning
    #[arg(short, long, env = "DEMMAP_MANIFEST", global = true)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a region into a raw little-endian height map
    Build {
        /// Southern latitude of the region
        #[arg(long, allow_hyphen_values = true)]
        min_lat: f64,

        /// Western longitude of the region
        #[arg(long, allow_hyphen_values = true)]
        min_lon: f64,

        /// Northern latitude of the region
        #[arg(long, allow_hyphen_values = true)]
        max_lat: f64,

        /// Eastern longitude of the region
        #[arg(long, allow_hyphen_values = true)]
        max_lon: f64,

        /// Output width in pixels
        #[arg(long, default_value = "1024")]
        width: u32,

        /// Output height in pixels
        #[arg(long, default_value = "1024")]
        height: u32,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Pixel type of the output
        #[arg(short, long, value_enum, default_value = "u16")]
        format: RasterFormat,

        /// Projection: mercator or equirectangular
        #[arg(long, default_value = "mercator")]
        projection: demmap::ProjectionKind,

        /// Stretch the region to fill the output instead of centring it
        #[arg(long)]
        stretch: bool,

        /// Lowest elevation of the mapped range in metres
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        min_elevation: f64,

        /// Highest elevation of the mapped range in metres
        #[arg(long, default_value = "9000")]
        max_elevation: f64,

        /// Write raw elevations instead of mapping a range
        #[arg(long, conflicts_with_all = ["min_elevation", "max_elevation"])]
        raw: bool,

        /// Sample tiles on the calling thread only
        #[arg(long)]
        sequential: bool,
    },

    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add elevations to every row of a CSV file
    Batch {
        /// Input CSV file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column name for latitude
        #[arg(long, default_value = "lat")]
        lat_col: String,

        /// Column name for longitude
        #[arg(long, default_value = "lon")]
        lon_col: String,
    },

    /// Display information about an indexed tile
    Info {
        /// Tile path or name (e.g., N35E138)
        tile: Option<String>,

        /// Select the tile covering this latitude
        #[arg(long, requires = "lon", conflicts_with = "tile", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Select the tile covering this longitude
        #[arg(long, requires = "lat", conflicts_with = "tile", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// List indexed tiles
    List,

    /// Scan the data directories and write a tile manifest
    Index {
        /// Manifest file to write
        #[arg(short, long, default_value = "tiles.xml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demmap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine_args = EngineArgs {
        data_dirs: cli.data_dirs,
        cache_mb: cli.cache_mb,
        policy: cli.policy,
        manifest: cli.manifest,
    };

    match cli.command {
        Commands::Build {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
            width,
            height,
            output,
            format,
            projection,
            stretch,
            min_elevation,
            max_elevation,
            raw,
            sequential,
        } => commands::build::run(
            &engine_args,
            commands::build::BuildArgs {
                min: demmap::GeoCoord::new(min_lat, min_lon),
                max: demmap::GeoCoord::new(max_lat, max_lon),
                width,
                height,
                output,
                format,
                projection,
                keep_aspect_ratio: !stretch,
                range: (!raw).then_some((min_elevation, max_elevation)),
                parallel: !sequential,
            },
        ),
        Commands::Query { lat, lon, json } => commands::query::run(&engine_args, lat, lon, json),
        Commands::Batch {
            input,
            output,
            lat_col,
            lon_col,
        } => commands::batch::run(&engine_args, input, output, lat_col, lon_col),
        Commands::Info { tile, lat, lon } => commands::info::run(&engine_args, tile, lat, lon),
        Commands::List => commands::list::run(&engine_args),
        Commands::Index { output } => commands::index::run(&engine_args, output),
    }
}
