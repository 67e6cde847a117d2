//! CLI entry point for the ward locator ETL tool.
//!
//! Provides subcommands for running the full pipeline over the gazetteer,
//! postal code and synthetic grid datasets, and for generating a keyed
//! point grid on its own.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use ward_locator::{
    geokey::{self, Accuracy},
    grid::generate_grid,
    output::save_records,
    pipeline::{self, DEFAULT_LAT_RANGE, DEFAULT_LONG_RANGE, PipelineConfig},
    progress::LogSink,
};

#[derive(Parser)]
#[command(name = "ward_locator")]
#[command(about = "Locate point datasets within ward boundaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: grid, gazetteer and postal codes
    Process {
        /// Directory containing geonames.tsv, geonames_features.tsv and
        /// postal_codes.tsv
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Ward boundary file (.shp or .geojson)
        #[arg(short, long, default_value = "data/wards.geojson")]
        boundaries: PathBuf,

        /// Directory for the located datasets and run stats
        #[arg(short, long, default_value = "processed_data")]
        output_dir: PathBuf,

        /// Directory for the flattened per-unit datasets
        #[arg(long, default_value = "datasets")]
        datasets_dir: PathBuf,

        /// Key accuracy in meters (power of ten, 1 to 100000)
        #[arg(short, long, default_value_t = 1000)]
        accuracy_m: u32,

        /// Rows per processing chunk (adaptive when omitted)
        #[arg(short, long)]
        chunksize: Option<usize>,

        /// Grid bounding box
        #[arg(long, default_value_t = DEFAULT_LAT_RANGE.0)]
        lat_min: f64,
        #[arg(long, default_value_t = DEFAULT_LAT_RANGE.1)]
        lat_max: f64,
        #[arg(long, default_value_t = DEFAULT_LONG_RANGE.0)]
        long_min: f64,
        #[arg(long, default_value_t = DEFAULT_LONG_RANGE.1)]
        long_max: f64,

        /// Report join-loss diagnostics at info level
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    },
    /// Generate a keyed point grid and save it, without joining
    Grid {
        #[arg(long, default_value_t = DEFAULT_LAT_RANGE.0)]
        lat_min: f64,
        #[arg(long, default_value_t = DEFAULT_LAT_RANGE.1)]
        lat_max: f64,
        #[arg(long, default_value_t = DEFAULT_LONG_RANGE.0)]
        long_min: f64,
        #[arg(long, default_value_t = DEFAULT_LONG_RANGE.1)]
        long_max: f64,

        /// Key accuracy in meters (power of ten, 1 to 100000)
        #[arg(short, long, default_value_t = 1000)]
        accuracy_m: u32,

        /// Directory to write the grid file to
        #[arg(short, long, default_value = "processed_data")]
        output_dir: PathBuf,

        /// Destination filename
        #[arg(short, long, default_value = "grid.json.gz")]
        filename: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ward_locator.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ward_locator.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            data_dir,
            boundaries,
            output_dir,
            datasets_dir,
            accuracy_m,
            chunksize,
            lat_min,
            lat_max,
            long_min,
            long_max,
            verbose,
        } => {
            let config = PipelineConfig {
                gazetteer: data_dir.join("geonames.tsv"),
                feature_codes: data_dir.join("geonames_features.tsv"),
                postal_codes: data_dir.join("postal_codes.tsv"),
                boundaries,
                output_dir,
                datasets_dir,
                accuracy: Accuracy::from_meters(accuracy_m)?,
                chunksize,
                lat_range: (lat_min, lat_max),
                long_range: (long_min, long_max),
            };
            let mut sink = LogSink { verbose };
            let summary = pipeline::run(&config, &mut sink)?;
            info!(
                grid = summary.grid.located,
                gazetteer = summary.gazetteer.located,
                postal_codes = summary.postal_codes.located,
                "located record counts"
            );
        }
        Commands::Grid {
            lat_min,
            lat_max,
            long_min,
            long_max,
            accuracy_m,
            output_dir,
            filename,
        } => {
            let accuracy = Accuracy::from_meters(accuracy_m)?;
            let mut sink = LogSink { verbose: false };
            let mut grid = generate_grid((lat_min, lat_max), (long_min, long_max), accuracy, &mut sink);
            geokey::generate_key(&mut grid, accuracy)?;
            let path = save_records(&grid, &output_dir, &filename)?;
            info!(path = %path.display(), rows = grid.len(), "grid saved");
        }
    }

    Ok(())
}
