//! Build the per-order training table from a directory of Olist tables.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release --bin build_features -- --data-dir data/olist --output training.parquet
//! cargo run --release --bin build_features -- --data-dir data/olist --output training.csv \
//!     --include-distance --summary training.summary.json
//! ```
//!
//! The input directory holds the Olist CSV (or Parquet) exports, e.g.
//! `olist_orders_dataset.csv`. The output format follows the extension of
//! `--output`.

use std::path::PathBuf;

use clap::Parser;
use indicatif::{HumanCount, HumanDuration};
use olist_features::config::FeatureConfig;
use olist_features::features::FeatureBuilder;
use olist_features::loader::{DirectoryLoader, write_table};
use olist_features::summary::summarize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Build the per-order training table from raw Olist tables")]
struct Args {
    /// Directory containing the Olist table files (.csv or .parquet).
    #[arg(long)]
    data_dir: PathBuf,

    /// Output path; `.parquet` writes Parquet, anything else CSV.
    #[arg(long)]
    output: PathBuf,

    /// JSON file with a `FeatureConfig`. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Add the mean seller-customer distance column (needs `geolocation`).
    #[arg(long, default_value_t = false)]
    include_distance: bool,

    /// Keep orders of every status, not only delivered ones.
    #[arg(long, default_value_t = false)]
    all_statuses: bool,

    /// Write per-column summary statistics of the output as JSON.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FeatureConfig::from_json_file(path)?,
        None => FeatureConfig::default(),
    };
    if args.include_distance {
        config.include_distance = true;
    }
    if args.all_statuses {
        config.only_delivered = false;
    }

    info!("Data dir: {}", args.data_dir.display());
    info!("Output:   {}", args.output.display());
    info!(
        "Config:   only_delivered={} include_distance={}",
        config.only_delivered, config.include_distance
    );

    let pipeline_start = std::time::Instant::now();

    // ── Step 1: Load tables ────────────────────────────────────────────
    let builder = FeatureBuilder::new(&DirectoryLoader::new(&args.data_dir))?;
    info!(
        "Loaded {} tables in {}",
        builder.dataset().len(),
        HumanDuration(pipeline_start.elapsed())
    );

    // ── Step 2: Build features ─────────────────────────────────────────
    let build_start = std::time::Instant::now();
    let training = builder.training_data(&config)?;
    info!(
        "Built {} rows x {} columns in {}",
        HumanCount(training.num_rows() as u64),
        training.num_columns(),
        HumanDuration(build_start.elapsed())
    );

    // ── Step 3: Write outputs ──────────────────────────────────────────
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_table(&training, &args.output)?;

    if let Some(path) = &args.summary {
        summarize(&training)?.write_json(path)?;
        info!("Wrote summary to {}", path.display());
    }

    info!(
        "Feature build complete in {}!",
        HumanDuration(pipeline_start.elapsed())
    );
    Ok(())
}
