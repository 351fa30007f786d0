//! Inspect a table produced by `build_features` (or any Olist table): dump
//! schema, column statistics and sample rows in a human-readable format.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release --bin inspect -- --table training.parquet
//! cargo run --release --bin inspect -- --table training.csv --sample-rows 10
//! ```

use std::path::PathBuf;

use arrow::util::display::{ArrayFormatter, FormatOptions};
use clap::Parser;
use olist_features::loader::read_table;
use olist_features::summary::{ColumnSummary, summarize};

const CELL_WIDTH: usize = 18;

#[derive(Parser, Debug)]
#[command(about = "Inspect a feature table")]
struct Args {
    /// Path to a .parquet or .csv table.
    #[arg(long)]
    table: PathBuf,

    /// Number of sample rows to dump (0 to skip).
    #[arg(long, default_value_t = 5)]
    sample_rows: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let batch = read_table(&args.table)?;
    let summary = summarize(&batch)?;
    let schema = batch.schema();

    // ── Overview ──────────────────────────────────────────────────────────
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Table: {}", args.table.display());
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Rows:       {:>10}", batch.num_rows());
    println!("║  Columns:    {:>10}", batch.num_columns());
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // ── Columns ───────────────────────────────────────────────────────────
    println!("┌─ Columns");
    for (ci, field) in schema.fields().iter().enumerate() {
        println!("│  [{ci}] {} : {}", field.name(), field.data_type());
        if let Some(stats) = summary.columns.get(field.name()) {
            print_stats(stats, "│      ");
        }
    }

    // ── Sample rows ───────────────────────────────────────────────────────
    if args.sample_rows > 0 {
        let n = batch.num_rows();
        let show = n.min(args.sample_rows);
        let options = FormatOptions::default().with_null("null");
        let formatters = batch
            .columns()
            .iter()
            .map(|c| ArrayFormatter::try_new(c.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        println!("│");
        println!("│  Sample rows (first {show} of {n}):");

        // Header
        print!("│  {:>6}", "row");
        for field in schema.fields() {
            let truncated: String = field.name().chars().take(CELL_WIDTH).collect();
            print!(" │ {truncated:>CELL_WIDTH$}");
        }
        println!();

        // Separator
        print!("│  {:─>6}", "");
        for _ in schema.fields() {
            print!("─┼─{:─>CELL_WIDTH$}", "");
        }
        println!();

        // Data rows
        for row in 0..show {
            print!("│  {row:>6}");
            for formatter in &formatters {
                let cell = formatter.value(row).to_string();
                let truncated: String = cell.chars().take(CELL_WIDTH).collect();
                print!(" │ {truncated:>CELL_WIDTH$}");
            }
            println!();
        }
        if n > show {
            println!("│  ... ({} more rows)", n - show);
        }
    }
    println!("└──────────────────────────────────────────────────────────────");

    Ok(())
}

fn print_stats(stats: &ColumnSummary, prefix: &str) {
    match stats {
        ColumnSummary::Identifier {
            num_nulls,
            num_distinct,
        } => {
            println!("{prefix}nulls: {num_nulls}  distinct: {num_distinct}");
        }
        ColumnSummary::Numerical {
            num_nulls,
            min,
            max,
            mean,
            std,
        } => {
            println!(
                "{prefix}nulls: {num_nulls}  min: {min:.4}  max: {max:.4}  mean: {mean:.4}  std: {std:.4}"
            );
        }
        ColumnSummary::Categorical { num_nulls, counts } => {
            let n = counts.len();
            let preview: Vec<String> = counts
                .iter()
                .take(10)
                .map(|(value, count)| format!("{value}={count}"))
                .collect();
            let suffix = if n > 10 {
                format!(" ...+{}", n - 10)
            } else {
                String::new()
            };
            println!(
                "{prefix}nulls: {num_nulls}  cardinality: {n}  values: [{}]{suffix}",
                preview.join(", ")
            );
        }
    }
}
