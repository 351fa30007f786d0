//! Loading the raw Olist tables.
//!
//! The feature pipeline only depends on [`DatasetLoader`], which hands back a
//! [`Dataset`]: an ordered map from table name to a single Arrow
//! [`RecordBatch`]. [`DirectoryLoader`] reads the tables from a directory of
//! CSV or Parquet files; a [`Dataset`] is itself a loader, which is how tests
//! feed in-memory fixtures.

use std::fs::{self, File};
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::csv::reader::Format;
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::common::FeatureError;

/// Rows per batch when decoding files; batches are concatenated afterwards.
const READ_BATCH_SIZE: usize = 65_536;

pub trait DatasetLoader {
    /// Load every available table, keyed by table name (`orders`, `order_items`, ...).
    fn get_data(&self) -> Result<Dataset, FeatureError>;
}

// ============================================================================
// Dataset
// ============================================================================

/// Named tables, fully materialized in memory.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tables: IndexMap<String, RecordBatch>,
}

impl Dataset {
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, RecordBatch)>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(|(n, b)| (n.into(), b)).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, batch: RecordBatch) {
        self.tables.insert(name.into(), batch);
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Result<&RecordBatch, FeatureError> {
        self.tables
            .get(name)
            .ok_or_else(|| FeatureError::MissingTable(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl DatasetLoader for Dataset {
    fn get_data(&self) -> Result<Dataset, FeatureError> {
        Ok(self.clone())
    }
}

// ============================================================================
// Directory Loader
// ============================================================================

/// Reads every `*.csv` and `*.parquet` file in a directory, one table per file.
///
/// Table names come from the file stem with the Olist decoration removed, see
/// [`table_name_from_stem`].
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Table files in the directory, sorted by file name.
    fn table_files(&self) -> Result<Vec<PathBuf>, FeatureError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        paths.retain(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("csv") | Some("parquet")
                )
        });
        paths.sort();
        Ok(paths)
    }
}

impl DatasetLoader for DirectoryLoader {
    fn get_data(&self) -> Result<Dataset, FeatureError> {
        let paths = self.table_files()?;
        info!("Loading {} tables from {}", paths.len(), self.dir.display());

        let pb = ProgressBar::new(paths.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  Loading    {bar:40.cyan/blue} {pos}/{len} tables [{elapsed_precise}] {msg}",
            )?
            .progress_chars("##-"),
        );

        let mut dataset = Dataset::default();
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let name = table_name_from_stem(stem);
            pb.set_message(name.clone());

            let batch = read_table(&path)?;
            info!(
                "  {} <- {} ({} rows, {} columns)",
                name,
                path.display(),
                batch.num_rows(),
                batch.num_columns()
            );
            dataset.insert(name, batch);
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(dataset)
    }
}

/// Strip the Olist file decoration: `olist_order_items_dataset` -> `order_items`.
pub fn table_name_from_stem(stem: &str) -> String {
    let name = stem.strip_prefix("olist_").unwrap_or(stem);
    let name = name.strip_suffix("_dataset").unwrap_or(name);
    name.to_string()
}

fn is_parquet(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("parquet")
}

/// Read a `.parquet` file, or anything else as CSV.
pub fn read_table(path: &Path) -> Result<RecordBatch, FeatureError> {
    if is_parquet(path) {
        read_parquet(path)
    } else {
        read_csv(path)
    }
}

/// Write `batch` as Parquet when `path` ends in `.parquet`, else as CSV with
/// a header row.
pub fn write_table(batch: &RecordBatch, path: &Path) -> Result<(), FeatureError> {
    let file = File::create(path)?;
    if is_parquet(path) {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
    } else {
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(batch)?;
    }
    info!("Wrote {} rows to {}", batch.num_rows(), path.display());
    Ok(())
}

/// Read a CSV file with a header row, inferring the schema from its contents.
pub fn read_csv(path: &Path) -> Result<RecordBatch, FeatureError> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(READ_BATCH_SIZE)
        .build(file)?;
    let batches: Vec<RecordBatch> = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Read a Parquet file into a single batch.
pub fn read_parquet(path: &Path) -> Result<RecordBatch, FeatureError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.with_batch_size(READ_BATCH_SIZE).build()?;

    let batches: Vec<RecordBatch> = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}
