//! Relational plumbing: a DataFusion session over the loaded tables, plus a
//! few Arrow helpers for assembling and filtering batches.
//!
//! Every table registered with [`QueryEngine`] carries an extra [`ROW_INDEX`]
//! column holding its source row position, so queries can order by (or pick
//! the first row in) input order. Join and group keys are cast to Utf8 in SQL
//! with `arrow_cast(.., 'Utf8')`, which lets an identifier inferred as an
//! integer in one file match the same identifier read as text from another.

use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::compute::{concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::{SessionConfig, SessionContext};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::common::{FeatureError, all_valid_mask};
use crate::loader::Dataset;

/// Name of the source-position column added to every registered table.
pub const ROW_INDEX: &str = "__row";

// ============================================================================
// Query Engine
// ============================================================================

/// A loaded [`Dataset`] registered in a DataFusion session.
///
/// Queries run to completion on a private current-thread runtime, so callers
/// stay synchronous. The session uses a single partition, which keeps
/// aggregate results bit-identical from run to run.
pub struct QueryEngine {
    data: Dataset,
    ctx: SessionContext,
    rt: Runtime,
}

impl QueryEngine {
    pub fn new(data: Dataset) -> Result<Self, FeatureError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let config = SessionConfig::new()
            .with_target_partitions(1)
            .set_bool("datafusion.sql_parser.enable_ident_normalization", false);
        let engine = Self {
            data,
            ctx: SessionContext::new_with_config(config),
            rt,
        };
        for name in engine.data.names() {
            let batch = engine.data.table(name)?.clone();
            engine.register(name, batch)?;
        }
        Ok(engine)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    /// A source table as loaded, without the row index column.
    pub fn table(&self, name: &str) -> Result<&RecordBatch, FeatureError> {
        self.data.table(name)
    }

    /// Fail with [`FeatureError::MissingTable`] unless every table is loaded.
    pub fn require(&self, names: &[&str]) -> Result<(), FeatureError> {
        for name in names {
            self.data.table(name)?;
        }
        Ok(())
    }

    /// Register `batch` under `name`, replacing any table of that name.
    pub fn register(&self, name: &str, batch: RecordBatch) -> Result<(), FeatureError> {
        let batch = with_row_index(&batch)?;
        self.ctx.deregister_table(name)?;
        self.ctx.register_batch(name, batch)?;
        Ok(())
    }

    /// Run a SQL query and gather its result into one batch.
    pub fn query(&self, sql: &str) -> Result<RecordBatch, FeatureError> {
        let (schema, batches) = self.rt.block_on(async {
            let df = self.ctx.sql(sql).await?;
            let schema = df.schema().inner().clone();
            let batches = df.collect().await?;
            Ok::<_, FeatureError>((schema, batches))
        })?;

        let schema = batches.first().map(|b| b.schema()).unwrap_or(schema);
        let result = concat_batches(&schema, &batches)?;
        debug!(
            "query returned {} rows in {} batches",
            result.num_rows(),
            batches.len()
        );
        Ok(result)
    }
}

fn with_row_index(batch: &RecordBatch) -> Result<RecordBatch, FeatureError> {
    let schema = batch.schema();
    let mut fields: Vec<Arc<Field>> = schema.fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(ROW_INDEX, DataType::UInt64, false)));
    let mut columns = batch.columns().to_vec();
    columns.push(Arc::new(UInt64Array::from_iter_values(
        0..batch.num_rows() as u64,
    )));
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

// ============================================================================
// Batch Helpers
// ============================================================================

/// Assemble a batch from named columns. Every field is declared nullable.
pub fn make_batch(columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch, FeatureError> {
    Ok(RecordBatch::try_from_iter_with_nullable(
        columns.into_iter().map(|(name, col)| (name, col, true)),
    )?)
}

/// Drop every row that has a null in any column.
pub fn drop_nulls(batch: &RecordBatch) -> Result<RecordBatch, FeatureError> {
    let columns: Vec<&ArrayRef> = batch.columns().iter().collect();
    let mask = all_valid_mask(&columns, batch.num_rows());
    Ok(filter_record_batch(batch, &mask)?)
}
