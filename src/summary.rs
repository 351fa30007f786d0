//! Per-column summary statistics of a feature table.

use std::collections::BTreeMap;
use std::path::Path;

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::common::{FeatureError, cast_to_f64, cast_to_utf8};

/// Statistics for one column. The variant depends on the column's data type
/// and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnSummary {
    /// Identifier columns (`*_id`): only nulls and cardinality matter.
    Identifier { num_nulls: u64, num_distinct: u64 },

    /// Numeric columns. `std` is the sample standard deviation (0 for fewer
    /// than two values).
    Numerical {
        num_nulls: u64,
        min: f64,
        max: f64,
        mean: f64,
        std: f64,
    },

    /// Any other column: value counts, keyed by the value's text.
    Categorical {
        num_nulls: u64,
        counts: BTreeMap<String, u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub num_rows: usize,
    pub columns: IndexMap<String, ColumnSummary>,
}

impl TableSummary {
    pub fn write_json(&self, path: &Path) -> Result<(), FeatureError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn summarize(batch: &RecordBatch) -> Result<TableSummary, FeatureError> {
    let mut columns = IndexMap::new();
    for (field, array) in batch.schema().fields().iter().zip(batch.columns()) {
        let summary = if field.name().ends_with("_id") {
            identifier_summary(array.as_ref())?
        } else if field.data_type().is_numeric() {
            numerical_summary(array.as_ref())?
        } else {
            categorical_summary(array.as_ref())?
        };
        columns.insert(field.name().clone(), summary);
    }
    Ok(TableSummary {
        num_rows: batch.num_rows(),
        columns,
    })
}

fn identifier_summary(array: &dyn Array) -> Result<ColumnSummary, FeatureError> {
    let values = cast_to_utf8(array)?;
    let distinct: std::collections::HashSet<&str> = values.iter().flatten().collect();
    Ok(ColumnSummary::Identifier {
        num_nulls: array.null_count() as u64,
        num_distinct: distinct.len() as u64,
    })
}

fn numerical_summary(array: &dyn Array) -> Result<ColumnSummary, FeatureError> {
    let values = cast_to_f64(array)?;
    let mut sum = 0.0f64;
    let mut count = 0u64;
    let mut min_val = f64::MAX;
    let mut max_val = f64::MIN;
    for v in values.iter().flatten() {
        sum += v;
        count += 1;
        min_val = min_val.min(v);
        max_val = max_val.max(v);
    }
    let mean = if count > 0 { sum / count as f64 } else { 0.0 };
    let var_sum: f64 = values.iter().flatten().map(|v| (v - mean) * (v - mean)).sum();
    let std = if count > 1 {
        (var_sum / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    Ok(ColumnSummary::Numerical {
        num_nulls: values.null_count() as u64,
        min: if count > 0 { min_val } else { 0.0 },
        max: if count > 0 { max_val } else { 0.0 },
        mean,
        std,
    })
}

fn categorical_summary(array: &dyn Array) -> Result<ColumnSummary, FeatureError> {
    let values = cast_to_utf8(array)?;
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.to_string()).or_default() += 1;
    }
    Ok(ColumnSummary::Categorical {
        num_nulls: array.null_count() as u64,
        counts,
    })
}
