//! Common types, names and Arrow helpers used throughout the crate.

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::compute::{CastOptions, cast, cast_with_options};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, TimestampMicrosecondType};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;
use parquet::errors::ParquetError;
use thiserror::Error;

// ============================================================================
// Table Names
// ============================================================================

pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const ORDER_REVIEWS: &str = "order_reviews";
pub const SELLERS: &str = "sellers";
pub const CUSTOMERS: &str = "customers";
pub const GEOLOCATION: &str = "geolocation";

// ============================================================================
// Source Column Names
// ============================================================================

pub const ORDER_ID: &str = "order_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const SELLER_ID: &str = "seller_id";
pub const PRODUCT_ID: &str = "product_id";
pub const ORDER_STATUS: &str = "order_status";
pub const PURCHASE_TIMESTAMP: &str = "order_purchase_timestamp";
pub const DELIVERED_CUSTOMER_DATE: &str = "order_delivered_customer_date";
pub const ESTIMATED_DELIVERY_DATE: &str = "order_estimated_delivery_date";
pub const REVIEW_SCORE: &str = "review_score";
pub const PRICE: &str = "price";
pub const FREIGHT_VALUE: &str = "freight_value";
pub const SELLER_ZIP_CODE_PREFIX: &str = "seller_zip_code_prefix";
pub const CUSTOMER_ZIP_CODE_PREFIX: &str = "customer_zip_code_prefix";
pub const GEOLOCATION_ZIP_CODE_PREFIX: &str = "geolocation_zip_code_prefix";
pub const GEOLOCATION_LAT: &str = "geolocation_lat";
pub const GEOLOCATION_LNG: &str = "geolocation_lng";

// ============================================================================
// Feature Column Names
// ============================================================================

pub const WAIT_TIME: &str = "wait_time";
pub const EXPECTED_WAIT_TIME: &str = "expected_wait_time";
pub const DELAY_VS_EXPECTED: &str = "delay_vs_expected";
pub const DIM_IS_FIVE_STAR: &str = "dim_is_five_star";
pub const DIM_IS_ONE_STAR: &str = "dim_is_one_star";
pub const NUMBER_OF_PRODUCTS: &str = "number_of_products";
pub const NUMBER_OF_SELLERS: &str = "number_of_sellers";
pub const DISTANCE_SELLER_CUSTOMER: &str = "distance_seller_customer";

/// The order status kept by the wait-time stage when filtering to delivered orders.
pub const STATUS_DELIVERED: &str = "delivered";

/// Microseconds in one day; Arrow timestamps are cast to microsecond precision.
pub const MICROS_PER_DAY: i64 = 86_400_000_000;

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("table not found in dataset: {0}")]
    MissingTable(String),

    #[error("column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("query error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid progress bar template: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}

// ============================================================================
// Column Lookup
// ============================================================================

/// Fetch a column by name, naming the owning table in the error.
pub fn column<'a>(
    batch: &'a RecordBatch,
    table: &str,
    name: &str,
) -> Result<&'a ArrayRef, FeatureError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| FeatureError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        })
}

// ============================================================================
// Cast Helpers
// ============================================================================

/// Cast any array to Utf8. Used for join and group keys so that an identifier
/// inferred as an integer in one file still matches the same identifier read
/// as text from another.
pub fn cast_to_utf8(array: &dyn Array) -> Result<StringArray, FeatureError> {
    let cast = cast(array, &DataType::Utf8)?;
    Ok(cast.as_string::<i32>().clone())
}

/// Cast an array to Float64. Values that cannot be represented become null.
pub fn cast_to_f64(array: &dyn Array) -> Result<Float64Array, FeatureError> {
    let cast = cast(array, &DataType::Float64)?;
    Ok(cast.as_primitive::<Float64Type>().clone())
}

/// Cast an array to Int64, failing on any value that does not parse.
pub fn cast_to_i64_strict(array: &dyn Array) -> Result<Int64Array, FeatureError> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast = cast_with_options(array, &DataType::Int64, &options)?;
    Ok(cast.as_primitive::<Int64Type>().clone())
}

/// Cast an array to naive microsecond timestamps. Unparseable strings become null.
pub fn cast_to_timestamp_us(array: &dyn Array) -> Result<TimestampMicrosecondArray, FeatureError> {
    let target = DataType::Timestamp(TimeUnit::Microsecond, None);
    let cast = cast(array, &target)?;
    Ok(cast.as_primitive::<TimestampMicrosecondType>().clone())
}

/// Boolean mask that is true iff every given column is non-null at that row.
pub fn all_valid_mask(columns: &[&ArrayRef], num_rows: usize) -> BooleanArray {
    (0..num_rows)
        .map(|i| Some(columns.iter().all(|c| c.is_valid(i))))
        .collect()
}
