use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array};
use arrow::compute::cast;
use arrow::compute::kernels::cmp::eq;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::common::*;
use crate::ops::make_batch;

/// Review sentiment indicators, one row per review.
///
/// Output columns: `order_id, dim_is_five_star, dim_is_one_star, review_score`.
/// An order with several reviews keeps several rows. A review score that is
/// not an integer is an error.
pub fn review_score(reviews: &RecordBatch) -> Result<RecordBatch, FeatureError> {
    let scores = cast_to_i64_strict(column(reviews, ORDER_REVIEWS, REVIEW_SCORE)?.as_ref())?;

    let five_star = star_indicator(&scores, 5)?;
    let one_star = star_indicator(&scores, 1)?;

    info!("review_score: {} reviews", reviews.num_rows());

    make_batch(vec![
        (ORDER_ID, column(reviews, ORDER_REVIEWS, ORDER_ID)?.clone()),
        (DIM_IS_FIVE_STAR, five_star),
        (DIM_IS_ONE_STAR, one_star),
        (REVIEW_SCORE, Arc::new(scores) as ArrayRef),
    ])
}

/// 1 where the score equals `stars`, else 0; null scores stay null.
fn star_indicator(scores: &Int64Array, stars: i64) -> Result<ArrayRef, FeatureError> {
    let matches = eq(scores, &Int64Array::new_scalar(stars))?;
    Ok(cast(&matches, &DataType::Int64)?)
}
