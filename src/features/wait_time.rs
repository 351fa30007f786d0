use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute::filter_record_batch;
use arrow::compute::kernels::cmp::eq;
use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::common::*;
use crate::ops::make_batch;

/// Per-order delivery timings.
///
/// Output columns: `order_id, wait_time, expected_wait_time, delay_vs_expected,
/// order_status`. Rows with a missing or unparseable timestamp are kept with
/// null durations.
pub fn wait_time(orders: &RecordBatch, only_delivered: bool) -> Result<RecordBatch, FeatureError> {
    let orders = if only_delivered {
        let status = cast_to_utf8(column(orders, ORDERS, ORDER_STATUS)?.as_ref())?;
        let delivered = eq(&status, &StringArray::new_scalar(STATUS_DELIVERED))?;
        filter_record_batch(orders, &delivered)?
    } else {
        orders.clone()
    };

    let purchase = cast_to_timestamp_us(column(&orders, ORDERS, PURCHASE_TIMESTAMP)?.as_ref())?;
    let delivered =
        cast_to_timestamp_us(column(&orders, ORDERS, DELIVERED_CUSTOMER_DATE)?.as_ref())?;
    let estimated =
        cast_to_timestamp_us(column(&orders, ORDERS, ESTIMATED_DELIVERY_DATE)?.as_ref())?;

    let wait = days_between(&purchase, &delivered);
    let expected = days_between(&purchase, &estimated);
    let delay: Int64Array = wait
        .iter()
        .zip(expected.iter())
        .map(|(w, e)| Some((w? - e?).max(0)))
        .collect();

    info!("wait_time: {} orders", orders.num_rows());

    make_batch(vec![
        (ORDER_ID, column(&orders, ORDERS, ORDER_ID)?.clone()),
        (WAIT_TIME, Arc::new(wait) as ArrayRef),
        (EXPECTED_WAIT_TIME, Arc::new(expected) as ArrayRef),
        (DELAY_VS_EXPECTED, Arc::new(delay) as ArrayRef),
        (ORDER_STATUS, column(&orders, ORDERS, ORDER_STATUS)?.clone()),
    ])
}

/// Whole days from `from` to `to`, floored: 23 hours is 0 days, minus one hour is -1.
pub(crate) fn days_between(from: &TimestampMicrosecondArray, to: &TimestampMicrosecondArray) -> Int64Array {
    from.iter()
        .zip(to.iter())
        .map(|(a, b)| Some((b? - a?).div_euclid(MICROS_PER_DAY)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::Int64Type;

    fn ints(batch: &RecordBatch, name: &str) -> Vec<Option<i64>> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_primitive::<Int64Type>()
            .iter()
            .collect()
    }

    #[test]
    fn test_end_to_end_example_timings() {
        let orders = fixtures::orders(&[fixtures::OrderRow::delivered(
            "o1",
            "c1",
            "2024-01-01 00:00:00",
            "2024-01-12 00:00:00",
            "2024-01-10 00:00:00",
        )]);
        let out = wait_time(&orders, true).unwrap();
        assert_eq!(ints(&out, WAIT_TIME), vec![Some(11)]);
        assert_eq!(ints(&out, EXPECTED_WAIT_TIME), vec![Some(9)]);
        assert_eq!(ints(&out, DELAY_VS_EXPECTED), vec![Some(2)]);
    }

    #[test]
    fn test_early_delivery_has_zero_delay() {
        let orders = fixtures::orders(&[fixtures::OrderRow::delivered(
            "o1",
            "c1",
            "2024-02-01 08:00:00",
            "2024-02-10 20:00:00",
            "2024-02-20 00:00:00",
        )]);
        let out = wait_time(&orders, true).unwrap();
        assert_eq!(ints(&out, WAIT_TIME), vec![Some(9)]);
        assert_eq!(ints(&out, EXPECTED_WAIT_TIME), vec![Some(18)]);
        assert_eq!(ints(&out, DELAY_VS_EXPECTED), vec![Some(0)]);
    }

    #[test]
    fn test_days_are_floored() {
        let from = TimestampMicrosecondArray::from(vec![0, 0, 0, 0]);
        let hour = MICROS_PER_DAY / 24;
        let to = TimestampMicrosecondArray::from(vec![0, 23 * hour, 25 * hour, -hour]);
        let days = days_between(&from, &to);
        assert_eq!(days, Int64Array::from(vec![0, 0, 1, -1]));
    }

    #[test]
    fn test_only_delivered_filters_statuses() {
        let mut canceled = fixtures::OrderRow::delivered(
            "o2",
            "c2",
            "2024-01-01 00:00:00",
            "2024-01-05 00:00:00",
            "2024-01-10 00:00:00",
        );
        canceled.status = "canceled".to_string();
        let orders = fixtures::orders(&[
            fixtures::OrderRow::delivered(
                "o1",
                "c1",
                "2024-01-01 00:00:00",
                "2024-01-12 00:00:00",
                "2024-01-10 00:00:00",
            ),
            canceled,
        ]);

        let delivered_only = wait_time(&orders, true).unwrap();
        assert_eq!(delivered_only.num_rows(), 1);
        let ids = delivered_only.column_by_name(ORDER_ID).unwrap().as_string::<i32>();
        assert_eq!(ids.value(0), "o1");

        let all = wait_time(&orders, false).unwrap();
        assert_eq!(all.num_rows(), 2);
        let statuses = all.column_by_name(ORDER_STATUS).unwrap().as_string::<i32>();
        assert_eq!(statuses.value(1), "canceled");
    }

    #[test]
    fn test_missing_timestamps_become_nulls() {
        let mut row = fixtures::OrderRow::delivered(
            "o1",
            "c1",
            "2024-01-01 00:00:00",
            "garbage",
            "2024-01-10 00:00:00",
        );
        row.estimated = None;
        let out = wait_time(&fixtures::orders(&[row]), true).unwrap();
        assert_eq!(out.num_rows(), 1);
        assert!(out.column_by_name(WAIT_TIME).unwrap().is_null(0));
        assert!(out.column_by_name(EXPECTED_WAIT_TIME).unwrap().is_null(0));
        assert!(out.column_by_name(DELAY_VS_EXPECTED).unwrap().is_null(0));
    }

    #[test]
    fn test_delay_never_negative() {
        let rows: Vec<_> = (1..=28)
            .map(|d| {
                fixtures::OrderRow::delivered(
                    &format!("o{d}"),
                    "c1",
                    "2024-02-01 12:00:00",
                    &format!("2024-02-{d:02} 18:00:00"),
                    "2024-02-14 00:00:00",
                )
            })
            .collect();
        let out = wait_time(&fixtures::orders(&rows), true).unwrap();
        assert_eq!(out.num_rows(), 28);
        assert!(ints(&out, DELAY_VS_EXPECTED).iter().all(|d| d.unwrap() >= 0));
        assert!(ints(&out, WAIT_TIME).iter().all(|d| d.unwrap() >= 0));
    }

    #[test]
    fn test_missing_status_column() {
        let all = fixtures::orders(&[]);
        let orders = all.project(&[all.schema().index_of(ORDER_ID).unwrap()]).unwrap();
        assert!(matches!(
            wait_time(&orders, true),
            Err(FeatureError::MissingColumn { .. })
        ));
    }
}
