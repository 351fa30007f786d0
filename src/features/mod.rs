//! Per-order feature derivation over the Olist tables.
//!
//! Each stage is a pure function of the loaded tables and returns a new
//! [`RecordBatch`] keyed by `order_id`. [`FeatureBuilder::training_data`]
//! inner-joins the stages into the final training table:
//!
//! | column                     | stage                              |
//! |----------------------------|------------------------------------|
//! | `wait_time`                | [`wait_time`]                      |
//! | `expected_wait_time`       | [`wait_time`]                      |
//! | `delay_vs_expected`        | [`wait_time`]                      |
//! | `order_status`             | [`wait_time`]                      |
//! | `dim_is_five_star`         | [`review_score`]                   |
//! | `dim_is_one_star`          | [`review_score`]                   |
//! | `review_score`             | [`review_score`]                   |
//! | `number_of_products`       | [`number_of_products`]             |
//! | `number_of_sellers`        | [`number_of_sellers`]              |
//! | `price`, `freight_value`   | [`price_and_freight`]              |
//! | `distance_seller_customer` | [`distance_seller_customer`] (opt) |
//!
//! An order with several reviews yields one training row per review; every
//! other feature is repeated on those rows.

mod distance;
mod items;
mod reviews;
mod wait_time;

pub use distance::distance_seller_customer;
pub use items::{number_of_products, number_of_sellers, price_and_freight};
pub use reviews::review_score;
pub use wait_time::wait_time;

use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::common::*;
use crate::config::FeatureConfig;
use crate::loader::{Dataset, DatasetLoader};
use crate::ops::{QueryEngine, drop_nulls};

/// Column order of the training table, without the optional distance column.
pub const TRAINING_COLUMNS: [&str; 12] = [
    ORDER_ID,
    WAIT_TIME,
    EXPECTED_WAIT_TIME,
    DELAY_VS_EXPECTED,
    ORDER_STATUS,
    DIM_IS_FIVE_STAR,
    DIM_IS_ONE_STAR,
    REVIEW_SCORE,
    NUMBER_OF_PRODUCTS,
    NUMBER_OF_SELLERS,
    PRICE,
    FREIGHT_VALUE,
];

/// Stage outputs are registered under these names before being joined.
const WAIT_TIME_STAGE: &str = "wait_time_stage";
const REVIEW_STAGE: &str = "review_stage";
const PRODUCT_STAGE: &str = "product_stage";
const SELLER_STAGE: &str = "seller_stage";
const PRICE_STAGE: &str = "price_stage";
const DISTANCE_STAGE: &str = "distance_stage";

/// Derives per-order features from a loaded [`Dataset`].
pub struct FeatureBuilder {
    engine: QueryEngine,
}

impl FeatureBuilder {
    /// Load all tables through `loader` once, up front.
    pub fn new(loader: &impl DatasetLoader) -> Result<Self, FeatureError> {
        Self::from_dataset(loader.get_data()?)
    }

    pub fn from_dataset(data: Dataset) -> Result<Self, FeatureError> {
        Ok(Self {
            engine: QueryEngine::new(data)?,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        self.engine.dataset()
    }

    pub fn wait_time(&self, only_delivered: bool) -> Result<RecordBatch, FeatureError> {
        wait_time(self.engine.table(ORDERS)?, only_delivered)
    }

    pub fn review_score(&self) -> Result<RecordBatch, FeatureError> {
        review_score(self.engine.table(ORDER_REVIEWS)?)
    }

    pub fn number_of_products(&self) -> Result<RecordBatch, FeatureError> {
        number_of_products(&self.engine)
    }

    pub fn number_of_sellers(&self) -> Result<RecordBatch, FeatureError> {
        number_of_sellers(&self.engine)
    }

    pub fn price_and_freight(&self) -> Result<RecordBatch, FeatureError> {
        price_and_freight(&self.engine)
    }

    pub fn distance_seller_customer(&self) -> Result<RecordBatch, FeatureError> {
        distance_seller_customer(&self.engine)
    }

    /// The training table: every stage inner-joined on `order_id`, then every
    /// row holding a null dropped. Rows follow the order of `orders`, and an
    /// order's reviews follow the order of `order_reviews`.
    pub fn training_data(&self, config: &FeatureConfig) -> Result<RecordBatch, FeatureError> {
        info!(
            "Building training data (only_delivered={}, include_distance={})",
            config.only_delivered, config.include_distance
        );

        let engine = &self.engine;
        engine.register(WAIT_TIME_STAGE, self.wait_time(config.only_delivered)?)?;
        engine.register(REVIEW_STAGE, self.review_score()?)?;
        engine.register(PRODUCT_STAGE, self.number_of_products()?)?;
        engine.register(SELLER_STAGE, self.number_of_sellers()?)?;
        engine.register(PRICE_STAGE, self.price_and_freight()?)?;

        let (distance_column, distance_join) = if config.include_distance {
            engine.register(DISTANCE_STAGE, self.distance_seller_customer()?)?;
            (
                ", d.distance_seller_customer",
                "JOIN distance_stage d ON arrow_cast(w.order_id, 'Utf8') = d.order_id",
            )
        } else {
            ("", "")
        };

        let table = engine.query(&format!(
            "SELECT arrow_cast(w.order_id, 'Utf8') AS order_id,
                    w.wait_time, w.expected_wait_time, w.delay_vs_expected, w.order_status,
                    r.dim_is_five_star, r.dim_is_one_star, r.review_score,
                    p.number_of_products, s.number_of_sellers, f.price, f.freight_value
                    {distance_column}
             FROM wait_time_stage w
             JOIN review_stage r ON arrow_cast(w.order_id, 'Utf8') = arrow_cast(r.order_id, 'Utf8')
             JOIN product_stage p ON arrow_cast(w.order_id, 'Utf8') = p.order_id
             JOIN seller_stage s ON arrow_cast(w.order_id, 'Utf8') = s.order_id
             JOIN price_stage f ON arrow_cast(w.order_id, 'Utf8') = f.order_id
             {distance_join}
             ORDER BY w.__row, r.__row"
        ))?;

        let joined_rows = table.num_rows();
        let table = drop_nulls(&table)?;
        info!(
            "Training data: {} rows, {} columns ({} incomplete rows dropped)",
            table.num_rows(),
            table.num_columns(),
            joined_rows - table.num_rows()
        );
        Ok(table)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small in-memory Olist tables shaped like the CSV extracts.

    use std::sync::Arc;

    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::record_batch::RecordBatch;

    use crate::common::*;
    use crate::loader::Dataset;
    use crate::ops::QueryEngine;

    /// (lat, lng) of the fixture zip prefixes.
    pub const ZIP_1037: (f64, f64) = (-23.5456, -46.6393);
    pub const ZIP_13023: (f64, f64) = (-22.8983, -47.0631);
    pub const ZIP_20000: (f64, f64) = (-22.9068, -43.1729);

    pub struct OrderRow {
        pub id: String,
        pub customer: String,
        pub status: String,
        pub purchase: String,
        pub delivered: Option<String>,
        pub estimated: Option<String>,
    }

    impl OrderRow {
        pub fn delivered(
            id: &str,
            customer: &str,
            purchase: &str,
            delivered: &str,
            estimated: &str,
        ) -> Self {
            Self {
                id: id.to_string(),
                customer: customer.to_string(),
                status: STATUS_DELIVERED.to_string(),
                purchase: purchase.to_string(),
                delivered: Some(delivered.to_string()),
                estimated: Some(estimated.to_string()),
            }
        }
    }

    pub struct ItemRow {
        pub order: &'static str,
        pub product: &'static str,
        pub seller: &'static str,
        pub price: f64,
        pub freight: f64,
    }

    impl ItemRow {
        pub fn new(
            order: &'static str,
            product: &'static str,
            seller: &'static str,
            price: f64,
            freight: f64,
        ) -> Self {
            Self {
                order,
                product,
                seller,
                price,
                freight,
            }
        }
    }

    /// A query engine over just the given tables.
    pub fn engine(tables: Vec<(&str, RecordBatch)>) -> QueryEngine {
        QueryEngine::new(Dataset::from_tables(tables)).unwrap()
    }

    fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
        Arc::new(values.collect::<StringArray>())
    }

    pub fn orders(rows: &[OrderRow]) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (ORDER_ID, strings(rows.iter().map(|r| Some(r.id.as_str())))),
            (CUSTOMER_ID, strings(rows.iter().map(|r| Some(r.customer.as_str())))),
            (ORDER_STATUS, strings(rows.iter().map(|r| Some(r.status.as_str())))),
            (PURCHASE_TIMESTAMP, strings(rows.iter().map(|r| Some(r.purchase.as_str())))),
            (DELIVERED_CUSTOMER_DATE, strings(rows.iter().map(|r| r.delivered.as_deref()))),
            (ESTIMATED_DELIVERY_DATE, strings(rows.iter().map(|r| r.estimated.as_deref()))),
        ])
        .unwrap()
    }

    pub fn items(rows: &[ItemRow]) -> RecordBatch {
        let item_ids: Vec<i64> = (0..rows.len()).map(|i| i as i64 + 1).collect();
        RecordBatch::try_from_iter(vec![
            (ORDER_ID, strings(rows.iter().map(|r| Some(r.order)))),
            ("order_item_id", Arc::new(Int64Array::from(item_ids)) as ArrayRef),
            (PRODUCT_ID, strings(rows.iter().map(|r| Some(r.product)))),
            (SELLER_ID, strings(rows.iter().map(|r| Some(r.seller)))),
            (PRICE, Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.price))) as ArrayRef),
            (
                FREIGHT_VALUE,
                Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.freight))) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    pub fn reviews(rows: &[(&str, Option<i64>)]) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (ORDER_ID, strings(rows.iter().map(|r| Some(r.0)))),
            (
                REVIEW_SCORE,
                Arc::new(rows.iter().map(|r| r.1).collect::<Int64Array>()) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    pub fn sellers(rows: &[(&str, i64)]) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (SELLER_ID, strings(rows.iter().map(|r| Some(r.0)))),
            (
                SELLER_ZIP_CODE_PREFIX,
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.1))) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    pub fn customers(rows: &[(&str, i64)]) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (CUSTOMER_ID, strings(rows.iter().map(|r| Some(r.0)))),
            (
                CUSTOMER_ZIP_CODE_PREFIX,
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.1))) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    pub fn geolocation(rows: &[(i64, Option<f64>, Option<f64>)]) -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                GEOLOCATION_ZIP_CODE_PREFIX,
                Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.0))) as ArrayRef,
            ),
            (
                GEOLOCATION_LAT,
                Arc::new(rows.iter().map(|r| r.1).collect::<Float64Array>()) as ArrayRef,
            ),
            (
                GEOLOCATION_LNG,
                Arc::new(rows.iter().map(|r| r.2).collect::<Float64Array>()) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    /// Five orders exercising every drop path:
    /// - `o1`: the reference order (11 / 9 / 2 days, five stars, two items from one seller)
    /// - `o2`: canceled, customer zip without coordinates
    /// - `o3`: delivered early by two sellers, one star
    /// - `o4`: delivered but has no items
    /// - `o5`: delivered date missing, customer zip without coordinates
    pub fn example_dataset() -> Dataset {
        let mut canceled = OrderRow::delivered(
            "o2",
            "c2",
            "2024-01-03 00:00:00",
            "2024-01-06 00:00:00",
            "2024-01-09 00:00:00",
        );
        canceled.status = "canceled".to_string();
        let mut undelivered = OrderRow::delivered(
            "o5",
            "c2",
            "2024-03-01 00:00:00",
            "",
            "2024-03-09 00:00:00",
        );
        undelivered.delivered = None;

        let orders = orders(&[
            OrderRow::delivered(
                "o1",
                "c1",
                "2024-01-01 00:00:00",
                "2024-01-12 00:00:00",
                "2024-01-10 00:00:00",
            ),
            canceled,
            OrderRow::delivered(
                "o3",
                "c3",
                "2024-02-01 08:00:00",
                "2024-02-10 20:00:00",
                "2024-02-20 00:00:00",
            ),
            OrderRow::delivered(
                "o4",
                "c1",
                "2024-02-05 00:00:00",
                "2024-02-07 00:00:00",
                "2024-02-15 00:00:00",
            ),
            undelivered,
        ]);

        let items = items(&[
            ItemRow::new("o1", "p1", "s1", 10.0, 2.0),
            ItemRow::new("o1", "p2", "s1", 20.0, 2.0),
            ItemRow::new("o2", "p1", "s2", 12.0, 1.5),
            ItemRow::new("o3", "p3", "s1", 15.0, 3.0),
            ItemRow::new("o3", "p4", "s2", 5.0, 1.0),
            ItemRow::new("o5", "p2", "s2", 8.0, 0.5),
        ]);

        let reviews = reviews(&[
            ("o1", Some(5)),
            ("o2", Some(1)),
            ("o3", Some(1)),
            ("o4", Some(4)),
            ("o5", Some(3)),
        ]);

        let sellers = sellers(&[("s1", 13023), ("s2", 1037)]);
        let customers = customers(&[("c1", 1037), ("c2", 99999), ("c3", 20000)]);
        let geolocation = geolocation(&[
            (1037, Some(ZIP_1037.0), Some(ZIP_1037.1)),
            (1037, Some(-10.0), Some(-10.0)),
            (13023, Some(ZIP_13023.0), Some(ZIP_13023.1)),
            (20000, Some(ZIP_20000.0), Some(ZIP_20000.1)),
        ]);

        Dataset::from_tables([
            (ORDERS, orders),
            (ORDER_ITEMS, items),
            (ORDER_REVIEWS, reviews),
            (SELLERS, sellers),
            (CUSTOMERS, customers),
            (GEOLOCATION, geolocation),
        ])
    }
}
