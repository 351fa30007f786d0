//! Per-order aggregates over `order_items`: item count, distinct sellers and
//! price/freight totals. Every output has one row per order id, sorted by
//! order id; orders without items do not appear.

use arrow::record_batch::RecordBatch;
use tracing::info;

use crate::common::*;
use crate::ops::QueryEngine;

/// Output columns: `order_id, number_of_products`. Counts item rows, not
/// distinct products.
pub fn number_of_products(engine: &QueryEngine) -> Result<RecordBatch, FeatureError> {
    engine.require(&[ORDER_ITEMS])?;
    let out = engine.query(
        "SELECT order_key AS order_id, COUNT(product_id) AS number_of_products
         FROM (SELECT arrow_cast(order_id, 'Utf8') AS order_key, product_id FROM order_items) AS items
         WHERE order_key IS NOT NULL
         GROUP BY order_key
         ORDER BY order_id",
    )?;
    info!("number_of_products: {} orders", out.num_rows());
    Ok(out)
}

/// Output columns: `order_id, number_of_sellers` (distinct seller ids).
pub fn number_of_sellers(engine: &QueryEngine) -> Result<RecordBatch, FeatureError> {
    engine.require(&[ORDER_ITEMS])?;
    let out = engine.query(
        "SELECT order_key AS order_id, COUNT(DISTINCT seller_key) AS number_of_sellers
         FROM (
             SELECT arrow_cast(order_id, 'Utf8') AS order_key,
                    arrow_cast(seller_id, 'Utf8') AS seller_key
             FROM order_items
         ) AS items
         WHERE order_key IS NOT NULL
         GROUP BY order_key
         ORDER BY order_id",
    )?;
    info!("number_of_sellers: {} orders", out.num_rows());
    Ok(out)
}

/// Output columns: `order_id, price, freight_value`, each summed over the
/// order's items. Missing values count as zero.
pub fn price_and_freight(engine: &QueryEngine) -> Result<RecordBatch, FeatureError> {
    engine.require(&[ORDER_ITEMS])?;
    let out = engine.query(
        "SELECT order_key AS order_id,
                COALESCE(SUM(item_price), 0.0) AS price,
                COALESCE(SUM(item_freight), 0.0) AS freight_value
         FROM (
             SELECT arrow_cast(order_id, 'Utf8') AS order_key,
                    arrow_cast(price, 'Float64') AS item_price,
                    arrow_cast(freight_value, 'Float64') AS item_freight
             FROM order_items
         ) AS items
         WHERE order_key IS NOT NULL
         GROUP BY order_key
         ORDER BY order_id",
    )?;
    info!("price_and_freight: {} orders", out.num_rows());
    Ok(out)
}
