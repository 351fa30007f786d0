use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use tracing::{info, warn};

use crate::common::*;
use crate::geo::haversine_distances;
use crate::ops::{QueryEngine, drop_nulls, make_batch};

const LAT_SELLER: &str = "geolocation_lat_seller";
const LNG_SELLER: &str = "geolocation_lng_seller";
const LAT_CUSTOMER: &str = "geolocation_lat_customer";
const LNG_CUSTOMER: &str = "geolocation_lng_customer";

/// Scratch tables registered while the stage runs.
const ZIP_LOCATION: &str = "zip_location";
const ITEM_DISTANCE: &str = "item_distance";

/// Mean seller-customer haversine distance (km) per order.
///
/// Every item row contributes the distance between its seller and the order's
/// customer. Rows where either party's zip prefix has no coordinates are
/// skipped. Output columns: `order_id, distance_seller_customer`, sorted by
/// order id.
pub fn distance_seller_customer(engine: &QueryEngine) -> Result<RecordBatch, FeatureError> {
    engine.require(&[ORDERS, ORDER_ITEMS, SELLERS, CUSTOMERS, GEOLOCATION])?;
    engine.register(ZIP_LOCATION, first_location_per_zip(engine)?)?;

    let pairs = engine.query(
        "SELECT arrow_cast(o.order_id, 'Utf8') AS order_id,
                sl.geolocation_lat AS geolocation_lat_seller,
                sl.geolocation_lng AS geolocation_lng_seller,
                cl.geolocation_lat AS geolocation_lat_customer,
                cl.geolocation_lng AS geolocation_lng_customer
         FROM orders o
         JOIN order_items i ON arrow_cast(o.order_id, 'Utf8') = arrow_cast(i.order_id, 'Utf8')
         JOIN sellers s ON arrow_cast(i.seller_id, 'Utf8') = arrow_cast(s.seller_id, 'Utf8')
         JOIN customers c ON arrow_cast(o.customer_id, 'Utf8') = arrow_cast(c.customer_id, 'Utf8')
         LEFT JOIN zip_location sl
             ON arrow_cast(s.seller_zip_code_prefix, 'Utf8') = sl.geolocation_zip_code_prefix
         LEFT JOIN zip_location cl
             ON arrow_cast(c.customer_zip_code_prefix, 'Utf8') = cl.geolocation_zip_code_prefix
         ORDER BY i.__row",
    )?;

    let located = drop_nulls(&pairs)?;
    let unlocated = pairs.num_rows() - located.num_rows();
    if unlocated > 0 {
        warn!("distance_seller_customer: skipped {unlocated} item rows without coordinates");
    }

    let coord = |name: &str| cast_to_f64(column(&located, ORDER_ITEMS, name)?.as_ref());
    let distances = haversine_distances(
        &coord(LNG_SELLER)?,
        &coord(LAT_SELLER)?,
        &coord(LNG_CUSTOMER)?,
        &coord(LAT_CUSTOMER)?,
    );
    engine.register(
        ITEM_DISTANCE,
        make_batch(vec![
            (ORDER_ID, column(&located, ORDER_ITEMS, ORDER_ID)?.clone()),
            ("distance", Arc::new(distances) as ArrayRef),
        ])?,
    )?;

    let out = engine.query(
        "SELECT order_id, AVG(distance) AS distance_seller_customer
         FROM item_distance
         GROUP BY order_id
         ORDER BY order_id",
    )?;
    info!(
        "distance_seller_customer: {} orders from {} item rows",
        out.num_rows(),
        located.num_rows()
    );
    Ok(out)
}

/// One `(zip prefix, lat, lng)` row per prefix, sorted by prefix, keeping the
/// first non-null value of each coordinate in source order.
pub(crate) fn first_location_per_zip(engine: &QueryEngine) -> Result<RecordBatch, FeatureError> {
    engine.require(&[GEOLOCATION])?;
    engine.query(
        "WITH geo AS (
             SELECT arrow_cast(geolocation_zip_code_prefix, 'Utf8') AS zip,
                    arrow_cast(geolocation_lat, 'Float64') AS lat,
                    arrow_cast(geolocation_lng, 'Float64') AS lng,
                    __row
             FROM geolocation
             WHERE geolocation_zip_code_prefix IS NOT NULL
         ),
         zips AS (SELECT DISTINCT zip FROM geo),
         lats AS (
             SELECT zip, first_value(lat ORDER BY __row) AS lat
             FROM geo WHERE lat IS NOT NULL GROUP BY zip
         ),
         lngs AS (
             SELECT zip, first_value(lng ORDER BY __row) AS lng
             FROM geo WHERE lng IS NOT NULL GROUP BY zip
         )
         SELECT zips.zip AS geolocation_zip_code_prefix,
                lats.lat AS geolocation_lat,
                lngs.lng AS geolocation_lng
         FROM zips
         LEFT JOIN lats ON zips.zip = lats.zip
         LEFT JOIN lngs ON zips.zip = lngs.zip
         ORDER BY geolocation_zip_code_prefix",
    )
}
