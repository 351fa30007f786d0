//! Great-circle distances between latitude/longitude pairs.

use arrow::array::{Array, Float64Array};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two points given in degrees.
pub fn haversine_distance(lng1: f64, lat1: f64, lng2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Element-wise haversine distance over coordinate columns.
///
/// The output is null wherever any of the four inputs is null.
pub fn haversine_distances(
    lng1: &Float64Array,
    lat1: &Float64Array,
    lng2: &Float64Array,
    lat2: &Float64Array,
) -> Float64Array {
    (0..lng1.len())
        .map(|i| {
            let valid = lng1.is_valid(i) && lat1.is_valid(i) && lng2.is_valid(i) && lat2.is_valid(i);
            valid.then(|| {
                haversine_distance(lng1.value(i), lat1.value(i), lng2.value(i), lat2.value(i))
            })
        })
        .collect()
}
