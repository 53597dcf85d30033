//! Geodesy helpers for WGS84 points (`x = lon`, `y = lat`)

use geo::{Point, Rect};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Create a point from latitude and longitude, in that order
#[inline(always)]
pub fn lat_lon(lat: f64, lon: f64) -> Point<f64> {
    Point::new(lon, lat)
}

/// Great-circle distance in kilometers (haversine)
pub fn distance_km(from: Point<f64>, to: Point<f64>) -> f64 {
    let lat1 = from.y().to_radians();
    let lat2 = to.y().to_radians();
    let delta_lat = (to.y() - from.y()).to_radians();
    let delta_lon = (to.x() - from.x()).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial bearing from `from` to `to` in degrees, clockwise from north, in `[0, 360)`
pub fn bearing_deg(from: Point<f64>, to: Point<f64>) -> f64 {
    let lat1 = from.y().to_radians();
    let lat2 = to.y().to_radians();
    let delta_lon = (to.x() - from.x()).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Human readable distance: whole meters below one kilometer, otherwise kilometers
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// Zoom level that roughly fits `bounds` into a typical viewport
pub fn zoom_for_bounds(bounds: Rect<f64>, max_zoom: f64) -> f64 {
    let span = bounds.width().abs().max(bounds.height().abs());
    if span > 0.0 {
        ((4.0 * 360.0 / span).log2() - 0.5).clamp(1.0, max_zoom)
    } else {
        max_zoom.min(15.0)
    }
}
