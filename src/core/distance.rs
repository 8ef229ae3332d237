use geo::{point, HaversineDistance};

use crate::models::{BoundingBox, Coordinates};

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two coordinates in kilometres
#[inline]
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let a = point!(x: from.longitude, y: from.latitude);
    let b = point!(x: to.longitude, y: to.latitude);

    a.haversine_distance(&b) / 1000.0
}

/// Calculate a bounding box around a center point
///
/// Cheaper than haversine, used to reject far-away candidates before the
/// exact distance check. 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude)
///
/// Longitudes may run past ±180 when the circle crosses the antimeridian;
/// [`is_within_bounding_box`] wraps them. A circle that reaches a pole spans
/// every longitude.
pub fn calculate_bounding_box(center: &Coordinates, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let min_lat = center.latitude - lat_delta;
    let max_lat = center.latitude + lat_delta;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    // Near the poles cos() approaches zero; fall back to the full longitude range
    let cos_lat = center.latitude.to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        radius_km / (KM_PER_DEGREE * cos_lat)
    };

    if lon_delta >= 180.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: center.longitude - lon_delta,
        max_lon: center.longitude + lon_delta,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(point: &Coordinates, bbox: &BoundingBox) -> bool {
    if point.latitude < bbox.min_lat || point.latitude > bbox.max_lat {
        return false;
    }

    let lon = point.longitude;
    if bbox.min_lon < -180.0 {
        lon >= bbox.min_lon + 360.0 || lon <= bbox.max_lon
    } else if bbox.max_lon > 180.0 {
        lon >= bbox.min_lon || lon <= bbox.max_lon - 360.0
    } else {
        lon >= bbox.min_lon && lon <= bbox.max_lon
    }
}
