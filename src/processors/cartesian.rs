//! Polar to Cartesian mapping of filtered samples.

use crate::core::types::{CartesianPoint, RawSample};

/// Convert polar coordinates in degrees and millimetres to (x, y).
///
/// Standard math convention: x = d * cos(angle), y = d * sin(angle).
#[inline]
pub fn polar_to_cartesian(angle_deg: f64, distance_mm: f64) -> (f64, f64) {
    let angle_rad = angle_deg.to_radians();
    (distance_mm * angle_rad.cos(), distance_mm * angle_rad.sin())
}

/// Map one filtered sample to a Cartesian point.
#[inline]
pub fn to_cartesian(sample: &RawSample) -> CartesianPoint {
    let (x, y) = polar_to_cartesian(sample.angle_deg, sample.distance_mm);
    CartesianPoint {
        angle_deg: sample.angle_deg,
        distance_mm: sample.distance_mm,
        x,
        y,
    }
}

/// Map every sample, preserving order.
pub fn map_points(samples: &[RawSample]) -> Vec<CartesianPoint> {
    samples.iter().map(to_cartesian).collect()
}
