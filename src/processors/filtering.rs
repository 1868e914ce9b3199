//! Range acceptance and forward field-of-view filtering.

use crate::core::types::RawSample;

/// First bearing of the forward field of view, inclusive.
pub const FOV_START_DEG: f64 = 225.0;

/// Last bearing of the forward field of view, inclusive.
pub const FOV_END_DEG: f64 = 315.0;

/// Straight-ahead bearing, the center of the field of view.
pub const FORWARD_DEG: f64 = 270.0;

/// Normalize an angle into [0, 360).
#[inline]
pub fn normalize_angle(angle_deg: f64) -> f64 {
    angle_deg.rem_euclid(360.0)
}

/// Accept a raw reading if its distance lies in (0, `max_distance`].
///
/// The returned sample carries the normalized angle.
pub fn accept_sample(angle_deg: f64, distance_mm: f64, max_distance: f64) -> Option<RawSample> {
    if distance_mm > 0.0 && distance_mm <= max_distance {
        Some(RawSample::new(normalize_angle(angle_deg), distance_mm))
    } else {
        None
    }
}

/// Whether a normalized angle falls inside the forward field of view.
#[inline]
pub fn in_field_of_view(angle_deg: f64) -> bool {
    (FOV_START_DEG..=FOV_END_DEG).contains(&angle_deg)
}

/// Select the samples inside the field of view, ordered by ascending angle.
///
/// The sort is stable, so samples sharing an angle keep their arrival order.
/// An empty result is normal.
pub fn filter_field_of_view(samples: &[RawSample]) -> Vec<RawSample> {
    let mut filtered: Vec<RawSample> = samples
        .iter()
        .filter(|s| in_field_of_view(s.angle_deg))
        .copied()
        .collect();

    filtered.sort_by(|a, b| a.angle_deg.total_cmp(&b.angle_deg));
    filtered
}
