//! Size classification, bearing text and the emission rule.

use super::filtering::FORWARD_DEG;
use super::shape::ShapeEstimate;
use crate::config::DetectionConfig;
use crate::core::types::{Detection, Direction, SizeClass};

/// A merged cluster that passed the width filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedObject {
    pub shape: ShapeEstimate,
    pub size_class: SizeClass,
    pub direction: Direction,
}

impl ClassifiedObject {
    /// Whether this object is small and near enough to be emitted.
    pub fn qualifies(&self, config: &DetectionConfig) -> bool {
        self.size_class == SizeClass::Small && self.shape.avg_distance_mm <= config.min_proximity_mm
    }

    /// The caller-facing detection record for this object.
    pub fn to_detection(&self) -> Detection {
        Detection {
            width_mm: self.shape.width_mm as i64,
            distance_mm: self.shape.avg_distance_mm as i64,
            angle_center_deg: round_tenth(self.shape.center_angle_deg),
            size_class: self.size_class,
        }
    }

    /// One-line summary, e.g. `(small, 400 mm, 0 degrees left)`.
    pub fn summary(&self) -> String {
        format!(
            "({}, {} mm, {})",
            self.size_class, self.shape.avg_distance_mm as i64, self.direction
        )
    }
}

/// Assign a size class from the estimated width.
pub fn size_class(width_mm: f64, config: &DetectionConfig) -> SizeClass {
    if width_mm >= config.big_object_threshold_mm {
        SizeClass::Big
    } else {
        SizeClass::Small
    }
}

/// Bearing relative to straight ahead (270 deg).
///
/// Relative angles above 180 are reported to the right, everything else to the
/// left; degrees are truncated before the right-hand complement is taken.
pub fn direction(center_angle_deg: f64) -> Direction {
    let relative = (center_angle_deg - FORWARD_DEG).rem_euclid(360.0);
    let whole = relative.trunc() as u32;
    if relative > 180.0 {
        Direction::Right(360 - whole)
    } else {
        Direction::Left(whole)
    }
}

/// Classify a shape, or `None` when it is narrower than the minimum width.
pub fn classify(shape: &ShapeEstimate, config: &DetectionConfig) -> Option<ClassifiedObject> {
    if shape.width_mm < config.min_physical_width_mm {
        return None;
    }
    Some(ClassifiedObject {
        shape: *shape,
        size_class: size_class(shape.width_mm, config),
        direction: direction(shape.center_angle_deg),
    })
}

/// Round to one decimal place, ties to even on the exact binary value.
fn round_tenth(value: f64) -> f64 {
    format!("{:.1}", value).parse().unwrap_or(value)
}
