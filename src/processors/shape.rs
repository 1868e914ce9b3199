//! Angular span, range and chord-width estimation for merged clusters.

use super::clustering::Cluster;

/// Objects at or inside this range get a minimum span.
pub const NEAR_FIELD_DISTANCE_MM: f64 = 250.0;

/// Minimum span applied to near-field objects, in degrees.
pub const NEAR_FIELD_MIN_SPAN_DEG: f64 = 20.0;

/// Geometry of one merged cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeEstimate {
    pub point_count: usize,
    /// Estimated angular span in degrees, after near-field clamping
    pub span_deg: f64,
    pub min_angle_deg: f64,
    /// Center bearing in [0, 360)
    pub center_angle_deg: f64,
    pub avg_distance_mm: f64,
    pub closest_mm: f64,
    /// Chord width in millimetres
    pub width_mm: f64,
}

/// Estimate the shape of a merged cluster from its polar samples.
pub fn estimate_cluster(cluster: &Cluster) -> Option<ShapeEstimate> {
    estimate_shape(&cluster.polar_pairs())
}

/// Estimate shape from (angle_deg, distance_mm) pairs.
///
/// Returns `None` only for an empty input. A single point has zero span before
/// near-field clamping.
pub fn estimate_shape(pairs: &[(f64, f64)]) -> Option<ShapeEstimate> {
    if pairs.is_empty() {
        return None;
    }

    let mut angles: Vec<f64> = pairs.iter().map(|&(a, _)| a).collect();
    angles.sort_by(f64::total_cmp);

    let min_angle = angles[0];
    let mut span = if angles.len() >= 2 {
        let steps = angles.len() - 1;
        let avg_step = angles.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / steps as f64;
        let from_steps = avg_step * steps as f64;
        let direct = angles[angles.len() - 1] - min_angle;
        from_steps.max(direct)
    } else {
        0.0
    };

    let n = pairs.len() as f64;
    let avg_distance = pairs.iter().map(|&(_, d)| d).sum::<f64>() / n;
    let closest = pairs
        .iter()
        .map(|&(_, d)| d)
        .fold(f64::INFINITY, f64::min);

    if avg_distance <= NEAR_FIELD_DISTANCE_MM && span < NEAR_FIELD_MIN_SPAN_DEG {
        span = NEAR_FIELD_MIN_SPAN_DEG;
    }

    let center_angle = (min_angle + span / 2.0).rem_euclid(360.0);
    let width = 2.0 * avg_distance * (span / 2.0).to_radians().tan();

    Some(ShapeEstimate {
        point_count: pairs.len(),
        span_deg: span,
        min_angle_deg: min_angle,
        center_angle_deg: center_angle,
        avg_distance_mm: avg_distance,
        closest_mm: closest,
        width_mm: width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_span_from_steps() {
        let shape = estimate_shape(&[(270.0, 1000.0), (271.0, 1000.0), (272.0, 1000.0)]).unwrap();
        assert!((shape.span_deg - 2.0).abs() < EPS);
        assert!((shape.center_angle_deg - 271.0).abs() < EPS);
    }

    #[test]
    fn test_near_field_span_clamped() {
        let shape = estimate_shape(&[(270.0, 200.0), (271.0, 200.0), (272.0, 200.0)]).unwrap();
        assert_eq!(shape.span_deg, 20.0);
        assert!((shape.center_angle_deg - 280.0).abs() < EPS);
    }

    #[test]
    fn test_clamp_boundary_inclusive() {
        let shape = estimate_shape(&[(270.0, 250.0), (272.0, 250.0)]).unwrap();
        assert_eq!(shape.span_deg, 20.0);

        let shape = estimate_shape(&[(270.0, 250.5), (272.0, 250.5)]).unwrap();
        assert!((shape.span_deg - 2.0).abs() < EPS);
    }

    #[test]
    fn test_wide_near_span_not_clamped() {
        let shape = estimate_shape(&[(250.0, 200.0), (280.0, 200.0)]).unwrap();
        assert!((shape.span_deg - 30.0).abs() < EPS);
    }

    #[test]
    fn test_width_chord_approximation() {
        let shape = estimate_shape(&[(260.0, 1000.0), (280.0, 1000.0)]).unwrap();
        let expected = 2.0 * 1000.0 * 10f64.to_radians().tan();
        assert!((shape.width_mm - expected).abs() < EPS);
        assert!((shape.width_mm - 352.65).abs() < 0.01);
    }

    #[test]
    fn test_single_point_degenerate() {
        let far = estimate_shape(&[(270.0, 800.0)]).unwrap();
        assert_eq!(far.span_deg, 0.0);
        assert_eq!(far.width_mm, 0.0);
        assert_eq!(far.center_angle_deg, 270.0);

        let near = estimate_shape(&[(270.0, 100.0)]).unwrap();
        assert_eq!(near.span_deg, 20.0);
        assert!(near.width_mm > 0.0);
    }

    #[test]
    fn test_unsorted_angles_and_closest() {
        let shape = estimate_shape(&[(272.0, 500.0), (268.0, 300.0), (270.0, 400.0)]).unwrap();
        assert_eq!(shape.min_angle_deg, 268.0);
        assert!((shape.span_deg - 4.0).abs() < EPS);
        assert_eq!(shape.closest_mm, 300.0);
        assert!((shape.avg_distance_mm - 400.0).abs() < EPS);
    }

    #[test]
    fn test_center_wraps_past_360() {
        let shape = estimate_shape(&[(355.0, 100.0)]).unwrap();
        assert!((shape.center_angle_deg - 5.0).abs() < EPS);
    }

    #[test]
    fn test_empty_input() {
        assert!(estimate_shape(&[]).is_none());
    }

    #[test]
    fn test_estimate_is_pure() {
        let pairs = [(265.0, 420.0), (268.0, 410.0), (271.0, 430.0)];
        assert_eq!(estimate_shape(&pairs), estimate_shape(&pairs));
    }
}
