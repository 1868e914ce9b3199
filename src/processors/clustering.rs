//! Gap clustering and centroid merging of field-of-view points.
//!
//! Clustering is a single left-to-right pass over angle-sorted points: a point
//! joins the current cluster when it lies within `max_gap_mm` of the last point
//! appended, otherwise it starts a new one. Clusters smaller than `min_points`
//! are dropped.
//!
//! Merging is a single "base absorbs" pass, not a connected-components
//! search. Each unvisited cluster becomes a base; its centroid is computed
//! once, and every later unvisited cluster whose own centroid lies within the
//! merge threshold is appended to it. The base centroid is not recomputed as
//! clusters are absorbed, so the result depends on index order and is not
//! transitive.
//!
//! # Example
//!
//! ```
//! use sweep_trigger::core::types::RawSample;
//! use sweep_trigger::processors::cartesian::map_points;
//! use sweep_trigger::processors::clustering::{cluster_points, merge_clusters};
//!
//! let points = map_points(&[
//!     RawSample::new(268.0, 400.0),
//!     RawSample::new(270.0, 400.0),
//!     RawSample::new(300.0, 1500.0),
//! ]);
//! let clusters = cluster_points(&points, 300.0, 2);
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(merge_clusters(clusters, 150.0).len(), 1);
//! ```

use crate::core::types::{euclidean_distance, CartesianPoint};

/// An ordered run of points judged to belong to one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    points: Vec<CartesianPoint>,
}

impl Cluster {
    /// Start a cluster from a single point.
    pub fn new(first: CartesianPoint) -> Self {
        Self {
            points: vec![first],
        }
    }

    /// Build a cluster from existing points.
    pub fn from_points(points: Vec<CartesianPoint>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[CartesianPoint] {
        &self.points
    }

    /// The most recently appended point.
    #[inline]
    pub fn last(&self) -> Option<&CartesianPoint> {
        self.points.last()
    }

    #[inline]
    pub fn push(&mut self, point: CartesianPoint) {
        self.points.push(point);
    }

    /// Append every point of `other`, keeping order.
    pub fn absorb(&mut self, other: Cluster) {
        self.points.extend(other.points);
    }

    /// Mean Cartesian position, or `None` for an empty cluster.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some((sx / n, sy / n))
    }

    /// Polar (angle, distance) pairs in member order.
    pub fn polar_pairs(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|p| (p.angle_deg, p.distance_mm))
            .collect()
    }
}

/// Group consecutive points by gap distance.
///
/// Each point is compared with the last point appended to the current cluster,
/// not its centroid. Committed clusters always hold at least `min_points`
/// members.
pub fn cluster_points(points: &[CartesianPoint], max_gap_mm: f64, min_points: usize) -> Vec<Cluster> {
    let mut clusters = Vec::new();
    let mut iter = points.iter();

    let mut current = match iter.next() {
        Some(first) => Cluster::new(*first),
        None => return clusters,
    };

    for point in iter {
        let joins = current
            .last()
            .map(|last| last.distance_to(point) <= max_gap_mm)
            .unwrap_or(false);

        if joins {
            current.push(*point);
        } else {
            let finished = std::mem::replace(&mut current, Cluster::new(*point));
            if finished.len() >= min_points {
                clusters.push(finished);
            }
        }
    }

    if current.len() >= min_points {
        clusters.push(current);
    }

    clusters
}

/// Merge clusters whose centroids are within `threshold_mm` of a base cluster.
///
/// See the module docs for the exact single-pass rule.
pub fn merge_clusters(clusters: Vec<Cluster>, threshold_mm: f64) -> Vec<Cluster> {
    let centroids: Vec<Option<(f64, f64)>> = clusters.iter().map(Cluster::centroid).collect();
    let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();
    let mut merged = Vec::with_capacity(slots.len());

    for i in 0..slots.len() {
        let Some(mut base) = slots[i].take() else {
            continue;
        };
        let Some(base_center) = centroids[i] else {
            merged.push(base);
            continue;
        };

        for j in (i + 1)..slots.len() {
            let close = match (&slots[j], centroids[j]) {
                (Some(_), Some(center)) => euclidean_distance(base_center, center) <= threshold_mm,
                _ => false,
            };
            if close {
                if let Some(candidate) = slots[j].take() {
                    base.absorb(candidate);
                }
            }
        }

        merged.push(base);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RawSample;
    use crate::processors::cartesian::map_points;

    fn point_at(x: f64, y: f64) -> CartesianPoint {
        CartesianPoint {
            angle_deg: y.atan2(x).to_degrees().rem_euclid(360.0),
            distance_mm: (x * x + y * y).sqrt(),
            x,
            y,
        }
    }

    fn cluster_around(x: f64, y: f64) -> Cluster {
        Cluster::from_points(vec![point_at(x - 5.0, y), point_at(x + 5.0, y)])
    }

    #[test]
    fn test_cluster_splits_on_gap() {
        let points = vec![
            point_at(0.0, -500.0),
            point_at(100.0, -500.0),
            point_at(200.0, -500.0),
            point_at(900.0, -500.0),
            point_at(1000.0, -500.0),
        ];

        let clusters = cluster_points(&points, 300.0, 2);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 3);
        assert_eq!(clusters[1].len(), 2);
    }

    #[test]
    fn test_gap_exactly_at_threshold_joins() {
        let points = vec![point_at(0.0, -500.0), point_at(300.0, -500.0)];
        let clusters = cluster_points(&points, 300.0, 2);
        assert_eq!(clusters.len(), 1);

        let clusters = cluster_points(&points, 299.9, 2);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_gap_measured_from_last_point() {
        // Each step is 250 mm, so the chain keeps growing even though the
        // last point is far from the first.
        let points: Vec<CartesianPoint> = (0..5).map(|i| point_at(i as f64 * 250.0, -500.0)).collect();
        let clusters = cluster_points(&points, 300.0, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn test_small_clusters_dropped() {
        let points = vec![
            point_at(0.0, -500.0),
            point_at(1000.0, -500.0),
            point_at(1050.0, -500.0),
            point_at(3000.0, -500.0),
        ];

        let clusters = cluster_points(&points, 300.0, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].points()[0].x, 1000.0);

        let clusters = cluster_points(&points, 300.0, 1);
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn test_cluster_empty_input() {
        assert!(cluster_points(&[], 300.0, 2).is_empty());
    }

    #[test]
    fn test_cluster_from_polar_samples() {
        let points = map_points(&[
            RawSample::new(269.0, 400.0),
            RawSample::new(271.0, 400.0),
        ]);
        let clusters = cluster_points(&points, 300.0, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].polar_pairs(), vec![(269.0, 400.0), (271.0, 400.0)]);
    }

    #[test]
    fn test_centroid() {
        let cluster = Cluster::from_points(vec![point_at(0.0, 0.0), point_at(10.0, 20.0)]);
        assert_eq!(cluster.centroid(), Some((5.0, 10.0)));
        assert_eq!(Cluster::from_points(Vec::new()).centroid(), None);
    }

    #[test]
    fn test_merge_is_base_centric() {
        // A-B and A-C are close, B-C are not: all three still merge into A.
        let a = cluster_around(0.0, -1000.0);
        let b = cluster_around(100.0, -1000.0);
        let c = cluster_around(-100.0, -1000.0);

        let merged = merge_clusters(vec![a, b, c], 150.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].len(), 6);
    }

    #[test]
    fn test_merge_is_not_transitive() {
        // A absorbs B, but C is only close to B, so it stays separate.
        let a = cluster_around(0.0, -1000.0);
        let b = cluster_around(100.0, -1000.0);
        let c = cluster_around(200.0, -1000.0);

        let merged = merge_clusters(vec![a, b, c], 150.0);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].len(), 4);
        assert_eq!(merged[1].len(), 2);
    }

    #[test]
    fn test_merge_keeps_absorption_order() {
        let a = cluster_around(0.0, -1000.0);
        let b = cluster_around(500.0, -1000.0);
        let c = cluster_around(50.0, -1000.0);

        let merged = merge_clusters(vec![a.clone(), b.clone(), c.clone()], 150.0);
        assert_eq!(merged.len(), 2);

        let mut expected = a;
        expected.absorb(c);
        assert_eq!(merged[0], expected);
        assert_eq!(merged[1], b);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_clusters(Vec::new(), 150.0).is_empty());
    }
}
