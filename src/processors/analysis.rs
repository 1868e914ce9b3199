//! Single-sweep analysis: field-of-view filter through classification.

use log::{debug, info};

use super::cartesian::map_points;
use super::classify::{classify, ClassifiedObject};
use super::clustering::{cluster_points, merge_clusters, Cluster};
use super::filtering::filter_field_of_view;
use super::shape::estimate_cluster;
use crate::config::DetectionConfig;
use crate::core::types::{Detection, RawSample};

/// Everything learned from one sweep, for offline inspection.
#[derive(Debug, Clone)]
pub struct SweepAnalysis {
    pub sample_count: usize,
    pub fov_count: usize,
    /// Clusters committed before merging
    pub cluster_count: usize,
    pub merged: Vec<Cluster>,
    /// Objects that passed the width filter, in merged-cluster order
    pub objects: Vec<ClassifiedObject>,
    /// First object satisfying the emission rule
    pub detection: Option<Detection>,
}

/// Filter, map, cluster and merge one sweep's samples.
pub fn merged_clusters(samples: &[RawSample], config: &DetectionConfig) -> Vec<Cluster> {
    let fov = filter_field_of_view(samples);
    let points = map_points(&fov);
    let clusters = cluster_points(&points, config.max_gap_mm, config.min_points);
    debug!(
        "Sweep: {} samples, {} in view, {} clusters",
        samples.len(),
        fov.len(),
        clusters.len()
    );
    merge_clusters(clusters, config.merge_cluster_threshold_mm)
}

/// Lazily estimate and classify merged clusters, skipping narrow ones.
pub fn classified_objects<'a>(
    merged: &'a [Cluster],
    config: &'a DetectionConfig,
) -> impl Iterator<Item = ClassifiedObject> + 'a {
    merged
        .iter()
        .filter_map(estimate_cluster)
        .filter_map(move |shape| classify(&shape, config))
}

/// Return the first qualifying detection in a sweep.
///
/// Objects are classified in merged-cluster order and each one is logged;
/// analysis stops at the first small object within proximity.
pub fn find_detection(samples: &[RawSample], config: &DetectionConfig) -> Option<Detection> {
    let merged = merged_clusters(samples, config);
    let detection = classified_objects(&merged, config)
        .inspect(|object| info!("Detected object: {}", object.summary()))
        .find(|object| object.qualifies(config))
        .map(|object| object.to_detection());
    detection
}

/// Analyse a sweep without short-circuiting.
pub fn analyze_sweep(samples: &[RawSample], config: &DetectionConfig) -> SweepAnalysis {
    let fov = filter_field_of_view(samples);
    let points = map_points(&fov);
    let clusters = cluster_points(&points, config.max_gap_mm, config.min_points);
    let cluster_count = clusters.len();
    let merged = merge_clusters(clusters, config.merge_cluster_threshold_mm);

    let objects: Vec<ClassifiedObject> = classified_objects(&merged, config).collect();
    let detection = objects
        .iter()
        .find(|object| object.qualifies(config))
        .map(ClassifiedObject::to_detection);

    SweepAnalysis {
        sample_count: samples.len(),
        fov_count: fov.len(),
        cluster_count,
        merged,
        objects,
        detection,
    }
}
