//! Sweep processing stages.

pub mod analysis;
pub mod batch;
pub mod cartesian;
pub mod classify;
pub mod clustering;
pub mod filtering;
pub mod ingest;
pub mod shape;

// Re-export key types for convenience
pub use analysis::{analyze_sweep, find_detection, SweepAnalysis};
pub use batch::{analyze_directory, analyze_recording, RecordingSummary};
pub use classify::{classify, ClassifiedObject};
pub use clustering::{cluster_points, merge_clusters, Cluster};
pub use filtering::{filter_field_of_view, FORWARD_DEG, FOV_END_DEG, FOV_START_DEG};
pub use ingest::{split_sweeps, NearZeroBoundary, ScanIngestor, StartFlagBoundary, SweepBoundary};
pub use shape::{estimate_shape, ShapeEstimate};
