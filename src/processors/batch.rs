//! Offline analysis of recorded measurement streams.
//!
//! Each recording is split into sweeps and every sweep is analysed in full.
//! The recording is also replayed through the live detector so the summary
//! shows what a detection call would have returned. Directories are processed
//! in parallel with rayon, one recording per task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use rayon::prelude::*;

use super::analysis::analyze_sweep;
use super::ingest::{split_sweeps, NearZeroBoundary};
use crate::config::DetectionConfig;
use crate::core::device::DeviceError;
use crate::core::loaders::{find_recordings, load_recording};
use crate::core::types::Measurement;
use crate::core::writers::ObjectRecord;
use crate::detector::{DetectionOutcome, Detector, DetectorError};
use crate::devices::ReplayDevice;

/// Analysis results for one recording.
#[derive(Debug, Clone)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub measurements: usize,
    pub sweeps: usize,
    /// Every classified object in every completed sweep
    pub objects: Vec<ObjectRecord>,
    /// Outcome of replaying the recording through the detector, or `None`
    /// when the recording ended before the detector finished.
    pub outcome: Option<DetectionOutcome>,
}

impl RecordingSummary {
    pub fn qualifying_objects(&self) -> usize {
        self.objects.iter().filter(|o| o.qualifies).count()
    }
}

/// Analyse measurements already in memory.
pub fn analyze_measurements(
    source: &Path,
    measurements: &[Measurement],
    config: &DetectionConfig,
) -> Result<RecordingSummary> {
    let name = source
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let sweeps = split_sweeps(measurements, config.max_distance, NearZeroBoundary::default());

    let mut objects = Vec::new();
    for (i, sweep) in sweeps.iter().enumerate() {
        let analysis = analyze_sweep(sweep, config);
        for (j, object) in analysis.objects.iter().enumerate() {
            objects.push(ObjectRecord::new(&name, i + 1, j, object, object.qualifies(config)));
        }
    }

    let detector = Detector::new(config.clone()).with_settle_delay(Duration::ZERO);
    let outcome = match detector.run(ReplayDevice::new(measurements.to_vec())) {
        Ok(outcome) => Some(outcome),
        Err(DetectorError::Device(DeviceError::StreamEnded { .. })) => None,
        Err(e) => return Err(e).with_context(|| format!("Replay of {} failed", name)),
    };

    Ok(RecordingSummary {
        path: source.to_path_buf(),
        measurements: measurements.len(),
        sweeps: sweeps.len(),
        objects,
        outcome,
    })
}

/// Load and analyse one recording.
pub fn analyze_recording(path: &Path, config: &DetectionConfig) -> Result<RecordingSummary> {
    let measurements = load_recording(path)
        .with_context(|| format!("Failed to load recording: {}", path.display()))?;
    let summary = analyze_measurements(path, &measurements, config)?;
    info!(
        "{}: {} sweeps, {} objects",
        path.display(),
        summary.sweeps,
        summary.objects.len()
    );
    Ok(summary)
}

/// Analyse every recording in a directory in parallel.
///
/// Recordings that fail to load are logged and skipped. Results keep the
/// sorted file order.
pub fn analyze_directory(directory: &Path, config: &DetectionConfig) -> Result<Vec<RecordingSummary>> {
    let files = find_recordings(directory)
        .with_context(|| format!("Failed to list recordings in {}", directory.display()))?;

    let summaries: Vec<RecordingSummary> = files
        .par_iter()
        .filter_map(|path| match analyze_recording(path, config) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::writers::write_recording;
    use crate::devices::{SimulatedObject, SyntheticRangefinder};
    use crate::core::device::RangefinderDevice;
    use std::fs;
    use tempfile::TempDir;

    fn synthetic_recording(object: SimulatedObject, rotations: usize) -> Vec<Measurement> {
        let mut device = SyntheticRangefinder::new(1.0).with_object(object);
        device.start().unwrap();
        device
            .measurements()
            .take(360 * rotations)
            .map(|m| m.unwrap())
            .collect()
    }

    #[test]
    fn test_analyze_measurements_with_detection() {
        let measurements = synthetic_recording(SimulatedObject::new(266.0, 274.0, 400.0), 2);
        let config = DetectionConfig::default();

        let summary = analyze_measurements(Path::new("near.csv"), &measurements, &config).unwrap();
        assert_eq!(summary.sweeps, 2);
        assert_eq!(summary.objects.len(), 2);
        assert_eq!(summary.qualifying_objects(), 2);

        let outcome = summary.outcome.unwrap();
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(outcome.detection().unwrap().distance_mm, 400);
    }

    #[test]
    fn test_short_recording_has_no_outcome() {
        let measurements = synthetic_recording(SimulatedObject::new(266.0, 274.0, 1500.0), 2);
        let config = DetectionConfig::default();

        let summary = analyze_measurements(Path::new("far.csv"), &measurements, &config).unwrap();
        assert_eq!(summary.sweeps, 2);
        assert_eq!(summary.qualifying_objects(), 0);
        assert!(summary.outcome.is_none());
    }

    #[test]
    fn test_analyze_directory() {
        let temp_dir = TempDir::new().unwrap();
        let near = synthetic_recording(SimulatedObject::new(266.0, 274.0, 400.0), 1);
        let far = synthetic_recording(SimulatedObject::new(266.0, 274.0, 1500.0), 4);

        write_recording(&temp_dir.path().join("a_near.csv"), &near).unwrap();
        write_recording(&temp_dir.path().join("b_far.csv"), &far).unwrap();
        fs::write(temp_dir.path().join("c_broken.csv"), "angle_deg\n1.0\n").unwrap();

        let summaries = analyze_directory(temp_dir.path(), &DetectionConfig::default()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].path.ends_with("a_near.csv"));
        assert!(summaries[0].outcome.as_ref().unwrap().detection().is_some());
        assert_eq!(
            summaries[1].outcome,
            Some(DetectionOutcome::Exhausted { attempts: 4 })
        );
    }
}
