//! Per-sweep sample buffering and sweep boundary detection.

use crate::core::types::{Measurement, RawSample};

use super::filtering::{accept_sample, normalize_angle};

/// Decides when one rotation's worth of samples is complete.
pub trait SweepBoundary {
    /// Called for every measurement, accepted or not, after buffering.
    fn is_boundary(&mut self, measurement: &Measurement, normalized_angle_deg: f64) -> bool;
}

/// Ends a sweep whenever a normalized angle falls below a threshold.
///
/// This is an approximate boundary: jitter around 0 deg can fire it more than
/// once per physical rotation, and every firing counts as a sweep.
#[derive(Debug, Clone, Copy)]
pub struct NearZeroBoundary {
    pub threshold_deg: f64,
}

impl Default for NearZeroBoundary {
    fn default() -> Self {
        Self { threshold_deg: 1.0 }
    }
}

impl SweepBoundary for NearZeroBoundary {
    fn is_boundary(&mut self, _measurement: &Measurement, normalized_angle_deg: f64) -> bool {
        normalized_angle_deg < self.threshold_deg
    }
}

/// Ends a sweep on the device's own start-of-scan flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartFlagBoundary;

impl SweepBoundary for StartFlagBoundary {
    fn is_boundary(&mut self, measurement: &Measurement, _normalized_angle_deg: f64) -> bool {
        measurement.new_scan
    }
}

/// Buffers accepted samples until the boundary reports a completed sweep.
pub struct ScanIngestor<B: SweepBoundary = NearZeroBoundary> {
    max_distance: f64,
    boundary: B,
    buffer: Vec<RawSample>,
    dropped: usize,
}

impl ScanIngestor<NearZeroBoundary> {
    /// Ingestor with the default near-zero boundary.
    pub fn new(max_distance: f64) -> Self {
        Self::with_boundary(max_distance, NearZeroBoundary::default())
    }
}

impl<B: SweepBoundary> ScanIngestor<B> {
    pub fn with_boundary(max_distance: f64, boundary: B) -> Self {
        Self {
            max_distance,
            boundary,
            buffer: Vec::with_capacity(1024),
            dropped: 0,
        }
    }

    /// Buffer one measurement if its range is valid, then check the boundary.
    ///
    /// Returns `true` when the current sweep is complete. The buffer is left
    /// untouched; the caller analyses it and then calls [`clear`](Self::clear).
    pub fn ingest(&mut self, measurement: &Measurement) -> bool {
        match accept_sample(measurement.angle_deg, measurement.distance_mm, self.max_distance) {
            Some(sample) => self.buffer.push(sample),
            None => self.dropped += 1,
        }
        let angle = normalize_angle(measurement.angle_deg);
        self.boundary.is_boundary(measurement, angle)
    }

    /// Samples buffered for the current sweep.
    pub fn sweep(&self) -> &[RawSample] {
        &self.buffer
    }

    /// Readings rejected for range since the last clear.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Discard the current sweep.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.dropped = 0;
    }
}

/// Split a finite recording into completed sweeps.
///
/// Samples after the last boundary form an incomplete sweep and are dropped,
/// matching what a live detection call would analyse.
pub fn split_sweeps<B: SweepBoundary>(
    measurements: &[Measurement],
    max_distance: f64,
    boundary: B,
) -> Vec<Vec<RawSample>> {
    let mut ingestor = ScanIngestor::with_boundary(max_distance, boundary);
    let mut sweeps = Vec::new();

    for measurement in measurements {
        if ingestor.ingest(measurement) {
            sweeps.push(ingestor.sweep().to_vec());
            ingestor.clear();
        }
    }

    sweeps
}
