//! Configuration types for the sweep trigger.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Thresholds for single-sweep object detection.
///
/// Every option is consumed by exactly one pipeline stage, named in its doc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Classifier: objects narrower than this are discarded
    #[serde(default = "default_min_physical_width_mm")]
    pub min_physical_width_mm: f64,

    /// Classifier: objects at least this wide are "big"
    #[serde(default = "default_big_object_threshold_mm")]
    pub big_object_threshold_mm: f64,

    /// Clusterer: maximum Cartesian gap between consecutive points of one cluster
    #[serde(default = "default_max_gap_mm")]
    pub max_gap_mm: f64,

    /// Ingestor: samples beyond this range are dropped
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    /// Clusterer: clusters with fewer points are dropped
    #[serde(default = "default_min_points")]
    pub min_points: usize,

    /// Classifier: small objects must be at most this far away to be emitted
    #[serde(default = "default_min_proximity_mm")]
    pub min_proximity_mm: f64,

    /// Loop controller: number of completed sweeps analysed before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Merger: clusters whose centroids are this close are joined
    #[serde(default = "default_merge_cluster_threshold_mm")]
    pub merge_cluster_threshold_mm: f64,
}

fn default_min_physical_width_mm() -> f64 {
    25.0
}

fn default_big_object_threshold_mm() -> f64 {
    150.0
}

fn default_max_gap_mm() -> f64 {
    300.0
}

fn default_max_distance() -> f64 {
    2000.0
}

fn default_min_points() -> usize {
    2
}

fn default_min_proximity_mm() -> f64 {
    500.0
}

fn default_max_attempts() -> u32 {
    4
}

fn default_merge_cluster_threshold_mm() -> f64 {
    150.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_physical_width_mm: default_min_physical_width_mm(),
            big_object_threshold_mm: default_big_object_threshold_mm(),
            max_gap_mm: default_max_gap_mm(),
            max_distance: default_max_distance(),
            min_points: default_min_points(),
            min_proximity_mm: default_min_proximity_mm(),
            max_attempts: default_max_attempts(),
            merge_cluster_threshold_mm: default_merge_cluster_threshold_mm(),
        }
    }
}

/// Rangefinder connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial port of the rangefinder
    #[serde(default = "default_port")]
    pub port: String,

    /// Wait after starting the device before the first pull, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl DeviceConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Outer polling loop parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Pause between two detection calls
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Minimum time between two downstream triggers
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Width filter used by the polling loop in place of the detection one
    #[serde(default = "default_trigger_min_width_mm")]
    pub min_physical_width_mm: f64,

    /// Clustering gap used by the polling loop
    #[serde(default = "default_trigger_max_gap_mm")]
    pub max_gap_mm: f64,

    /// Trigger radius used by the polling loop
    #[serde(default = "default_trigger_proximity_mm")]
    pub min_proximity_mm: f64,
}

fn default_scan_interval_secs() -> u64 {
    5
}

fn default_debounce_secs() -> u64 {
    10
}

fn default_trigger_min_width_mm() -> f64 {
    20.0
}

fn default_trigger_max_gap_mm() -> f64 {
    200.0
}

fn default_trigger_proximity_mm() -> f64 {
    250.0
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            debounce_secs: default_debounce_secs(),
            min_physical_width_mm: default_trigger_min_width_mm(),
            max_gap_mm: default_trigger_max_gap_mm(),
            min_proximity_mm: default_trigger_proximity_mm(),
        }
    }
}

impl TriggerConfig {
    /// `base` with the polling loop's width, gap and proximity overrides.
    pub fn detection_profile(&self, base: &DetectionConfig) -> DetectionConfig {
        DetectionConfig {
            min_physical_width_mm: self.min_physical_width_mm,
            max_gap_mm: self.max_gap_mm,
            min_proximity_mm: self.min_proximity_mm,
            ..base.clone()
        }
    }
}

/// Top-level configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepTriggerConfig {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl SweepTriggerConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SweepTriggerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
