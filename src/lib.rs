//! Single-sweep rangefinder object detection.
//!
//! This crate provides tools for:
//! - Ingesting a rotating rangefinder's measurement stream one sweep at a time
//! - Restricting each sweep to the forward field of view and clustering it
//! - Estimating object width and bearing, and classifying objects as small or big
//! - Running a bounded detection loop with guaranteed device cleanup
//! - Replaying, analysing and plotting recorded sweeps offline
//!
//! # Example
//!
//! ```no_run
//! use sweep_trigger::{
//!     detector::detect_object_of_interest,
//!     devices::{SimulatedObject, SyntheticRangefinder},
//!     DetectionConfig,
//! };
//!
//! let device = SyntheticRangefinder::new(1.0).with_object(SimulatedObject::new(266.0, 274.0, 400.0));
//! let detection = detect_object_of_interest(device, &DetectionConfig::default()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod detector;
pub mod devices;
pub mod processors;
pub mod trigger;
pub mod visualization;

pub use config::{DetectionConfig, DeviceConfig, SweepTriggerConfig, TriggerConfig};
pub use core::device::{DeviceError, RangefinderDevice};
pub use core::types::{Detection, Direction, Measurement, SizeClass};
pub use detector::{CancelToken, DetectionOutcome, Detector};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
