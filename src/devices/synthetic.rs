//! Deterministic simulated rangefinder.
//!
//! Produces evenly spaced readings around the full circle, rotation after
//! rotation. Placed objects return their distance across their angular range;
//! everywhere else returns the background distance, or 0 (no return) when
//! there is none.

use std::fmt;
use std::str::FromStr;

use crate::core::device::{DeviceError, RangefinderDevice, Result};
use crate::core::types::Measurement;

/// An object occupying `[start_deg, end_deg]` at a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedObject {
    pub start_deg: f64,
    pub end_deg: f64,
    pub distance_mm: f64,
}

impl SimulatedObject {
    pub fn new(start_deg: f64, end_deg: f64, distance_mm: f64) -> Self {
        Self {
            start_deg,
            end_deg,
            distance_mm,
        }
    }

    fn covers(&self, angle_deg: f64) -> bool {
        if self.start_deg <= self.end_deg {
            angle_deg >= self.start_deg && angle_deg <= self.end_deg
        } else {
            // Wraps through 0
            angle_deg >= self.start_deg || angle_deg <= self.end_deg
        }
    }
}

impl fmt::Display for SimulatedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start_deg, self.end_deg, self.distance_mm)
    }
}

impl FromStr for SimulatedObject {
    type Err = String;

    /// Parses `START:END:DISTANCE`, e.g. `266:274:400`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected START:END:DISTANCE, got '{}'", s));
        }
        let parse = |v: &str, what: &str| {
            v.parse::<f64>()
                .map_err(|_| format!("invalid {} '{}' in '{}'", what, v, s))
        };
        let object = Self::new(
            parse(parts[0], "start angle")?,
            parse(parts[1], "end angle")?,
            parse(parts[2], "distance")?,
        );
        if object.distance_mm <= 0.0 {
            return Err(format!("distance must be positive in '{}'", s));
        }
        Ok(object)
    }
}

/// Simulated rotating rangefinder.
#[derive(Debug, Clone)]
pub struct SyntheticRangefinder {
    objects: Vec<SimulatedObject>,
    background_mm: Option<f64>,
    step_deg: f64,
    index: u64,
    readings_per_rotation: u64,
    max_rotations: Option<u64>,
    scanning: bool,
    connected: bool,
}

impl SyntheticRangefinder {
    /// A rangefinder sampling every `step_deg` degrees.
    ///
    /// The first reading is taken one step past 0 deg, so the first sweep
    /// boundary arrives after a full rotation.
    pub fn new(step_deg: f64) -> Self {
        let step_deg = if step_deg > 0.0 { step_deg } else { 1.0 };
        let readings_per_rotation = (360.0 / step_deg).round().max(1.0) as u64;
        Self {
            objects: Vec::new(),
            background_mm: None,
            step_deg,
            index: 0,
            readings_per_rotation,
            max_rotations: None,
            scanning: false,
            connected: true,
        }
    }

    pub fn with_object(mut self, object: SimulatedObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_objects<I: IntoIterator<Item = SimulatedObject>>(mut self, objects: I) -> Self {
        self.objects.extend(objects);
        self
    }

    /// Distance returned where no object is present.
    pub fn with_background(mut self, distance_mm: f64) -> Self {
        self.background_mm = Some(distance_mm);
        self
    }

    /// Fault with [`DeviceError::StreamEnded`] after this many rotations.
    pub fn with_max_rotations(mut self, rotations: u64) -> Self {
        self.max_rotations = Some(rotations);
        self
    }

    /// Completed rotations so far.
    pub fn rotations(&self) -> u64 {
        self.index / self.readings_per_rotation
    }

    fn distance_at(&self, angle_deg: f64) -> f64 {
        self.objects
            .iter()
            .filter(|o| o.covers(angle_deg))
            .map(|o| o.distance_mm)
            .fold(None, |closest: Option<f64>, d| Some(closest.map_or(d, |c| c.min(d))))
            .or(self.background_mm)
            .unwrap_or(0.0)
    }
}

impl RangefinderDevice for SyntheticRangefinder {
    fn start(&mut self) -> Result<()> {
        if !self.connected {
            return Err(DeviceError::Disconnected);
        }
        self.scanning = true;
        Ok(())
    }

    fn next_measurement(&mut self) -> Result<Measurement> {
        if !self.connected {
            return Err(DeviceError::Disconnected);
        }
        if !self.scanning {
            return Err(DeviceError::Protocol("scan not started".to_string()));
        }
        if let Some(max) = self.max_rotations {
            if self.rotations() >= max {
                return Err(DeviceError::StreamEnded {
                    samples: self.index as usize,
                });
            }
        }

        let slot = (self.index + 1) % self.readings_per_rotation;
        let angle_deg = slot as f64 * self.step_deg;
        self.index += 1;

        Ok(Measurement {
            new_scan: slot == 1 % self.readings_per_rotation,
            quality: 15,
            angle_deg,
            distance_mm: self.distance_at(angle_deg),
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.scanning = false;
        Ok(())
    }

    fn stop_motor(&mut self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}
