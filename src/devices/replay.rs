//! Replays a recorded measurement stream as a rangefinder.

use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::core::device::{DeviceError, RangefinderDevice, Result};
use crate::core::loaders::{load_recording, LoaderError};
use crate::core::types::Measurement;

/// Device backed by an in-memory recording.
///
/// Without looping, pulling past the end is reported as
/// [`DeviceError::StreamEnded`], the same way a real stream fault would be.
#[derive(Debug, Clone)]
pub struct ReplayDevice {
    measurements: Vec<Measurement>,
    cursor: usize,
    looping: bool,
    pace: Option<Duration>,
    scanning: bool,
    connected: bool,
}

impl ReplayDevice {
    pub fn new(measurements: Vec<Measurement>) -> Self {
        Self {
            measurements,
            cursor: 0,
            looping: false,
            pace: None,
            scanning: false,
            connected: true,
        }
    }

    /// Load a CSV recording.
    pub fn from_recording<P: AsRef<Path>>(path: P) -> std::result::Result<Self, LoaderError> {
        Ok(Self::new(load_recording(path)?))
    }

    /// Restart from the first measurement instead of ending.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sleep this long before returning each measurement.
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    /// Measurements returned so far in the current pass.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }
}

impl RangefinderDevice for ReplayDevice {
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
        if self.cursor >= self.measurements.len() {
            if self.looping && !self.measurements.is_empty() {
                self.cursor = 0;
            } else {
                return Err(DeviceError::StreamEnded {
                    samples: self.cursor,
                });
            }
        }

        if let Some(pace) = self.pace {
            thread::sleep(pace);
        }

        let measurement = self.measurements[self.cursor];
        self.cursor += 1;
        Ok(measurement)
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

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Vec<Measurement> {
        vec![Measurement::new(10.0, 100.0), Measurement::new(20.0, 200.0)]
    }

    #[test]
    fn test_requires_start() {
        let mut device = ReplayDevice::new(script());
        assert!(matches!(device.next_measurement(), Err(DeviceError::Protocol(_))));

        device.start().unwrap();
        assert_eq!(device.next_measurement().unwrap().angle_deg, 10.0);
    }

    #[test]
    fn test_end_of_recording_is_fault() {
        let mut device = ReplayDevice::new(script());
        device.start().unwrap();
        device.next_measurement().unwrap();
        device.next_measurement().unwrap();

        assert!(matches!(
            device.next_measurement(),
            Err(DeviceError::StreamEnded { samples: 2 })
        ));
    }

    #[test]
    fn test_looping_replay() {
        let mut device = ReplayDevice::new(script()).looping(true);
        device.start().unwrap();
        let angles: Vec<f64> = device
            .measurements()
            .take(5)
            .map(|m| m.unwrap().angle_deg)
            .collect();
        assert_eq!(angles, vec![10.0, 20.0, 10.0, 20.0, 10.0]);
    }

    #[test]
    fn test_disconnect() {
        let mut device = ReplayDevice::new(script());
        device.start().unwrap();
        device.stop().unwrap();
        device.stop_motor().unwrap();
        device.disconnect().unwrap();

        assert!(!device.is_connected());
        assert!(!device.is_scanning());
        assert!(matches!(device.next_measurement(), Err(DeviceError::Disconnected)));
        assert!(matches!(device.start(), Err(DeviceError::Disconnected)));
    }
}
