//! Rangefinder device boundary and scoped device sessions.
//!
//! The detector never talks to hardware directly. It pulls measurements from a
//! [`RangefinderDevice`] that it owns for the duration of one call, wrapped in a
//! [`DeviceSession`] so the stop / stop-motor / disconnect sequence runs exactly
//! once on every exit path.

use log::{debug, warn};
use thiserror::Error;

use super::types::Measurement;

/// Errors raised by a rangefinder or its measurement stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Measurement stream ended after {samples} samples")]
    StreamEnded { samples: usize },

    #[error("Device protocol error: {0}")]
    Protocol(String),
}

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// A rotating rangefinder producing an unbounded stream of measurements.
///
/// Angles are not guaranteed to be monotonic within a rotation.
pub trait RangefinderDevice {
    /// Spin up the motor and begin scanning.
    fn start(&mut self) -> Result<()>;

    /// Block until the next measurement arrives or the device faults.
    fn next_measurement(&mut self) -> Result<Measurement>;

    /// Stop scanning.
    fn stop(&mut self) -> Result<()>;

    /// Stop the motor.
    fn stop_motor(&mut self) -> Result<()>;

    /// Release the underlying connection.
    fn disconnect(&mut self) -> Result<()>;

    /// Pull-based view of the measurement stream.
    fn measurements(&mut self) -> Measurements<'_, Self>
    where
        Self: Sized,
    {
        Measurements { device: self }
    }
}

impl<D: RangefinderDevice + ?Sized> RangefinderDevice for Box<D> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn next_measurement(&mut self) -> Result<Measurement> {
        (**self).next_measurement()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn stop_motor(&mut self) -> Result<()> {
        (**self).stop_motor()
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }
}

/// Infinite iterator over a device's measurements.
///
/// Every pull blocks on the device; the iterator itself never ends; a fault
/// is yielded as an `Err` item.
pub struct Measurements<'a, D: RangefinderDevice> {
    device: &'a mut D,
}

impl<D: RangefinderDevice> Iterator for Measurements<'_, D> {
    type Item = Result<Measurement>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.device.next_measurement())
    }
}

/// Exclusive ownership of a started device with guaranteed release.
pub struct DeviceSession<D: RangefinderDevice> {
    device: D,
    released: bool,
}

impl<D: RangefinderDevice> DeviceSession<D> {
    /// Take ownership of `device` and start it.
    ///
    /// If starting fails the session is dropped, which still runs cleanup.
    pub fn open(device: D) -> Result<Self> {
        let mut session = Self {
            device,
            released: false,
        };
        session.device.start()?;
        Ok(session)
    }

    /// The owned device.
    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    /// Whether cleanup has already run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop scanning, stop the motor and disconnect.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned. Calling this again is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!("Releasing rangefinder");

        let steps: [(&str, Result<()>); 3] = [
            ("stop", self.device.stop()),
            ("stop motor", self.device.stop_motor()),
            ("disconnect", self.device.disconnect()),
        ];

        let mut first_error = None;
        for (step, result) in steps {
            if let Err(e) = result {
                warn!("Rangefinder {} failed: {}", step, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<D: RangefinderDevice> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        // Errors were already logged by release().
        let _ = self.release();
    }
}
