//! Detection loop controller.
//!
//! One call owns a rangefinder from start to release and runs an explicit
//! state machine:
//!
//! ```text
//! Scanning --boundary--> Analyzing --match--> MatchFound        (terminal)
//!    ^                       |------attempts exhausted--> Exhausted (terminal)
//!    |                       v
//!    +---------------- ContinueNextSweep
//! ```
//!
//! A cancellation request is honoured before every pull and ends the call with
//! [`DetectionOutcome::Cancelled`]. Device faults end the call with an error.
//! Every exit path releases the device exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{DetectionConfig, DeviceConfig};
use crate::core::device::{DeviceError, DeviceSession, RangefinderDevice};
use crate::core::types::Detection;
use crate::processors::analysis::find_detection;
use crate::processors::filtering::{FOV_END_DEG, FOV_START_DEG};
use crate::processors::ingest::{NearZeroBoundary, ScanIngestor, SweepBoundary};

/// Errors that end a detection call.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Rangefinder fault: {0}")]
    Device(#[from] DeviceError),
}

/// Result type for detection calls.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Shared flag used to stop a running detection from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for signal handlers.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// How a detection call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// A small, near object was found.
    Detected { detection: Detection, attempts: u32 },
    /// Every allowed sweep was analysed without a match.
    Exhausted { attempts: u32 },
    /// The cancel token was set.
    Cancelled { attempts: u32 },
}

impl DetectionOutcome {
    pub fn detection(&self) -> Option<&Detection> {
        match self {
            DetectionOutcome::Detected { detection, .. } => Some(detection),
            _ => None,
        }
    }

    pub fn into_detection(self) -> Option<Detection> {
        match self {
            DetectionOutcome::Detected { detection, .. } => Some(detection),
            _ => None,
        }
    }

    /// Number of sweeps analysed.
    pub fn attempts(&self) -> u32 {
        match self {
            DetectionOutcome::Detected { attempts, .. }
            | DetectionOutcome::Exhausted { attempts }
            | DetectionOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

#[derive(Debug)]
enum LoopState {
    Scanning,
    Analyzing,
    ContinueNextSweep,
    MatchFound(Detection),
    Exhausted,
    Cancelled,
}

/// Reusable detection loop configuration.
#[derive(Debug, Clone)]
pub struct Detector<B: SweepBoundary + Clone = NearZeroBoundary> {
    config: DetectionConfig,
    settle_delay: Duration,
    boundary: B,
    cancel: Option<CancelToken>,
}

impl Detector<NearZeroBoundary> {
    /// Detector with the default device settle delay and the near-zero boundary.
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            settle_delay: DeviceConfig::default().settle_delay(),
            boundary: NearZeroBoundary::default(),
            cancel: None,
        }
    }
}

impl<B: SweepBoundary + Clone> Detector<B> {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Swap the sweep boundary strategy.
    pub fn with_boundary<B2: SweepBoundary + Clone>(self, boundary: B2) -> Detector<B2> {
        Detector {
            config: self.config,
            settle_delay: self.settle_delay,
            boundary,
            cancel: self.cancel,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Run one detection call against `device`, which is released on return.
    ///
    /// A cleanup failure after a normal exit is returned as an error. After a
    /// stream fault the fault is returned and cleanup failures are only logged.
    pub fn run<D: RangefinderDevice>(&self, device: D) -> Result<DetectionOutcome> {
        let mut session = DeviceSession::open(device)?;
        thread::sleep(self.settle_delay);

        info!(
            "Scanning for objects in the {} deg to {} deg field of view (max {} attempts)",
            FOV_START_DEG, FOV_END_DEG, self.config.max_attempts
        );

        let mut ingestor = ScanIngestor::with_boundary(self.config.max_distance, self.boundary.clone());
        let mut attempt: u32 = 0;
        let mut state = LoopState::Scanning;

        let outcome = loop {
            state = match state {
                LoopState::Scanning => {
                    if self.cancelled() {
                        LoopState::Cancelled
                    } else {
                        match session.device().next_measurement() {
                            Ok(measurement) => {
                                if ingestor.ingest(&measurement) {
                                    LoopState::Analyzing
                                } else {
                                    LoopState::Scanning
                                }
                            }
                            Err(fault) => {
                                warn!("Rangefinder stream fault: {}", fault);
                                let _ = session.release();
                                return Err(fault.into());
                            }
                        }
                    }
                }
                LoopState::Analyzing => {
                    attempt += 1;
                    debug!(
                        "Sweep {} complete: {} samples ({} dropped)",
                        attempt,
                        ingestor.sweep().len(),
                        ingestor.dropped()
                    );
                    match find_detection(ingestor.sweep(), &self.config) {
                        Some(detection) => LoopState::MatchFound(detection),
                        None if attempt >= self.config.max_attempts => LoopState::Exhausted,
                        None => LoopState::ContinueNextSweep,
                    }
                }
                LoopState::ContinueNextSweep => {
                    ingestor.clear();
                    LoopState::Scanning
                }
                LoopState::MatchFound(detection) => {
                    break DetectionOutcome::Detected {
                        detection,
                        attempts: attempt,
                    };
                }
                LoopState::Exhausted => {
                    info!("Max attempts reached. No valid object detected.");
                    break DetectionOutcome::Exhausted { attempts: attempt };
                }
                LoopState::Cancelled => {
                    info!("Detection cancelled after {} sweeps", attempt);
                    break DetectionOutcome::Cancelled { attempts: attempt };
                }
            };
        };

        session.release()?;
        Ok(outcome)
    }
}

/// Run one detection call with the default settle delay.
///
/// Returns `None` when every attempt was used without a match. Use
/// [`detect_with_device_config`] to honour a configured settle delay.
pub fn detect_object_of_interest<D: RangefinderDevice>(
    device: D,
    config: &DetectionConfig,
) -> Result<Option<Detection>> {
    detect_with_device_config(device, config, &DeviceConfig::default())
}

/// Run one detection call, waiting `device_config.settle_delay_ms` after start.
pub fn detect_with_device_config<D: RangefinderDevice>(
    device: D,
    config: &DetectionConfig,
    device_config: &DeviceConfig,
) -> Result<Option<Detection>> {
    let outcome = Detector::new(config.clone())
        .with_settle_delay(device_config.settle_delay())
        .run(device)?;
    Ok(outcome.into_detection())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::Result as DeviceResult;
    use crate::core::types::{Measurement, SizeClass};
    use crate::processors::ingest::StartFlagBoundary;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type CallLog = Rc<RefCell<Vec<&'static str>>>;

    /// Plays a fixed script, then faults.
    struct ScriptedDevice {
        script: VecDeque<Measurement>,
        calls: CallLog,
        on_pull: Option<Box<dyn FnMut(usize)>>,
        pulls: usize,
    }

    impl ScriptedDevice {
        fn new(script: Vec<Measurement>, calls: CallLog) -> Self {
            Self {
                script: script.into(),
                calls,
                on_pull: None,
                pulls: 0,
            }
        }
    }

    impl RangefinderDevice for ScriptedDevice {
        fn start(&mut self) -> DeviceResult<()> {
            self.calls.borrow_mut().push("start");
            Ok(())
        }

        fn next_measurement(&mut self) -> DeviceResult<Measurement> {
            self.pulls += 1;
            if let Some(hook) = self.on_pull.as_mut() {
                hook(self.pulls);
            }
            self.script.pop_front().ok_or(DeviceError::StreamEnded {
                samples: self.pulls - 1,
            })
        }

        fn stop(&mut self) -> DeviceResult<()> {
            self.calls.borrow_mut().push("stop");
            Ok(())
        }

        fn stop_motor(&mut self) -> DeviceResult<()> {
            self.calls.borrow_mut().push("stop_motor");
            Ok(())
        }

        fn disconnect(&mut self) -> DeviceResult<()> {
            self.calls.borrow_mut().push("disconnect");
            Ok(())
        }
    }

    /// One rotation at 1 deg steps from 1 to 359 then 0, with an optional
    /// object covering [start, end] at `distance`.
    fn rotation(object: Option<(f64, f64, f64)>) -> Vec<Measurement> {
        let mut rotation: Vec<Measurement> = (1..360)
            .map(|deg| {
                let angle = deg as f64;
                let distance = match object {
                    Some((start, end, d)) if angle >= start && angle <= end => d,
                    _ => 0.0,
                };
                Measurement::new(angle, distance)
            })
            .collect();
        rotation.push(Measurement::new(0.0, 0.0));
        rotation
    }

    fn detector(config: DetectionConfig) -> Detector {
        Detector::new(config).with_settle_delay(Duration::ZERO)
    }

    fn cleanup_count(calls: &CallLog) -> usize {
        calls.borrow().iter().filter(|c| **c == "disconnect").count()
    }

    #[test]
    fn test_detects_small_near_object() {
        let calls = CallLog::default();
        let device = ScriptedDevice::new(rotation(Some((266.0, 274.0, 400.0))), calls.clone());

        let outcome = detector(DetectionConfig::default()).run(device).unwrap();
        let detection = outcome.detection().unwrap();
        assert_eq!(detection.size_class, SizeClass::Small);
        assert_eq!(detection.distance_mm, 400);
        assert_eq!(detection.angle_center_deg, 270.0);
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(
            *calls.borrow(),
            vec!["start", "stop", "stop_motor", "disconnect"]
        );
    }

    #[test]
    fn test_match_on_later_sweep() {
        let calls = CallLog::default();
        let mut script = rotation(None);
        script.extend(rotation(Some((266.0, 274.0, 400.0))));
        let device = ScriptedDevice::new(script, calls.clone());

        let outcome = detector(DetectionConfig::default()).run(device).unwrap();
        assert_eq!(outcome.attempts(), 2);
        assert!(outcome.detection().is_some());
    }

    #[test]
    fn test_exhausts_after_max_attempts() {
        let calls = CallLog::default();
        let mut script = Vec::new();
        for _ in 0..5 {
            // Too far to qualify
            script.extend(rotation(Some((266.0, 274.0, 1500.0))));
        }
        let device = ScriptedDevice::new(script, calls.clone());

        let outcome = detector(DetectionConfig::default()).run(device).unwrap();
        assert_eq!(outcome, DetectionOutcome::Exhausted { attempts: 4 });
        assert_eq!(cleanup_count(&calls), 1);
    }

    #[test]
    fn test_buffer_cleared_between_sweeps() {
        // Two halves of an object in different sweeps never combine.
        let calls = CallLog::default();
        let mut script = rotation(Some((266.0, 269.0, 400.0)));
        script.extend(rotation(Some((270.0, 274.0, 1500.0))));
        let config = DetectionConfig {
            max_attempts: 2,
            min_physical_width_mm: 25.0,
            ..DetectionConfig::default()
        };
        let device = ScriptedDevice::new(script, calls);

        let outcome = detector(config).run(device).unwrap();
        assert_eq!(outcome, DetectionOutcome::Exhausted { attempts: 2 });
    }

    #[test]
    fn test_fault_propagates_after_cleanup() {
        let calls = CallLog::default();
        let script = rotation(None).into_iter().take(100).collect();
        let device = ScriptedDevice::new(script, calls.clone());

        let result = detector(DetectionConfig::default()).run(device);
        assert!(matches!(
            result,
            Err(DetectorError::Device(DeviceError::StreamEnded { samples: 100 }))
        ));
        assert_eq!(
            *calls.borrow(),
            vec!["start", "stop", "stop_motor", "disconnect"]
        );
    }

    #[test]
    fn test_cancel_stops_scanning() {
        let calls = CallLog::default();
        let token = CancelToken::new();
        let mut script = Vec::new();
        for _ in 0..4 {
            script.extend(rotation(None));
        }
        let mut device = ScriptedDevice::new(script, calls.clone());
        let trigger = token.clone();
        device.on_pull = Some(Box::new(move |pulls| {
            if pulls == 500 {
                trigger.cancel();
            }
        }));

        let outcome = detector(DetectionConfig::default())
            .with_cancel_token(token)
            .run(device)
            .unwrap();
        assert_eq!(outcome, DetectionOutcome::Cancelled { attempts: 1 });
        assert_eq!(cleanup_count(&calls), 1);
    }

    #[test]
    fn test_near_zero_jitter_counts_as_sweeps() {
        let calls = CallLog::default();
        let script = vec![
            Measurement::new(0.5, 300.0),
            Measurement::new(0.7, 300.0),
            Measurement::new(359.9, 300.0),
            Measurement::new(0.2, 300.0),
        ];
        let config = DetectionConfig {
            max_attempts: 3,
            ..DetectionConfig::default()
        };
        let device = ScriptedDevice::new(script, calls);

        let outcome = detector(config).run(device).unwrap();
        assert_eq!(outcome, DetectionOutcome::Exhausted { attempts: 3 });
    }

    #[test]
    fn test_start_flag_boundary() {
        let calls = CallLog::default();
        let mut script: Vec<Measurement> = (266..=274)
            .map(|deg| Measurement::new(deg as f64, 400.0))
            .collect();
        // 0.5 deg would end a sweep under the default boundary
        script.insert(0, Measurement::new(0.5, 400.0));
        script.push(Measurement {
            new_scan: true,
            ..Measurement::new(10.0, 400.0)
        });
        let device = ScriptedDevice::new(script, calls);

        let outcome = detector(DetectionConfig::default())
            .with_boundary(StartFlagBoundary)
            .run(device)
            .unwrap();
        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.detection().is_some());
    }

    #[test]
    fn test_settle_delay_from_device_config() {
        assert_eq!(
            Detector::new(DetectionConfig::default()).settle_delay(),
            Duration::from_secs(1)
        );

        let calls = CallLog::default();
        let device = ScriptedDevice::new(rotation(Some((266.0, 274.0, 400.0))), calls.clone());
        let device_config = DeviceConfig {
            settle_delay_ms: 0,
            ..DeviceConfig::default()
        };

        let detection =
            detect_with_device_config(device, &DetectionConfig::default(), &device_config).unwrap();
        assert_eq!(detection.unwrap().distance_mm, 400);
        assert_eq!(cleanup_count(&calls), 1);
    }

    #[test]
    fn test_detect_object_of_interest_none_on_exhaustion() {
        let calls = CallLog::default();
        let config = DetectionConfig {
            max_attempts: 1,
            ..DetectionConfig::default()
        };
        let device = ScriptedDevice::new(vec![Measurement::new(0.0, 100.0)], calls);

        let result = detect_object_of_interest(device, &config).unwrap();
        assert!(result.is_none());
    }
}
