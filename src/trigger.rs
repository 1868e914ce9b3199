//! Outer polling loop.
//!
//! Repeats detection calls on a fixed interval and forwards detections to a
//! downstream [`TriggerSink`], suppressing triggers that arrive inside the
//! debounce window. Each cycle opens a fresh device so a fault in one call
//! never poisons the next.

use std::thread;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::TriggerConfig;
use crate::core::device::{DeviceError, RangefinderDevice};
use crate::core::types::Detection;
use crate::detector::{CancelToken, DetectionOutcome, Detector};
use crate::processors::ingest::SweepBoundary;

/// Slice used when sleeping so cancellation is noticed promptly.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Downstream action taken when a detection passes the debounce window.
pub trait TriggerSink {
    fn on_detection(&mut self, detection: &Detection) -> anyhow::Result<()>;
}

/// Sink that only logs the detection.
#[derive(Debug, Default)]
pub struct LogSink;

impl TriggerSink for LogSink {
    fn on_detection(&mut self, detection: &Detection) -> anyhow::Result<()> {
        info!("Trigger: {}", detection);
        Ok(())
    }
}

/// Tracks the last successful trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// True when at least `window` has passed since the last mark.
    pub fn is_ready_at(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.window,
            None => true,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Counters for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub cycles: u64,
    pub detections: u64,
    pub triggered: u64,
    pub debounced: u64,
    pub faults: u64,
    pub sink_failures: u64,
}

/// Run detection cycles until cancelled or `max_cycles` is reached.
///
/// `open_device` is called once per cycle. Device and detector faults are
/// logged and counted, and the loop carries on with the next cycle. Pass the
/// same token to the detector so a running call stops too.
pub fn run_trigger_loop<D, F, S, B>(
    mut open_device: F,
    detector: &Detector<B>,
    sink: &mut S,
    config: &TriggerConfig,
    cancel: &CancelToken,
    max_cycles: Option<u64>,
) -> TriggerStats
where
    D: RangefinderDevice,
    F: FnMut() -> Result<D, DeviceError>,
    S: TriggerSink + ?Sized,
    B: SweepBoundary + Clone,
{
    let mut stats = TriggerStats::default();
    let mut debouncer = Debouncer::new(Duration::from_secs(config.debounce_secs));
    let interval = Duration::from_secs(config.scan_interval_secs);

    while !cancel.is_cancelled() {
        if max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        stats.cycles += 1;
        info!("Scan cycle {}", stats.cycles);

        match open_device() {
            Ok(device) => match detector.run(device) {
                Ok(DetectionOutcome::Detected { detection, .. }) => {
                    stats.detections += 1;
                    let now = Instant::now();
                    if debouncer.is_ready_at(now) {
                        match sink.on_detection(&detection) {
                            Ok(()) => {
                                debouncer.mark(now);
                                stats.triggered += 1;
                            }
                            Err(e) => {
                                error!("Trigger sink failed: {:#}", e);
                                stats.sink_failures += 1;
                            }
                        }
                    } else {
                        info!("Debounce active, skipping trigger for {}", detection);
                        stats.debounced += 1;
                    }
                }
                Ok(DetectionOutcome::Exhausted { .. }) => {
                    info!("No valid small object detected");
                }
                Ok(DetectionOutcome::Cancelled { .. }) => break,
                Err(e) => {
                    error!("Detection cycle {} failed: {}", stats.cycles, e);
                    stats.faults += 1;
                }
            },
            Err(e) => {
                error!("Failed to open rangefinder: {}", e);
                stats.faults += 1;
            }
        }

        if max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        sleep_unless_cancelled(interval, cancel);
    }

    info!(
        "Trigger loop stopped after {} cycles ({} triggered, {} debounced, {} faults)",
        stats.cycles, stats.triggered, stats.debounced, stats.faults
    );
    stats
}

fn sleep_unless_cancelled(duration: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::devices::{SimulatedObject, SyntheticRangefinder};

    #[derive(Default)]
    struct RecordingSink {
        received: Vec<Detection>,
        fail_first: bool,
        cancel_on_detection: Option<CancelToken>,
    }

    impl TriggerSink for RecordingSink {
        fn on_detection(&mut self, detection: &Detection) -> anyhow::Result<()> {
            if let Some(token) = &self.cancel_on_detection {
                token.cancel();
            }
            if self.fail_first {
                self.fail_first = false;
                anyhow::bail!("actuator busy");
            }
            self.received.push(detection.clone());
            Ok(())
        }
    }

    fn near_object() -> Result<SyntheticRangefinder, DeviceError> {
        Ok(SyntheticRangefinder::new(1.0).with_object(SimulatedObject::new(266.0, 274.0, 400.0)))
    }

    fn trigger_config(debounce_secs: u64) -> TriggerConfig {
        TriggerConfig {
            scan_interval_secs: 0,
            debounce_secs,
            ..TriggerConfig::default()
        }
    }

    fn detector() -> Detector {
        Detector::new(DetectionConfig::default()).with_settle_delay(Duration::ZERO)
    }

    #[test]
    fn test_debouncer_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(10));
        assert!(debouncer.is_ready_at(start));

        debouncer.mark(start);
        assert!(!debouncer.is_ready_at(start + Duration::from_secs(9)));
        assert!(debouncer.is_ready_at(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_repeat_detections_are_debounced() {
        let mut sink = RecordingSink::default();
        let stats = run_trigger_loop(
            near_object,
            &detector(),
            &mut sink,
            &trigger_config(10),
            &CancelToken::new(),
            Some(3),
        );

        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.detections, 3);
        assert_eq!(stats.triggered, 1);
        assert_eq!(stats.debounced, 2);
        assert_eq!(sink.received.len(), 1);
        assert_eq!(sink.received[0].distance_mm, 400);
    }

    #[test]
    fn test_zero_debounce_triggers_every_detection() {
        let mut sink = RecordingSink::default();
        let stats = run_trigger_loop(
            near_object,
            &detector(),
            &mut sink,
            &trigger_config(0),
            &CancelToken::new(),
            Some(3),
        );
        assert_eq!(stats.triggered, 3);
        assert_eq!(stats.debounced, 0);
    }

    #[test]
    fn test_faults_do_not_stop_loop() {
        let mut opened = 0;
        let open = || {
            opened += 1;
            if opened % 2 == 1 {
                Err(DeviceError::Disconnected)
            } else {
                // Ends mid-rotation, so the call faults
                Ok(SyntheticRangefinder::new(1.0).with_max_rotations(0))
            }
        };

        let mut sink = RecordingSink::default();
        let stats = run_trigger_loop(
            open,
            &detector(),
            &mut sink,
            &trigger_config(0),
            &CancelToken::new(),
            Some(4),
        );
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.faults, 4);
        assert_eq!(stats.detections, 0);
    }

    #[test]
    fn test_failed_sink_does_not_start_debounce() {
        let mut sink = RecordingSink {
            fail_first: true,
            ..RecordingSink::default()
        };
        let stats = run_trigger_loop(
            near_object,
            &detector(),
            &mut sink,
            &trigger_config(10),
            &CancelToken::new(),
            Some(2),
        );
        assert_eq!(stats.sink_failures, 1);
        assert_eq!(stats.triggered, 1);
        assert_eq!(stats.debounced, 0);
    }

    #[test]
    fn test_cancel_stops_loop() {
        let token = CancelToken::new();
        let mut sink = RecordingSink {
            cancel_on_detection: Some(token.clone()),
            ..RecordingSink::default()
        };
        let stats = run_trigger_loop(
            near_object,
            &detector().with_cancel_token(token.clone()),
            &mut sink,
            &trigger_config(0),
            &token,
            None,
        );
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.triggered, 1);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancelToken::new();
        token.cancel();
        let mut sink = LogSink;
        let stats = run_trigger_loop(
            near_object,
            &detector(),
            &mut sink,
            &trigger_config(0),
            &token,
            None,
        );
        assert_eq!(stats, TriggerStats::default());
    }
}
