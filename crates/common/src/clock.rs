//! Tick scheduling and timing utilities.
//!
//! The engine never reads a wall clock itself. A host loop (display refresh
//! callback, tokio interval, or a test) measures elapsed time and injects it
//! as `tick(delta_ms)`. This module provides:
//! - An explicit start/stop tick scheduler
//! - Fixed-interval timers driven by injected time
//! - Drift measurement between a reference clock and a media element
//! - Frame/second conversions

/// Gate between a host loop and the engine.
///
/// Ticks are forwarded only while started. Negative or non-finite deltas are
/// dropped so a misbehaving host clock cannot move playback backwards.
#[derive(Debug, Default, Clone)]
pub struct TickScheduler {
    running: bool,
    ticks: u64,
    total_ms: f64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin forwarding ticks.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop forwarding ticks.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Accept a host tick. Returns the delta to forward, if any.
    pub fn tick(&mut self, delta_ms: f64) -> Option<f64> {
        if !self.running || !delta_ms.is_finite() || delta_ms < 0.0 {
            return None;
        }
        self.ticks += 1;
        self.total_ms += delta_ms;
        Some(delta_ms)
    }

    /// Number of ticks forwarded since creation.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Total forwarded time in milliseconds.
    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }
}

/// Fixed-interval timer fed by injected elapsed time.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval_ms: f64,
    accumulated_ms: f64,
    fired_once: bool,
}

impl IntervalTimer {
    /// Create a timer firing every `interval_ms`.
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms: interval_ms.max(f64::EPSILON),
            accumulated_ms: 0.0,
            fired_once: false,
        }
    }

    /// Feed elapsed time. Returns true when the interval has elapsed.
    /// The first call always fires so state is evaluated immediately.
    /// Several elapsed intervals in one call collapse into a single firing.
    pub fn should_fire(&mut self, elapsed_ms: f64) -> bool {
        if !self.fired_once {
            self.fired_once = true;
            self.accumulated_ms = 0.0;
            return true;
        }
        self.accumulated_ms += elapsed_ms.max(0.0);
        if self.accumulated_ms >= self.interval_ms {
            self.accumulated_ms %= self.interval_ms;
            true
        } else {
            false
        }
    }

    /// Restart the timer so the next call fires immediately.
    pub fn reset(&mut self) {
        self.accumulated_ms = 0.0;
        self.fired_once = false;
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }
}

/// Drift between the shared timeline clock and a media element.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Where the timeline says the element should be (seconds).
    pub reference_secs: f64,
    /// Where the element reports it is (seconds).
    pub measured_secs: f64,
}

impl DriftMeasurement {
    /// Drift in seconds (positive = measured is ahead).
    pub fn drift_secs(&self) -> f64 {
        self.measured_secs - self.reference_secs
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_secs() * 1000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}

/// Convert a frame count to seconds.
pub fn frames_to_secs(frames: f64, fps: f64) -> f64 {
    frames / fps
}
