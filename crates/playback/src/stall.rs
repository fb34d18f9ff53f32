//! Stall detection across every mounted lane.
//!
//! The monitor polls on a fixed interval of synthetic time and reports only
//! transitions: one `Stalled` when the first in-use lane drops below
//! HAVE_CURRENT_DATA, one `Recovered` when the last such lane catches up.
//! Failed lanes are ignored; they render placeholders instead of stalling.

use splice_common::clock::IntervalTimer;

use crate::dual_buffer::BufferStatus;
use crate::timeline::LaneId;

/// Readiness of one registered layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerStatus {
    pub lane: LaneId,
    pub status: BufferStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StallTransition {
    Stalled { layers: Vec<LaneId> },
    Recovered,
}

#[derive(Debug, Clone)]
pub struct StallMonitor {
    timer: IntervalTimer,
    stalled_layers: Vec<LaneId>,
    stall_count: u64,
}

impl StallMonitor {
    pub fn new(poll_interval_ms: f64) -> Self {
        Self {
            timer: IntervalTimer::new(poll_interval_ms),
            stalled_layers: Vec::new(),
            stall_count: 0,
        }
    }

    /// Feed elapsed time; evaluates the layers when the poll interval has
    /// passed.
    pub fn poll(&mut self, elapsed_ms: f64, layers: &[LayerStatus]) -> Option<StallTransition> {
        if !self.timer.should_fire(elapsed_ms) {
            return None;
        }
        self.check_now(layers)
    }

    /// Evaluate immediately, outside the poll interval.
    pub fn check_now(&mut self, layers: &[LayerStatus]) -> Option<StallTransition> {
        let stalled: Vec<LaneId> = layers
            .iter()
            .filter(|l| l.status.is_stalled())
            .map(|l| l.lane)
            .collect();

        let was_stalled = self.is_stalled();
        let now_stalled = !stalled.is_empty();
        if stalled != self.stalled_layers {
            tracing::trace!(?stalled, "Stalled layer set changed");
        }
        self.stalled_layers = stalled;

        match (was_stalled, now_stalled) {
            (false, true) => {
                self.stall_count += 1;
                tracing::info!(layers = ?self.stalled_layers, "Playback stalled");
                Some(StallTransition::Stalled {
                    layers: self.stalled_layers.clone(),
                })
            }
            (true, false) => {
                tracing::info!("Playback recovered");
                Some(StallTransition::Recovered)
            }
            _ => None,
        }
    }

    pub fn is_stalled(&self) -> bool {
        !self.stalled_layers.is_empty()
    }

    pub fn stalled_layers(&self) -> &[LaneId] {
        &self.stalled_layers
    }

    /// Number of stalls entered so far.
    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }

    /// Forget state; the next poll evaluates immediately.
    pub fn reset(&mut self) {
        self.timer.reset();
        self.stalled_layers.clear();
    }
}

impl Default for StallMonitor {
    fn default() -> Self {
        Self::new(100.0)
    }
}
