//! Compositing clock.
//!
//! Target frame = anchor frame + elapsed wall time × fps × playback rate,
//! floored. Elapsed time accumulates from the anchor so rounding never
//! drifts. Holds (stall, overlay drag) freeze the clock independently of
//! user play/stop; the clock advances only while playing with no holds.

use splice_common::clock::frames_to_secs;
use splice_common::error::{SpliceError, SpliceResult};
use splice_project_model::track::FrameIndex;

/// Why the clock is frozen while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HoldReason {
    /// A layer is below HAVE_CURRENT_DATA.
    Stall,
    /// An overlay gesture is active.
    Drag,
}

#[derive(Debug, Clone)]
pub struct CompositingClock {
    fps: f64,
    playback_rate: f64,
    anchor_frame: FrameIndex,
    elapsed_ms: f64,
    current_frame: FrameIndex,
    playing: bool,
    holds: Vec<HoldReason>,
    end_frame: Option<FrameIndex>,
}

impl CompositingClock {
    pub fn new(fps: f64) -> SpliceResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SpliceError::playback(format!("fps must be > 0, got {fps}")));
        }
        Ok(Self {
            fps,
            playback_rate: 1.0,
            anchor_frame: 0,
            elapsed_ms: 0.0,
            current_frame: 0,
            playing: false,
            holds: Vec::new(),
            end_frame: None,
        })
    }

    /// Start playing from `at_frame`.
    pub fn start(&mut self, at_frame: FrameIndex) {
        self.reanchor(self.clamp(at_frame));
        self.playing = true;
        tracing::info!(frame = self.current_frame, "Clock started");
    }

    /// Advance by wall time. Returns the new current frame.
    pub fn advance(&mut self, wall_delta_ms: f64) -> FrameIndex {
        if !self.is_advancing() || !(wall_delta_ms.is_finite() && wall_delta_ms > 0.0) {
            return self.current_frame;
        }
        self.elapsed_ms += wall_delta_ms;
        let frames = (self.elapsed_ms / 1000.0 * self.fps * self.playback_rate).floor();
        let frame = self.anchor_frame.saturating_add(frames as u64);

        match self.end_frame {
            Some(end) if frame >= end => {
                self.current_frame = end.saturating_sub(1);
                self.playing = false;
                tracing::info!(frame = self.current_frame, "Reached end of timeline");
            }
            _ => self.current_frame = frame,
        }
        self.current_frame
    }

    /// Add a hold. Returns true if the hold was not already present.
    pub fn pause(&mut self, reason: HoldReason) -> bool {
        if self.holds.contains(&reason) {
            return false;
        }
        self.holds.push(reason);
        tracing::debug!(?reason, frame = self.current_frame, "Clock held");
        true
    }

    /// Remove a hold. Returns true if the hold was present.
    pub fn resume(&mut self, reason: HoldReason) -> bool {
        let before = self.holds.len();
        self.holds.retain(|r| *r != reason);
        let removed = self.holds.len() != before;
        if removed {
            tracing::debug!(?reason, frame = self.current_frame, "Clock hold released");
        }
        removed
    }

    /// User play from the current frame.
    pub fn play(&mut self) {
        if !self.playing {
            self.reanchor(self.current_frame);
            self.playing = true;
        }
    }

    /// User stop; holds are kept.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Seek. Bypasses interpolation and re-anchors.
    pub fn set_frame(&mut self, frame: FrameIndex) {
        self.reanchor(self.clamp(frame));
        tracing::info!(frame = self.current_frame, "Clock seek");
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> SpliceResult<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(SpliceError::playback(format!(
                "playback rate must be > 0, got {rate}"
            )));
        }
        self.reanchor(self.current_frame);
        self.playback_rate = rate;
        Ok(())
    }

    /// Stop at the end of the timeline (exclusive end frame).
    pub fn set_end_frame(&mut self, end_frame: Option<FrameIndex>) {
        self.end_frame = end_frame.filter(|e| *e > 0);
        let clamped = self.clamp(self.current_frame);
        if clamped != self.current_frame {
            self.reanchor(clamped);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_held(&self, reason: HoldReason) -> bool {
        self.holds.contains(&reason)
    }

    pub fn holds(&self) -> &[HoldReason] {
        &self.holds
    }

    /// Playing and not held.
    pub fn is_advancing(&self) -> bool {
        self.playing && self.holds.is_empty()
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.current_frame
    }

    pub fn current_time_secs(&self) -> f64 {
        frames_to_secs(self.current_frame as f64, self.fps)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    pub fn end_frame(&self) -> Option<FrameIndex> {
        self.end_frame
    }

    fn reanchor(&mut self, frame: FrameIndex) {
        self.anchor_frame = frame;
        self.elapsed_ms = 0.0;
        self.current_frame = frame;
    }

    fn clamp(&self, frame: FrameIndex) -> FrameIndex {
        match self.end_frame {
            Some(end) => frame.min(end.saturating_sub(1)),
            None => frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_fps() {
        assert!(CompositingClock::new(0.0).is_err());
        assert!(CompositingClock::new(f64::NAN).is_err());
    }

    #[test]
    fn test_advance_accumulates_without_drift() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        clock.start(0);
        // 50 Hz refresh for one second: exactly 30 frames.
        for _ in 0..50 {
            clock.advance(20.0);
        }
        assert_eq!(clock.current_frame(), 30);
    }

    #[test]
    fn test_does_not_advance_when_stopped() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        assert_eq!(clock.advance(1000.0), 0);
        clock.start(10);
        clock.stop();
        assert_eq!(clock.advance(1000.0), 10);
    }

    #[test]
    fn test_holds_are_independent() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        clock.start(0);
        assert!(clock.pause(HoldReason::Stall));
        assert!(!clock.pause(HoldReason::Stall));
        assert!(clock.pause(HoldReason::Drag));
        assert_eq!(clock.advance(1000.0), 0);

        assert!(clock.resume(HoldReason::Stall));
        assert_eq!(clock.advance(1000.0), 0);
        assert!(clock.resume(HoldReason::Drag));
        assert!(!clock.resume(HoldReason::Drag));
        assert_eq!(clock.advance(1000.0), 30);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_seek_reanchors() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        clock.start(0);
        clock.advance(500.0);
        clock.set_frame(300);
        assert_eq!(clock.current_frame(), 300);
        assert_eq!(clock.advance(100.0), 303);
    }

    #[test]
    fn test_playback_rate() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        clock.start(0);
        clock.advance(1000.0);
        clock.set_playback_rate(2.0).unwrap();
        assert_eq!(clock.advance(1000.0), 90);
        assert!(clock.set_playback_rate(0.0).is_err());
        assert!(clock.set_playback_rate(-1.0).is_err());
        assert_eq!(clock.playback_rate(), 2.0);
    }

    #[test]
    fn test_end_frame_stops_playback() {
        let mut clock = CompositingClock::new(30.0).unwrap();
        clock.set_end_frame(Some(60));
        clock.start(0);
        assert_eq!(clock.advance(5000.0), 59);
        assert!(!clock.is_playing());
        clock.set_frame(1000);
        assert_eq!(clock.current_frame(), 59);
    }
}
