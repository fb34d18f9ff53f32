//! Dual-buffer media lane.
//!
//! Each lane owns two media elements. The active element decodes the
//! segment under the playhead; the standby element is loaded ahead of the
//! next source change so the boundary can be crossed by swapping roles
//! instead of loading from scratch.
//!
//! A swap reveals the incoming element before hiding the outgoing one. When
//! the incoming element has no current frame yet, the outgoing element stays
//! visible on its last frame (hold frame) until the incoming one catches up.
//! Once the swap completes the outgoing source is unloaded, unless it is
//! also the next source inside the lookahead.

use splice_common::clock::DriftMeasurement;
use splice_common::error::SpliceError;
use splice_project_model::track::{FrameIndex, TrackId};

use crate::media::{MediaElement, MediaElementFactory, MediaResolver, ReadyState};
use crate::timeline::{LaneId, TimelineSegment, VirtualTimeline};

/// Per-tick playback parameters shared by every lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneParams {
    pub fps: f64,
    pub playback_rate: f64,
    pub lookahead_frames: u64,
    pub drift_tolerance_ms: f64,
    /// Whether the clock is advancing; elements play only while it is.
    pub playing: bool,
}

/// Readiness snapshot used by stall detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub active_ready_state: ReadyState,
    pub standby_ready_state: ReadyState,
    /// A segment is under the playhead on this lane.
    pub in_use: bool,
    /// The active source failed to resolve or decode.
    pub failed: bool,
}

impl BufferStatus {
    pub fn is_stalled(&self) -> bool {
        self.in_use && !self.failed && !self.active_ready_state.can_render()
    }
}

/// What the lane is showing right now.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedFrame {
    pub track_id: TrackId,
    pub source_key: String,
    /// Source time of the shown frame, in seconds.
    pub media_time: f64,
    pub ready_state: ReadyState,
    /// The outgoing element is holding its last frame across a swap.
    pub held: bool,
}

/// Notable lane transitions, reported back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LaneEvent {
    /// Standby started loading the next source.
    Preloading {
        lane: LaneId,
        track_id: TrackId,
        source_key: String,
        frames_until_start: u64,
    },
    /// Roles exchanged at a segment boundary.
    Swapped {
        lane: LaneId,
        track_id: TrackId,
        /// The outgoing frame is held until the incoming element is ready.
        held: bool,
    },
    /// Source loaded into the active element at the boundary (no standby).
    LoadedOnDemand {
        lane: LaneId,
        track_id: TrackId,
        source_key: String,
    },
    LoadFailed {
        lane: LaneId,
        source_key: String,
        message: String,
    },
}

struct Slot {
    element: Box<dyn MediaElement>,
    source_key: Option<String>,
    failed: bool,
}

impl Slot {
    fn new(element: Box<dyn MediaElement>) -> Self {
        Self {
            element,
            source_key: None,
            failed: false,
        }
    }

    fn has_source(&self, key: &str) -> bool {
        self.source_key.as_deref() == Some(key)
    }

    /// Loaded (or loading) `key` without error.
    fn holds(&self, key: &str) -> bool {
        !self.failed && self.has_source(key)
    }

    /// Pause and drop the decoded source.
    fn unload(&mut self) {
        self.element.pause();
        self.element.clear_source();
        self.source_key = None;
        self.failed = false;
    }

    fn teardown(&mut self) {
        self.unload();
        self.element.detach_listeners();
        self.element.set_visible(false);
    }
}

/// Active + standby media elements for one lane.
pub struct DualBufferVideoElement {
    lane: LaneId,
    active: Slot,
    standby: Slot,
    is_swapping: bool,
    current_track: Option<TrackId>,
    muted: bool,
    swaps: u64,
    released: bool,
}

impl DualBufferVideoElement {
    /// Create the lane's two elements. The active one is shown and carries
    /// the listeners; the standby one is hidden and muted.
    pub fn attach_to_row(lane: LaneId, factory: &mut dyn MediaElementFactory) -> Self {
        let mut active = Slot::new(factory.create(&lane));
        let mut standby = Slot::new(factory.create(&lane));

        active.element.set_visible(true);
        active.element.attach_listeners(&lane);
        standby.element.set_visible(false);
        standby.element.set_muted(true);

        tracing::info!(%lane, "Mounted lane buffer");
        Self {
            lane,
            active,
            standby,
            is_swapping: false,
            current_track: None,
            muted: false,
            swaps: 0,
            released: false,
        }
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    /// Track whose segment is under the playhead.
    pub fn current_track(&self) -> Option<&str> {
        self.current_track.as_deref()
    }

    pub fn active_source(&self) -> Option<&str> {
        self.active.source_key.as_deref()
    }

    pub fn standby_source(&self) -> Option<&str> {
        self.standby.source_key.as_deref()
    }

    /// Holding the outgoing frame across a swap.
    pub fn is_swapping(&self) -> bool {
        self.is_swapping
    }

    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Source the active element failed to resolve or decode.
    pub fn failed_source(&self) -> Option<&str> {
        if self.active.failed {
            self.active.source_key.as_deref()
        } else {
            None
        }
    }

    /// Reconcile the lane to `frame` during normal playback.
    pub fn on_frame_advance(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        resolver: &dyn MediaResolver,
        params: &LaneParams,
    ) -> Vec<LaneEvent> {
        self.step(frame, timeline, resolver, params, false)
    }

    /// Jump to `frame` after a seek: load or seek the active element
    /// immediately, dropping any held frame.
    pub fn resync(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        resolver: &dyn MediaResolver,
        params: &LaneParams,
    ) -> Vec<LaneEvent> {
        if self.is_swapping {
            self.end_hold();
        }
        self.step(frame, timeline, resolver, params, true)
    }

    /// Exchange active and standby. Returns false when the outgoing frame
    /// is being held because the incoming element is not ready.
    pub fn swap(&mut self) -> bool {
        std::mem::swap(&mut self.active, &mut self.standby);

        self.standby.element.detach_listeners();
        self.active.element.attach_listeners(&self.lane);
        self.standby.element.pause();
        self.standby.element.set_muted(true);
        self.active.element.set_muted(self.muted);

        if self.active.element.ready_state().can_render() {
            self.active.element.set_visible(true);
            self.standby.element.set_visible(false);
            self.is_swapping = false;
        } else {
            self.is_swapping = true;
        }
        self.swaps += 1;
        !self.is_swapping
    }

    pub fn get_buffer_status(&self) -> BufferStatus {
        BufferStatus {
            active_ready_state: self.active.element.ready_state(),
            standby_ready_state: self.standby.element.ready_state(),
            in_use: self.current_track.is_some(),
            failed: self.active.failed || self.active.element.error().is_some(),
        }
    }

    /// The frame currently on screen for this lane, if any.
    pub fn displayed_frame(&self) -> Option<DisplayedFrame> {
        let track_id = self.current_track.clone()?;
        let slot = if self.is_swapping {
            &self.standby
        } else {
            &self.active
        };
        if slot.failed {
            return None;
        }
        Some(DisplayedFrame {
            track_id,
            source_key: slot.source_key.clone()?,
            media_time: slot.element.current_time(),
            ready_state: slot.element.ready_state(),
            held: self.is_swapping,
        })
    }

    /// Mute or unmute the lane's audible element. Standby is always muted.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.active.element.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Pause, clear sources, and detach listeners on both elements.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.active.teardown();
        self.standby.teardown();
        self.is_swapping = false;
        self.current_track = None;
        self.released = true;
        tracing::info!(lane = %self.lane, swaps = self.swaps, "Released lane buffer");
    }

    fn step(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        resolver: &dyn MediaResolver,
        params: &LaneParams,
        force_seek: bool,
    ) -> Vec<LaneEvent> {
        let mut events = Vec::new();
        if self.released {
            return events;
        }

        self.collect_errors(&mut events);
        if self.is_swapping
            && (self.active.failed || self.active.element.ready_state().can_render())
        {
            self.end_hold();
        }

        match timeline.segment_at(&self.lane, frame) {
            Some(segment) => {
                self.current_track = Some(segment.track_id.clone());
                let mut seek = force_seek;
                let key = segment.source_key.as_str();

                if !self.active.has_source(key) || (self.active.failed && force_seek) {
                    if self.standby.holds(key) {
                        let shown = self.swap();
                        tracing::debug!(lane = %self.lane, track = %segment.track_id, held = !shown, "Swapped to standby");
                        events.push(LaneEvent::Swapped {
                            lane: self.lane,
                            track_id: segment.track_id.clone(),
                            held: !shown,
                        });
                    } else {
                        if self.standby.has_source(key) {
                            tracing::warn!(lane = %self.lane, source = key, "Standby unavailable; loading at the boundary");
                        }
                        self.load_active(segment, resolver, &mut events);
                        seek = true;
                    }
                }
                self.reconcile(segment, frame, params, seek);
            }
            None => {
                self.current_track = None;
                if !self.active.element.is_paused() {
                    self.active.element.pause();
                }
            }
        }

        self.retire_standby(frame, timeline, params);
        self.preload(frame, timeline, resolver, params, &mut events);
        events
    }

    /// Unload whatever the standby kept after a finished swap, unless it
    /// already holds the next source within the lookahead.
    fn retire_standby(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        params: &LaneParams,
    ) {
        if self.is_swapping || self.standby.source_key.is_none() {
            return;
        }
        let keep = timeline.next_segment(&self.lane, frame).is_some_and(|next| {
            next.frames.start - frame <= params.lookahead_frames
                && self.standby.has_source(&next.source_key)
        });
        if !keep {
            tracing::debug!(lane = %self.lane, source = ?self.standby.source_key, "Unloading outgoing standby");
            self.standby.unload();
        }
    }

    fn collect_errors(&mut self, events: &mut Vec<LaneEvent>) {
        let lane = self.lane;
        for (role, slot) in [("active", &mut self.active), ("standby", &mut self.standby)] {
            if slot.failed {
                continue;
            }
            let (Some(message), Some(key)) = (slot.element.error(), slot.source_key.clone()) else {
                continue;
            };
            let error = SpliceError::media_load(&key, message);
            tracing::warn!(%lane, role, %error, "Media element failed");
            slot.failed = true;
            events.push(LaneEvent::LoadFailed {
                lane,
                source_key: key,
                message: error.to_string(),
            });
        }
    }

    fn end_hold(&mut self) {
        self.active.element.set_visible(true);
        self.standby.element.set_visible(false);
        self.is_swapping = false;
        tracing::debug!(lane = %self.lane, "Hold frame released");
    }

    fn load_active(
        &mut self,
        segment: &TimelineSegment,
        resolver: &dyn MediaResolver,
        events: &mut Vec<LaneEvent>,
    ) {
        let key = segment.source_key.clone();
        if self.is_swapping {
            self.end_hold();
        }
        match resolver.resolve(&key) {
            Ok(uri) => {
                self.active.element.load(&uri);
                self.active.element.set_visible(true);
                self.active.element.set_muted(self.muted);
                self.active.source_key = Some(key.clone());
                self.active.failed = false;
                tracing::debug!(lane = %self.lane, track = %segment.track_id, %uri, "Loading on demand");
                events.push(LaneEvent::LoadedOnDemand {
                    lane: self.lane,
                    track_id: segment.track_id.clone(),
                    source_key: key,
                });
            }
            Err(e) => {
                tracing::warn!(lane = %self.lane, track = %segment.track_id, error = %e, "Media resolution failed");
                self.active.element.pause();
                self.active.element.clear_source();
                self.active.source_key = Some(key.clone());
                self.active.failed = true;
                events.push(LaneEvent::LoadFailed {
                    lane: self.lane,
                    source_key: key,
                    message: e.to_string(),
                });
            }
        }
    }

    fn reconcile(
        &mut self,
        segment: &TimelineSegment,
        frame: FrameIndex,
        params: &LaneParams,
        force_seek: bool,
    ) {
        if self.active.failed {
            return;
        }
        let element = &mut self.active.element;
        element.set_playback_rate(params.playback_rate);

        let target = segment.source_time_at(frame, params.fps);
        let drift = DriftMeasurement {
            reference_secs: target,
            measured_secs: element.current_time(),
        };
        if force_seek
            || (element.ready_state() >= ReadyState::HaveMetadata
                && drift.exceeds_threshold_ms(params.drift_tolerance_ms))
        {
            tracing::trace!(lane = %self.lane, target, drift_ms = drift.drift_ms(), "Seeking active element");
            element.seek(target);
        }

        if params.playing && element.is_paused() {
            element.play();
        } else if !params.playing && !element.is_paused() {
            element.pause();
        }
    }

    fn preload(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        resolver: &dyn MediaResolver,
        params: &LaneParams,
        events: &mut Vec<LaneEvent>,
    ) {
        let Some(next) = timeline.next_segment(&self.lane, frame) else {
            return;
        };
        let frames_until_start = next.frames.start - frame;
        let key = next.source_key.as_str();
        if frames_until_start > params.lookahead_frames
            || self.active.holds(key)
            || self.standby.has_source(key)
            || self.is_swapping
        {
            return;
        }

        match resolver.resolve(key) {
            Ok(uri) => {
                let standby = &mut self.standby;
                standby.element.load(&uri);
                standby.element.seek(next.source_start_time);
                standby.element.pause();
                standby.element.set_visible(false);
                standby.element.set_muted(true);
                standby.source_key = Some(key.to_string());
                standby.failed = false;
                tracing::debug!(
                    lane = %self.lane,
                    track = %next.track_id,
                    %uri,
                    frames_until_start,
                    source_change = next.requires_source_change,
                    "Preloading standby"
                );
                events.push(LaneEvent::Preloading {
                    lane: self.lane,
                    track_id: next.track_id.clone(),
                    source_key: key.to_string(),
                    frames_until_start,
                });
            }
            Err(e) => {
                tracing::warn!(lane = %self.lane, track = %next.track_id, error = %e, "Standby preload failed");
                self.standby.source_key = Some(key.to_string());
                self.standby.failed = true;
                events.push(LaneEvent::LoadFailed {
                    lane: self.lane,
                    source_key: key.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
}

impl Drop for DualBufferVideoElement {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DualBufferVideoElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualBufferVideoElement")
            .field("lane", &self.lane)
            .field("active_source", &self.active.source_key)
            .field("standby_source", &self.standby.source_key)
            .field("is_swapping", &self.is_swapping)
            .field("current_track", &self.current_track)
            .finish()
    }
}
