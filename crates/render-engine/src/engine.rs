//! Timeline engine: the one object a host drives.
//!
//! Each `tick(delta_ms)` runs, in order:
//! 1. clock advance, then lane reconcile to the new frame
//! 2. stall poll (pauses/resumes the clock on transitions)
//! 3. compositor render
//!
//! Observers are notified synchronously from inside the engine's own calls.

use splice_common::clock::TickScheduler;
use splice_common::config::EngineConfig;
use splice_common::error::{SpliceError, SpliceResult};
use splice_playback::{
    lookahead_frames, CompositingClock, HoldReason, LaneEvent, LaneId, LaneParams, LayerStatus,
    MediaElementFactory, MediaResolver, StallMonitor, StallTransition, VirtualTimeline,
};
use splice_project_model::event::{GestureInput, Modifiers};
use splice_project_model::geometry::{Point2D, Size2D};
use splice_project_model::project::{CanvasConfig, ProjectDocument};
use splice_project_model::track::{FrameIndex, Track, TrackId};
use splice_project_model::transform::{Transform, TransformPatch};
use splice_transform::{GestureContext, GestureKind, GestureMachine, GestureUpdate, ScreenMapping};

use crate::compositor::{FrameRender, OverlayCompositor};

/// Average glyph advance and line height relative to the font size, used to
/// size text boxes that carry no explicit width.
const GLYPH_ADVANCE: f64 = 0.6;
const LINE_HEIGHT: f64 = 1.2;
const SUBTITLE_BOX_HEIGHT: f64 = 64.0;

/// Notifications delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    FrameAdvanced {
        frame: FrameIndex,
    },
    Stalled {
        layers: Vec<LaneId>,
    },
    Recovered,
    Seeked {
        frame: FrameIndex,
    },
    PlaybackStarted,
    PlaybackStopped,
    EndReached {
        frame: FrameIndex,
    },
    Lane(LaneEvent),
    /// A persisted transform changed. Undo systems record `previous` unless
    /// `skip_record` is set.
    TransformChanged {
        track_id: TrackId,
        previous: Transform,
        current: Transform,
        skip_record: bool,
    },
    GestureStarted {
        track_id: TrackId,
        kind: GestureKind,
    },
    GestureCancelled {
        track_id: TrackId,
    },
    TracksChanged {
        count: usize,
    },
}

/// Receives engine events.
pub trait EngineObserver {
    fn on_event(&mut self, event: &EngineEvent);
}

impl<F: FnMut(&EngineEvent)> EngineObserver for F {
    fn on_event(&mut self, event: &EngineEvent) {
        self(event)
    }
}

struct ActiveGesture {
    track_id: TrackId,
    machine: GestureMachine,
}

pub struct TimelineEngine {
    config: EngineConfig,
    canvas: CanvasConfig,
    tracks: Vec<Track>,
    timeline: VirtualTimeline,
    clock: CompositingClock,
    scheduler: TickScheduler,
    stall: StallMonitor,
    compositor: OverlayCompositor,
    gesture: Option<ActiveGesture>,
    observers: Vec<Box<dyn EngineObserver>>,
    last_render: Option<FrameRender>,
}

impl TimelineEngine {
    /// Build an engine over `tracks`. Legacy transforms are migrated once.
    pub fn new(
        config: EngineConfig,
        mut canvas: CanvasConfig,
        tracks: Vec<Track>,
        factory: Box<dyn MediaElementFactory>,
        resolver: Box<dyn MediaResolver>,
    ) -> SpliceResult<Self> {
        config.validate()?;
        if !(canvas.fps.is_finite() && canvas.fps > 0.0) {
            tracing::warn!(
                fps = canvas.fps,
                fallback = config.playback.fps,
                "Project has no usable frame rate; using the configured default"
            );
            canvas.fps = config.playback.fps;
        }
        let mut clock = CompositingClock::new(canvas.fps)?;
        clock.set_playback_rate(config.playback.playback_rate)?;

        let compositor = OverlayCompositor::new(
            factory,
            resolver,
            config.compositing.background_refresh_divisor,
        );
        let stall = StallMonitor::new(config.playback.stall_poll_interval_ms);

        let mut engine = Self {
            config,
            canvas,
            tracks: Vec::new(),
            timeline: VirtualTimeline::default(),
            clock,
            scheduler: TickScheduler::new(),
            stall,
            compositor,
            gesture: None,
            observers: Vec::new(),
            last_render: None,
        };
        engine.install_tracks(tracks);
        tracing::info!(
            tracks = engine.tracks.len(),
            fps = canvas.fps,
            width = canvas.width,
            height = canvas.height,
            "Timeline engine created"
        );
        Ok(engine)
    }

    pub fn from_project(
        config: EngineConfig,
        project: &ProjectDocument,
        factory: Box<dyn MediaElementFactory>,
        resolver: Box<dyn MediaResolver>,
    ) -> SpliceResult<Self> {
        Self::new(
            config,
            project.canvas,
            project.tracks.clone(),
            factory,
            resolver,
        )
    }

    pub fn add_observer(&mut self, observer: impl EngineObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Start accepting ticks.
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Stop ticking and release every lane.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.cancel_gesture();
        self.compositor.release_all();
        tracing::info!("Timeline engine shut down");
    }

    pub fn play(&mut self) {
        if !self.clock.is_playing() {
            self.clock.play();
            self.emit(EngineEvent::PlaybackStarted);
        }
    }

    pub fn stop(&mut self) {
        if self.clock.is_playing() {
            self.clock.stop();
            self.emit(EngineEvent::PlaybackStopped);
        }
    }

    /// Jump to `frame` and resynchronize every mounted element immediately.
    pub fn seek(&mut self, frame: FrameIndex) {
        self.clock.set_frame(frame);
        let frame = self.clock.current_frame();
        let params = self.lane_params();
        let events = self.compositor.resync(frame, &self.timeline, &params);
        self.emit_lane_events(events);
        self.emit(EngineEvent::Seeked { frame });
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> SpliceResult<()> {
        self.clock.set_playback_rate(rate)
    }

    /// Drive one display refresh. Returns `None` while the scheduler is
    /// stopped.
    pub fn tick(&mut self, delta_ms: f64) -> Option<&FrameRender> {
        let delta_ms = self.scheduler.tick(delta_ms)?;

        let previous = self.clock.current_frame();
        let was_playing = self.clock.is_playing();
        let frame = self.clock.advance(delta_ms);
        let params = self.lane_params();
        let lane_events = self.compositor.reconcile(frame, &self.timeline, &params);
        self.emit_lane_events(lane_events);
        if frame != previous {
            self.emit(EngineEvent::FrameAdvanced { frame });
        }
        if was_playing && !self.clock.is_playing() {
            self.emit(EngineEvent::EndReached { frame });
        }

        let statuses = self.compositor.layer_statuses();
        match self.stall.poll(delta_ms, &statuses) {
            Some(StallTransition::Stalled { layers }) => {
                self.clock.pause(HoldReason::Stall);
                self.emit(EngineEvent::Stalled { layers });
            }
            Some(StallTransition::Recovered) => {
                self.clock.resume(HoldReason::Stall);
                self.emit(EngineEvent::Recovered);
            }
            None => {}
        }

        tracing::trace!(frame, delta_ms, "Tick");
        Some(self.render(frame))
    }

    /// Re-render the current frame without advancing.
    pub fn render_current(&mut self) -> &FrameRender {
        self.render(self.clock.current_frame())
    }

    fn render(&mut self, frame: FrameIndex) -> &FrameRender {
        let transient = self
            .gesture
            .as_ref()
            .and_then(|g| g.machine.transient().map(|t| (g.track_id.as_str(), t)));
        let render = self
            .compositor
            .render_frame(frame, &self.timeline, &self.tracks, transient);
        self.last_render.insert(render)
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn current_frame(&self) -> FrameIndex {
        self.clock.current_frame()
    }

    pub fn clock(&self) -> &CompositingClock {
        &self.clock
    }

    pub fn timeline(&self) -> &VirtualTimeline {
        &self.timeline
    }

    pub fn compositor(&self) -> &OverlayCompositor {
        &self.compositor
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_stalled(&self) -> bool {
        self.stall.is_stalled()
    }

    pub fn stall_count(&self) -> u64 {
        self.stall.stall_count()
    }

    pub fn layer_statuses(&self) -> Vec<LayerStatus> {
        self.compositor.layer_statuses()
    }

    pub fn last_render(&self) -> Option<&FrameRender> {
        self.last_render.as_ref()
    }

    // ── Tracks ──────────────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == track_id)
    }

    /// Replace the track list. Invalid tracks are kept but logged; the
    /// timeline skips ranges it cannot play.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        if let Some(g) = &self.gesture {
            if !tracks.iter().any(|t| t.id() == g.track_id) {
                self.cancel_gesture();
            }
        }
        self.install_tracks(tracks);
        self.emit(EngineEvent::TracksChanged {
            count: self.tracks.len(),
        });
    }

    /// Add one track. Duplicate ids and invalid tracks are rejected.
    pub fn add_track(&mut self, track: Track) -> SpliceResult<()> {
        if self.track(track.id()).is_some() {
            return Err(SpliceError::invalid_track(track.id(), "duplicate track id"));
        }
        track
            .validate()
            .map_err(|e| SpliceError::invalid_track(track.id(), e))?;
        let mut tracks = self.tracks.clone();
        tracks.push(track);
        self.set_tracks(tracks);
        Ok(())
    }

    pub fn remove_track(&mut self, track_id: &str) -> SpliceResult<Track> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id() == track_id)
            .ok_or_else(|| SpliceError::track_not_found(track_id))?;
        let mut tracks = self.tracks.clone();
        let removed = tracks.remove(index);
        self.set_tracks(tracks);
        Ok(removed)
    }

    fn install_tracks(&mut self, mut tracks: Vec<Track>) {
        let video = self.canvas.video_size();
        let fallback = Size2D::new(
            self.config.migration.fallback_width as f64,
            self.config.migration.fallback_height as f64,
        );
        for track in &mut tracks {
            if let Err(e) = track.validate() {
                tracing::warn!(track = track.id(), error = %e, "Invalid track");
            }
            if let Some(transform) = track.transform_mut() {
                transform.migrate_legacy(video, fallback);
            }
        }

        self.timeline = VirtualTimeline::build(&tracks);
        let end = tracks.iter().map(|t| t.base().end_frame).max();
        self.clock.set_end_frame(end);
        self.tracks = tracks;
    }

    // ── Transforms ──────────────────────────────────────────────

    /// Merge `patch` into a track's persisted transform.
    pub fn update_transform(
        &mut self,
        track_id: &str,
        patch: &TransformPatch,
    ) -> SpliceResult<Transform> {
        self.apply_transform(track_id, patch, false)
    }

    /// Like [`update_transform`](Self::update_transform); `skip_record`
    /// marks the change as one an undo system should not record.
    pub fn apply_transform(
        &mut self,
        track_id: &str,
        patch: &TransformPatch,
        skip_record: bool,
    ) -> SpliceResult<Transform> {
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.id() == track_id)
            .ok_or_else(|| SpliceError::track_not_found(track_id))?;
        if track.base().locked {
            return Err(SpliceError::track_locked(track_id));
        }
        let transform = track
            .transform_mut()
            .ok_or_else(|| SpliceError::invalid_track(track_id, "track has no transform"))?;

        let previous = *transform;
        let current = previous.merged(patch);
        current.validate().map_err(SpliceError::transform)?;
        *transform = current;

        self.emit(EngineEvent::TransformChanged {
            track_id: track_id.to_string(),
            previous,
            current,
            skip_record,
        });
        Ok(current)
    }

    // ── Gestures ────────────────────────────────────────────────

    /// Gesture context for `track_id` on a preview surface of `surface`
    /// pixels with the frame centered in it.
    pub fn gesture_context(
        &self,
        track_id: &str,
        render_scale: f64,
        surface: Size2D,
    ) -> SpliceResult<GestureContext> {
        let track = self
            .track(track_id)
            .ok_or_else(|| SpliceError::track_not_found(track_id))?;
        let video = self.canvas.video_size();
        let mapping = ScreenMapping::centered_in(video, surface);
        Ok(
            GestureContext::new(mapping, render_scale, intrinsic_size(track, video))
                .with_config(&self.config.snapping),
        )
    }

    /// Track with a gesture in flight.
    pub fn gesture_track(&self) -> Option<&str> {
        self.gesture
            .as_ref()
            .filter(|g| g.machine.is_in_flight())
            .map(|g| g.track_id.as_str())
    }

    pub fn begin_gesture(
        &mut self,
        track_id: &str,
        kind: GestureKind,
        at: Point2D,
    ) -> SpliceResult<()> {
        if let Some(other) = self.gesture_track() {
            return Err(SpliceError::transform(format!(
                "gesture already in progress on '{other}'"
            )));
        }
        let track = self
            .track(track_id)
            .ok_or_else(|| SpliceError::track_not_found(track_id))?;
        if track.base().locked {
            return Err(SpliceError::track_locked(track_id));
        }
        let initial = *track
            .transform()
            .ok_or_else(|| SpliceError::invalid_track(track_id, "track has no transform"))?;

        let mut machine = GestureMachine::new(kind);
        machine.pointer_down(initial, at)?;
        self.gesture = Some(ActiveGesture {
            track_id: track_id.to_string(),
            machine,
        });
        Ok(())
    }

    /// Pointer moved. Activation holds the clock until the gesture ends.
    pub fn gesture_move(
        &mut self,
        at: Point2D,
        modifiers: Modifiers,
        ctx: &GestureContext,
    ) -> SpliceResult<GestureUpdate> {
        let gesture = self
            .gesture
            .as_mut()
            .ok_or_else(|| SpliceError::transform("no gesture in progress"))?;
        let update = gesture.machine.pointer_move(at, modifiers, ctx);
        if let GestureUpdate::Activated(_) = update {
            let event = EngineEvent::GestureStarted {
                track_id: gesture.track_id.clone(),
                kind: gesture.machine.kind(),
            };
            self.clock.pause(HoldReason::Drag);
            self.emit(event);
        }
        Ok(update)
    }

    /// Pointer released. An active gesture commits its transform.
    pub fn end_gesture(
        &mut self,
        at: Point2D,
        modifiers: Modifiers,
        ctx: &GestureContext,
    ) -> SpliceResult<GestureUpdate> {
        let mut gesture = self
            .gesture
            .take()
            .ok_or_else(|| SpliceError::transform("no gesture in progress"))?;
        let update = gesture.machine.pointer_up(at, modifiers, ctx);
        if let GestureUpdate::Committed(transform) = update {
            let patch = TransformPatch::from_transform(&transform);
            let committed = self.apply_transform(&gesture.track_id, &patch, false);
            self.clock.resume(HoldReason::Drag);
            committed?;
        }
        Ok(update)
    }

    /// Escape. Reverts to the pre-gesture transform; nothing is written.
    pub fn cancel_gesture(&mut self) -> GestureUpdate {
        let Some(mut gesture) = self.gesture.take() else {
            return GestureUpdate::None;
        };
        let update = gesture.machine.cancel();
        if let GestureUpdate::Cancelled(_) = update {
            self.clock.resume(HoldReason::Drag);
            self.emit(EngineEvent::GestureCancelled {
                track_id: gesture.track_id,
            });
        }
        update
    }

    /// Feed one scripted or host input for a gesture of `kind` on `track_id`.
    pub fn handle_gesture_input(
        &mut self,
        track_id: &str,
        kind: GestureKind,
        input: &GestureInput,
        ctx: &GestureContext,
    ) -> SpliceResult<GestureUpdate> {
        if !matches!(input, GestureInput::PointerDown { .. }) {
            if let Some(other) = self.gesture.as_ref().map(|g| g.track_id.as_str()) {
                if other != track_id {
                    return Err(SpliceError::transform(format!(
                        "gesture in progress belongs to '{other}'"
                    )));
                }
            }
        }
        match input {
            GestureInput::PointerDown { x, y, .. } => {
                self.begin_gesture(track_id, kind, Point2D::new(*x, *y))?;
                Ok(GestureUpdate::None)
            }
            GestureInput::PointerMove { x, y, modifiers } => {
                self.gesture_move(Point2D::new(*x, *y), *modifiers, ctx)
            }
            GestureInput::PointerUp { x, y, modifiers } => {
                self.end_gesture(Point2D::new(*x, *y), *modifiers, ctx)
            }
            GestureInput::Escape => Ok(self.cancel_gesture()),
        }
    }

    // ── Internals ───────────────────────────────────────────────

    fn lane_params(&self) -> LaneParams {
        let fps = self.clock.fps();
        let rate = self.clock.playback_rate();
        LaneParams {
            fps,
            playback_rate: rate,
            lookahead_frames: lookahead_frames(self.config.playback.lookahead_ms, fps, rate),
            drift_tolerance_ms: self.config.playback.drift_tolerance_ms,
            playing: self.clock.is_advancing(),
        }
    }

    fn emit_lane_events(&mut self, events: Vec<LaneEvent>) {
        for event in events {
            self.emit(EngineEvent::Lane(event));
        }
    }

    fn emit(&mut self, event: EngineEvent) {
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }
}

impl std::fmt::Debug for TimelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEngine")
            .field("tracks", &self.tracks.len())
            .field("frame", &self.clock.current_frame())
            .field("playing", &self.clock.is_playing())
            .field("holds", &self.clock.holds())
            .field("lanes", &self.compositor.mounted_lanes())
            .finish()
    }
}

/// Unscaled box size of an overlay that carries no explicit size.
pub fn intrinsic_size(track: &Track, video: Size2D) -> Size2D {
    match track {
        Track::Text(text) => {
            let chars = text
                .content
                .lines()
                .map(|l| l.chars().count())
                .max()
                .unwrap_or(0)
                .max(1) as f64;
            let lines = text.content.lines().count().max(1) as f64;
            Size2D::new(
                chars * text.font_size * GLYPH_ADVANCE,
                lines * text.font_size * LINE_HEIGHT,
            )
        }
        Track::Subtitle(_) => Size2D::new(video.width * 0.8, SUBTITLE_BOX_HEIGHT),
        _ => video,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_playback::sim::SimMediaBackend;
    use splice_project_model::transform::CoordinateSpace;
    use std::cell::RefCell;
    use std::rc::Rc;

    const CANVAS: CanvasConfig = CanvasConfig {
        width: 1920,
        height: 1080,
        fps: 30.0,
    };

    fn engine(tracks: Vec<Track>) -> (TimelineEngine, SimMediaBackend) {
        let backend = SimMediaBackend::new();
        let engine = TimelineEngine::new(
            EngineConfig::default(),
            CANVAS,
            tracks,
            Box::new(backend.clone()),
            Box::new(backend.resolver()),
        )
        .unwrap();
        (engine, backend)
    }

    fn record(engine: &mut TimelineEngine) -> Rc<RefCell<Vec<EngineEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        engine.add_observer(move |e: &EngineEvent| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn test_invalid_canvas_fps_uses_configured_default() {
        let backend = SimMediaBackend::new();
        let mut config = EngineConfig::default();
        config.playback.fps = 25.0;
        let canvas = CanvasConfig { fps: 0.0, ..CANVAS };
        let engine = TimelineEngine::new(
            config,
            canvas,
            vec![Track::video("v", 0, 0, 90, "A")],
            Box::new(backend.clone()),
            Box::new(backend.resolver()),
        )
        .unwrap();
        assert_eq!(engine.clock().fps(), 25.0);
        assert_eq!(engine.canvas().fps, 25.0);
    }

    #[test]
    fn test_render_before_first_tick_shows_loading_layers() {
        let (mut engine, _) = engine(vec![
            Track::video("v", 0, 0, 90, "A"),
            Track::text("title", 1, 0, 90, "Hello"),
        ]);
        let render = engine.render_current();
        assert_eq!(render.instructions.len(), 2);
        let top = render.topmost_video().unwrap();
        assert_eq!(top.track_id, "v");
        assert!(matches!(
            top.content,
            crate::compositor::RenderContent::Video { frame: None, .. }
        ));
    }

    #[test]
    fn test_tick_requires_start() {
        let (mut engine, _) = engine(vec![Track::video("v", 0, 0, 90, "A")]);
        assert!(engine.tick(16.0).is_none());
        engine.start();
        assert!(engine.tick(16.0).is_some());
    }

    #[test]
    fn test_playback_advances_and_ends() {
        let (mut engine, backend) = engine(vec![Track::video("v", 0, 0, 30, "A")]);
        let events = record(&mut engine);
        engine.start();
        engine.play();
        for _ in 0..100 {
            backend.advance(20.0);
            engine.tick(20.0);
        }
        assert_eq!(engine.current_frame(), 29);
        assert!(!engine.clock().is_playing());
        assert!(events
            .borrow()
            .iter()
            .any(|e| matches!(e, EngineEvent::EndReached { frame: 29 })));
    }

    #[test]
    fn test_update_transform_errors() {
        let mut locked = Track::text("locked", 1, 0, 90, "hi");
        locked.base_mut().locked = true;
        let (mut engine, _) = engine(vec![Track::audio("a", 0, 0, 90, "A"), locked]);
        let patch = TransformPatch {
            x: Some(0.5),
            ..Default::default()
        };

        assert!(matches!(
            engine.update_transform("missing", &patch),
            Err(SpliceError::TrackNotFound { .. })
        ));
        assert!(matches!(
            engine.update_transform("locked", &patch),
            Err(SpliceError::TrackLocked { .. })
        ));
        assert!(matches!(
            engine.update_transform("a", &patch),
            Err(SpliceError::InvalidTrack { .. })
        ));
    }

    #[test]
    fn test_update_transform_notifies() {
        let (mut engine, _) = engine(vec![Track::text("t", 1, 0, 90, "hi")]);
        let events = record(&mut engine);
        let patch = TransformPatch {
            x: Some(0.25),
            rotation: Some(10.0),
            ..Default::default()
        };
        let current = engine.update_transform("t", &patch).unwrap();
        assert_eq!(current.x, 0.25);
        assert_eq!(current.rotation, 10.0);
        assert_eq!(engine.track("t").unwrap().transform(), Some(&current));

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            EngineEvent::TransformChanged { track_id, previous, skip_record: false, .. }
                if track_id == "t" && previous.x == 0.0
        ));
    }

    #[test]
    fn test_invalid_transform_rejected_without_write() {
        let (mut engine, _) = engine(vec![Track::image("i", 1, 0, 90, "logo.png")]);
        let before = *engine.track("i").unwrap().transform().unwrap();
        let patch = TransformPatch {
            scale: Some(0.0),
            ..Default::default()
        };
        assert!(engine.update_transform("i", &patch).is_err());
        assert_eq!(engine.track("i").unwrap().transform(), Some(&before));
    }

    #[test]
    fn test_legacy_transforms_migrated_on_load() {
        let mut text = Track::text("t", 1, 0, 90, "hi");
        *text.transform_mut().unwrap() = Transform {
            coordinate_space: CoordinateSpace::LegacyPixels,
            ..Transform::at(480.0, 270.0)
        };
        let (engine, _) = engine(vec![text]);
        let t = engine.track("t").unwrap().transform().unwrap();
        assert!((t.x - 0.5).abs() < 1e-9);
        assert!((t.y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_drag_holds_clock_and_commits() {
        let text = Track::text("t", 1, 0, 300, "title");
        let (mut engine, _) = engine(vec![Track::video("v", 0, 0, 300, "A"), text]);
        let events = record(&mut engine);
        let surface = Size2D::new(960.0, 540.0);
        let ctx = engine.gesture_context("t", 0.5, surface).unwrap();
        engine.start();
        engine.play();

        engine
            .begin_gesture("t", GestureKind::Drag, Point2D::new(480.0, 270.0))
            .unwrap();
        // Pending does not hold the clock.
        engine.tick(100.0);
        assert_eq!(engine.current_frame(), 3);

        let update = engine
            .gesture_move(Point2D::new(580.0, 270.0), Modifiers::NONE, &ctx)
            .unwrap();
        assert!(matches!(update, GestureUpdate::Activated(_)));
        assert!(engine.clock().is_held(HoldReason::Drag));

        // Live value overrides the persisted one; the clock is frozen.
        let render = engine.tick(100.0).unwrap();
        let live = render.instruction("t").unwrap().transform.unwrap();
        assert!((live.x - 200.0 / 960.0).abs() < 1e-9);
        assert_eq!(engine.current_frame(), 3);
        assert_eq!(engine.track("t").unwrap().transform().unwrap().x, 0.0);

        engine
            .end_gesture(Point2D::new(580.0, 270.0), Modifiers::NONE, &ctx)
            .unwrap();
        assert!(!engine.clock().is_held(HoldReason::Drag));
        let committed = engine.track("t").unwrap().transform().unwrap();
        assert!((committed.x - 200.0 / 960.0).abs() < 1e-9);

        let events = events.borrow();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::GestureStarted { kind: GestureKind::Drag, .. })));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, EngineEvent::TransformChanged { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_escape_reverts_without_write() {
        let text = Track::text("t", 1, 0, 300, "title");
        let (mut engine, _) = engine(vec![text]);
        let events = record(&mut engine);
        let ctx = engine
            .gesture_context("t", 1.0, Size2D::new(1920.0, 1080.0))
            .unwrap();

        let script = [
            GestureInput::down(Point2D::new(960.0, 540.0), Modifiers::NONE),
            GestureInput::moved(Point2D::new(1100.0, 600.0), Modifiers::NONE),
            GestureInput::Escape,
        ];
        for input in &script {
            engine
                .handle_gesture_input("t", GestureKind::Drag, input, &ctx)
                .unwrap();
        }

        assert_eq!(engine.track("t").unwrap().transform().unwrap().x, 0.0);
        assert!(engine.clock().holds().is_empty());
        assert!(engine.gesture_track().is_none());
        assert!(!events
            .borrow()
            .iter()
            .any(|e| matches!(e, EngineEvent::TransformChanged { .. })));
    }

    #[test]
    fn test_gesture_rejected_on_locked_and_non_overlay() {
        let mut locked = Track::image("i", 1, 0, 90, "logo.png");
        locked.base_mut().locked = true;
        let (mut engine, _) = engine(vec![locked, Track::audio("a", 0, 0, 90, "A")]);
        assert!(engine
            .begin_gesture("i", GestureKind::Drag, Point2D::ORIGIN)
            .is_err());
        assert!(engine
            .begin_gesture("a", GestureKind::Rotate, Point2D::ORIGIN)
            .is_err());
        assert!(engine.gesture_track().is_none());
    }

    #[test]
    fn test_remove_track_unmounts_lane() {
        let (mut engine, backend) = engine(vec![
            Track::video("v0", 0, 0, 90, "A"),
            Track::video("v1", 1, 0, 90, "B"),
        ]);
        engine.start();
        engine.tick(16.0);
        assert_eq!(engine.compositor().mounted_lanes().len(), 2);

        engine.remove_track("v1").unwrap();
        engine.tick(16.0);
        assert_eq!(engine.compositor().mounted_lanes().len(), 1);
        assert_eq!(backend.live_elements().len(), 2);
        assert!(engine.remove_track("v1").is_err());
    }

    #[test]
    fn test_add_track_rejects_duplicates() {
        let (mut engine, _) = engine(vec![Track::video("v", 0, 0, 90, "A")]);
        assert!(engine.add_track(Track::video("v", 1, 0, 90, "B")).is_err());
        assert!(engine.add_track(Track::video("w", 1, 50, 10, "B")).is_err());
        engine.add_track(Track::video("w", 1, 0, 90, "B")).unwrap();
        assert_eq!(engine.tracks().len(), 2);
        assert_eq!(engine.clock().end_frame(), Some(90));
    }

    #[test]
    fn test_intrinsic_text_size() {
        let text = Track::text("t", 0, 0, 10, "abcd\nab");
        let size = intrinsic_size(&text, Size2D::new(1920.0, 1080.0));
        assert!((size.width - 4.0 * 48.0 * 0.6).abs() < 1e-9);
        assert!((size.height - 2.0 * 48.0 * 1.2).abs() < 1e-9);
    }
}
