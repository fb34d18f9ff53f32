//! Overlay compositor: decides, per frame, what is drawn and in what order.
//!
//! The compositor owns the lane → dual-buffer map. Lanes are mounted the
//! first time a segment is active or upcoming within the lookahead, driven
//! every tick through [`OverlayCompositor::reconcile`], and released as soon
//! as nothing on the lane is active or upcoming. No other code path writes
//! the map.
//!
//! Ordering is by row, then type priority (audio < video < image < text <
//! subtitle), then track id, so the output is deterministic for equal
//! inputs.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use splice_playback::{
    DisplayedFrame, DualBufferVideoElement, LaneEvent, LaneId, LaneParams, LayerStatus,
    MediaElementFactory, MediaResolver, MediaUri, VirtualTimeline,
};
use splice_project_model::track::{FrameIndex, Track, TrackId, TrackKind};
use splice_project_model::transform::Transform;

/// Render priority of an active video layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoPriority {
    /// Highest-z video: full rate.
    Topmost,
    /// Other videos: refreshed only when `refresh` is set.
    Background { refresh: bool },
}

/// One subtitle cue inside a merged subtitle instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleCue {
    pub track_id: TrackId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderContent {
    Video {
        lane: LaneId,
        source_key: String,
        /// Frame on screen; `None` while the first frame is loading.
        frame: Option<DisplayedFrame>,
        priority: VideoPriority,
        audible: bool,
    },
    Audio {
        lane: LaneId,
        source_key: String,
        audible: bool,
    },
    Image {
        uri: MediaUri,
    },
    Text {
        content: String,
        font_size: f64,
    },
    /// Every active subtitle track, drawn under one shared transform.
    Subtitles {
        cues: Vec<SubtitleCue>,
    },
    /// Stand-in for a track whose source failed to resolve or decode.
    Placeholder {
        source_key: String,
        reason: String,
    },
}

/// One drawable (or audible) layer, in back-to-front order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderInstruction {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub row: usize,
    pub z_index: i64,
    /// Effective transform (a gesture's live value when one is active).
    pub transform: Option<Transform>,
    pub content: RenderContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOrigin {
    /// An audio track.
    Independent,
    /// Embedded audio of a linked video track.
    LinkedVideo,
}

/// The single audible source for a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioElection {
    pub track_id: TrackId,
    pub lane: LaneId,
    pub origin: AudioOrigin,
}

/// Compositor output for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRender {
    pub frame: FrameIndex,
    pub instructions: Vec<RenderInstruction>,
    pub audio: Option<AudioElection>,
}

impl FrameRender {
    /// The topmost video layer, if any video is active.
    pub fn topmost_video(&self) -> Option<&RenderInstruction> {
        self.instructions.iter().find(|i| {
            matches!(
                i.content,
                RenderContent::Video {
                    priority: VideoPriority::Topmost,
                    ..
                }
            )
        })
    }

    pub fn video_layers(&self) -> impl Iterator<Item = &RenderInstruction> {
        self.instructions
            .iter()
            .filter(|i| matches!(i.content, RenderContent::Video { .. }))
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &RenderInstruction> {
        self.instructions
            .iter()
            .filter(|i| matches!(i.content, RenderContent::Placeholder { .. }))
    }

    pub fn instruction(&self, track_id: &str) -> Option<&RenderInstruction> {
        self.instructions.iter().find(|i| i.track_id == track_id)
    }

    /// Frames held across a swap.
    pub fn held_layers(&self) -> usize {
        self.instructions
            .iter()
            .filter(|i| {
                matches!(
                    &i.content,
                    RenderContent::Video { frame: Some(f), .. } if f.held
                )
            })
            .count()
    }
}

/// Visible tracks covering `frame`, sorted back to front.
pub fn active_tracks(tracks: &[Track], frame: FrameIndex) -> Vec<&Track> {
    let mut active: Vec<&Track> = tracks.iter().filter(|t| t.is_active_at(frame)).collect();
    active.sort_by(|a, b| {
        a.z_index()
            .cmp(&b.z_index())
            .then_with(|| a.id().cmp(b.id()))
    });
    active
}

/// Pick the audible source: the first unmuted audio track in z order, else
/// the first unmuted video with linked audio. `usable` filters out tracks
/// whose media cannot play.
pub fn elect_audio(active: &[&Track], usable: impl Fn(&Track) -> bool) -> Option<AudioElection> {
    let pick = |origin: AudioOrigin| {
        active.iter().copied().find(|t| {
            let eligible = match (origin, t) {
                (AudioOrigin::Independent, Track::Audio(a)) => !a.base.muted,
                (AudioOrigin::LinkedVideo, Track::Video(v)) => v.linked_audio && !v.base.muted,
                _ => false,
            };
            eligible && usable(*t)
        })
    };

    let (track, origin) = pick(AudioOrigin::Independent)
        .map(|t| (t, AudioOrigin::Independent))
        .or_else(|| pick(AudioOrigin::LinkedVideo).map(|t| (t, AudioOrigin::LinkedVideo)))?;
    Some(AudioElection {
        track_id: track.id().to_string(),
        lane: LaneId::of(track),
        origin,
    })
}

/// Media tracks count only while they hold their lane at `frame`; a
/// same-lane overlap loser is dropped. Overlays have no lane.
pub fn owns_lane(timeline: &VirtualTimeline, track: &Track, frame: FrameIndex) -> bool {
    if !track.kind().is_media() {
        return true;
    }
    timeline
        .segment_at(&LaneId::of(track), frame)
        .is_some_and(|s| s.track_id == track.id())
}

/// A layer after subtitle merging.
#[derive(Debug)]
pub(crate) enum Layer<'a> {
    Track(&'a Track),
    /// Every active subtitle: drawn under `anchor`'s (the lowest-z
    /// subtitle's) transform, at the highest subtitle's slot and z.
    Subtitles {
        anchor: &'a Track,
        z_index: i64,
        cues: Vec<SubtitleCue>,
    },
}

/// Collapse the subtitles of a back-to-front track list into one layer.
pub(crate) fn compose_layers<'a>(active: &[&'a Track]) -> Vec<Layer<'a>> {
    let subtitles: Vec<&'a Track> = active
        .iter()
        .copied()
        .filter(|t| t.kind() == TrackKind::Subtitle)
        .collect();
    let (Some(&anchor), Some(&last)) = (subtitles.first(), subtitles.last()) else {
        return active.iter().copied().map(Layer::Track).collect();
    };
    let mut cues = Some(
        subtitles
            .iter()
            .filter_map(|t| match t {
                Track::Subtitle(sub) => Some(SubtitleCue {
                    track_id: sub.base.id.clone(),
                    text: sub.text.clone(),
                }),
                _ => None,
            })
            .collect::<Vec<_>>(),
    );

    active
        .iter()
        .copied()
        .filter_map(|t| {
            if t.kind() != TrackKind::Subtitle {
                Some(Layer::Track(t))
            } else if std::ptr::eq(t, last) {
                cues.take().map(|cues| Layer::Subtitles {
                    anchor,
                    z_index: last.z_index(),
                    cues,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Owns the lane buffers and turns a frame into render instructions.
pub struct OverlayCompositor {
    lanes: BTreeMap<LaneId, DualBufferVideoElement>,
    factory: Box<dyn MediaElementFactory>,
    resolver: Box<dyn MediaResolver>,
    background_refresh_divisor: u32,
    failed_tracks: HashMap<TrackId, String>,
}

impl OverlayCompositor {
    pub fn new(
        factory: Box<dyn MediaElementFactory>,
        resolver: Box<dyn MediaResolver>,
        background_refresh_divisor: u32,
    ) -> Self {
        Self {
            lanes: BTreeMap::new(),
            factory,
            resolver,
            background_refresh_divisor: background_refresh_divisor.max(1),
            failed_tracks: HashMap::new(),
        }
    }

    /// Mount, advance, and unmount lane buffers for `frame`.
    pub fn reconcile(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        params: &LaneParams,
    ) -> Vec<LaneEvent> {
        self.sync_lanes(frame, timeline, params, false)
    }

    /// Like [`reconcile`](Self::reconcile) but seeks every lane immediately.
    pub fn resync(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        params: &LaneParams,
    ) -> Vec<LaneEvent> {
        self.sync_lanes(frame, timeline, params, true)
    }

    fn sync_lanes(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        params: &LaneParams,
        seek: bool,
    ) -> Vec<LaneEvent> {
        let needed = timeline.needed_lanes(frame, params.lookahead_frames);

        let stale: Vec<LaneId> = self
            .lanes
            .keys()
            .filter(|lane| !needed.contains(lane))
            .copied()
            .collect();
        for lane in stale {
            if let Some(mut buffer) = self.lanes.remove(&lane) {
                buffer.release();
            }
        }

        let mut events = Vec::new();
        for lane in needed {
            let buffer = match self.lanes.entry(lane) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    e.insert(DualBufferVideoElement::attach_to_row(lane, self.factory.as_mut()))
                }
            };
            let lane_events = if seek {
                buffer.resync(frame, timeline, self.resolver.as_ref(), params)
            } else {
                buffer.on_frame_advance(frame, timeline, self.resolver.as_ref(), params)
            };
            events.extend(lane_events);
        }
        events
    }

    /// Readiness of every mounted lane, for stall detection.
    pub fn layer_statuses(&self) -> Vec<LayerStatus> {
        self.lanes
            .iter()
            .map(|(lane, buffer)| LayerStatus {
                lane: *lane,
                status: buffer.get_buffer_status(),
            })
            .collect()
    }

    pub fn mounted_lanes(&self) -> Vec<LaneId> {
        self.lanes.keys().copied().collect()
    }

    pub fn buffer(&self, lane: &LaneId) -> Option<&DualBufferVideoElement> {
        self.lanes.get(lane)
    }

    /// Release every lane.
    pub fn release_all(&mut self) {
        for (_, mut buffer) in std::mem::take(&mut self.lanes) {
            buffer.release();
        }
    }

    /// Build the ordered instruction list for `frame`. `transient` carries a
    /// gesture's live transform for one track.
    pub fn render_frame(
        &mut self,
        frame: FrameIndex,
        timeline: &VirtualTimeline,
        tracks: &[Track],
        transient: Option<(&str, &Transform)>,
    ) -> FrameRender {
        let active: Vec<&Track> = active_tracks(tracks, frame)
            .into_iter()
            .filter(|t| owns_lane(timeline, t, frame))
            .collect();

        let audio = elect_audio(&active, |t| self.media_playable(t));
        let audible_lane = audio.as_ref().map(|a| a.lane);
        for (lane, buffer) in self.lanes.iter_mut() {
            buffer.set_muted(Some(*lane) != audible_lane);
        }

        // Chosen among videos that draw frames, so a failed top layer
        // hands the flag down.
        let topmost_video = active
            .iter()
            .rev()
            .find(|t| t.kind() == TrackKind::Video && !self.media_failed(t))
            .map(|t| t.id().to_string());
        let refresh_background = frame % u64::from(self.background_refresh_divisor) == 0;

        let effective = |t: &Track| -> Option<Transform> {
            match transient {
                Some((id, live)) if id == t.id() => Some(*live),
                _ => t.transform().copied(),
            }
        };

        let mut instructions = Vec::with_capacity(active.len());
        for layer in compose_layers(&active) {
            let track = match layer {
                Layer::Track(track) => track,
                Layer::Subtitles {
                    anchor,
                    z_index,
                    cues,
                } => {
                    instructions.push(RenderInstruction {
                        track_id: anchor.id().to_string(),
                        kind: TrackKind::Subtitle,
                        row: anchor.row(),
                        z_index,
                        transform: effective(anchor),
                        content: RenderContent::Subtitles { cues },
                    });
                    continue;
                }
            };

            let content = match track {
                Track::Video(v) => {
                    let lane = LaneId::of(track);
                    let source_key = v.media.source_key().to_string();
                    if let Some(placeholder) = self.placeholder_for(track, &source_key) {
                        placeholder
                    } else {
                        let priority = if topmost_video.as_deref() == Some(track.id()) {
                            VideoPriority::Topmost
                        } else {
                            VideoPriority::Background {
                                refresh: refresh_background,
                            }
                        };
                        // Unmounted (not reconciled yet) lanes render as loading.
                        let shown = self
                            .lanes
                            .get(&lane)
                            .filter(|b| b.current_track() == Some(track.id()))
                            .and_then(|b| b.displayed_frame());
                        RenderContent::Video {
                            lane,
                            source_key,
                            frame: shown,
                            priority,
                            audible: audible_lane == Some(lane),
                        }
                    }
                }
                Track::Audio(a) => {
                    let lane = LaneId::of(track);
                    let source_key = a.media.source_key().to_string();
                    self.placeholder_for(track, &source_key)
                        .unwrap_or(RenderContent::Audio {
                            lane,
                            source_key,
                            audible: audible_lane == Some(lane),
                        })
                }
                Track::Image(img) => match self.resolver.resolve(&img.source) {
                    Ok(uri) => {
                        self.failed_tracks.remove(track.id());
                        RenderContent::Image { uri }
                    }
                    Err(e) => self.mark_failed(track, &img.source, e.to_string()),
                },
                Track::Text(text) => RenderContent::Text {
                    content: text.content.clone(),
                    font_size: text.font_size,
                },
                Track::Subtitle(_) => continue,
            };

            instructions.push(RenderInstruction {
                track_id: track.id().to_string(),
                kind: track.kind(),
                row: track.row(),
                z_index: track.z_index(),
                transform: effective(track),
                content,
            });
        }

        tracing::trace!(frame, layers = instructions.len(), "Rendered frame");
        FrameRender {
            frame,
            instructions,
            audio,
        }
    }

    fn media_playable(&self, track: &Track) -> bool {
        self.lanes
            .get(&LaneId::of(track))
            .is_some_and(|b| b.current_track() == Some(track.id()))
            && !self.media_failed(track)
    }

    /// The lane reports the track's source as failed.
    fn media_failed(&self, track: &Track) -> bool {
        let Some(media) = track.media() else {
            return false;
        };
        self.lanes
            .get(&LaneId::of(track))
            .is_some_and(|b| b.failed_source() == Some(media.source_key()))
    }

    fn placeholder_for(&mut self, track: &Track, source_key: &str) -> Option<RenderContent> {
        if self.media_failed(track) {
            Some(self.mark_failed(track, source_key, "media failed to load".to_string()))
        } else {
            self.failed_tracks.remove(track.id());
            None
        }
    }

    fn mark_failed(&mut self, track: &Track, source_key: &str, reason: String) -> RenderContent {
        if !self.failed_tracks.contains_key(track.id()) {
            tracing::warn!(track = track.id(), source = source_key, %reason, "Rendering placeholder");
            self.failed_tracks
                .insert(track.id().to_string(), reason.clone());
        }
        RenderContent::Placeholder {
            source_key: source_key.to_string(),
            reason,
        }
    }
}

impl Drop for OverlayCompositor {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_playback::sim::SimMediaBackend;
    use splice_playback::lookahead_frames;

    fn params() -> LaneParams {
        LaneParams {
            fps: 30.0,
            playback_rate: 1.0,
            lookahead_frames: lookahead_frames(1500.0, 30.0, 1.0),
            drift_tolerance_ms: 250.0,
            playing: true,
        }
    }

    fn compositor(backend: &SimMediaBackend) -> OverlayCompositor {
        OverlayCompositor::new(
            Box::new(backend.clone()),
            Box::new(backend.resolver()),
            2,
        )
    }

    fn render(tracks: &[Track], frame: FrameIndex, backend: &SimMediaBackend) -> FrameRender {
        let timeline = VirtualTimeline::build(tracks);
        let mut c = compositor(backend);
        c.reconcile(frame, &timeline, &params());
        c.render_frame(frame, &timeline, tracks, None)
    }

    #[test]
    fn test_sort_by_row_then_type_then_id() {
        let tracks = vec![
            Track::text("title", 0, 0, 100, "Hi"),
            Track::video("clip", 0, 0, 100, "A"),
            Track::image("logo", 1, 0, 100, "logo.png"),
            Track::text("b-caption", 1, 0, 100, "B"),
            Track::text("a-caption", 1, 0, 100, "A"),
        ];
        let ids: Vec<&str> = active_tracks(&tracks, 10).iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec!["clip", "title", "logo", "a-caption", "b-caption"]);
    }

    #[test]
    fn test_selection_is_half_open_and_visible_only() {
        let mut hidden = Track::text("hidden", 0, 0, 100, "x");
        hidden.base_mut().visible = false;
        let tracks = vec![Track::text("t", 0, 10, 20, "x"), hidden];
        assert!(active_tracks(&tracks, 9).is_empty());
        assert_eq!(active_tracks(&tracks, 10).len(), 1);
        assert!(active_tracks(&tracks, 20).is_empty());
    }

    #[test]
    fn test_single_video_is_topmost() {
        let backend = SimMediaBackend::new();
        let out = render(&[Track::video("v", 0, 0, 100, "A")], 0, &backend);
        assert!(out.topmost_video().is_some());
        let audio = out.audio.unwrap();
        assert_eq!(audio.track_id, "v");
        assert_eq!(audio.origin, AudioOrigin::LinkedVideo);
    }

    #[test]
    fn test_background_refresh_divisor() {
        let backend = SimMediaBackend::new();
        let tracks = vec![
            Track::video("low", 0, 0, 100, "A"),
            Track::video("high", 1, 0, 100, "B"),
        ];
        for (frame, refresh) in [(10, true), (11, false)] {
            let out = render(&tracks, frame, &backend);
            let low = out.instruction("low").unwrap();
            let RenderContent::Video { priority, .. } = &low.content else {
                panic!("expected video");
            };
            assert_eq!(*priority, VideoPriority::Background { refresh });
        }
    }

    #[test]
    fn test_audio_election_prefers_independent_audio() {
        let backend = SimMediaBackend::new();
        let mut muted = Track::audio("muted-music", 0, 0, 100, "M0");
        muted.base_mut().muted = true;
        let tracks = vec![
            Track::video("v", 0, 0, 100, "A"),
            muted,
            Track::audio("music", 1, 0, 100, "M1"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let mut c = compositor(&backend);
        c.reconcile(0, &timeline, &params());
        let out = c.render_frame(0, &timeline, &tracks, None);

        let audio = out.audio.unwrap();
        assert_eq!(audio.track_id, "music");
        assert_eq!(audio.origin, AudioOrigin::Independent);

        // Exactly one unmuted lane element.
        let audible: Vec<_> = backend
            .live_elements()
            .into_iter()
            .filter(|e| !e.muted)
            .collect();
        assert_eq!(audible.len(), 1);
        assert_eq!(audible[0].lane, LaneId::new(TrackKind::Audio, 1));
    }

    #[test]
    fn test_no_audio_when_everything_muted() {
        let backend = SimMediaBackend::new();
        let mut v = Track::video("v", 0, 0, 100, "A");
        v.base_mut().muted = true;
        let out = render(&[v], 0, &backend);
        assert!(out.audio.is_none());
    }

    #[test]
    fn test_subtitles_merge_under_lowest_transform() {
        let backend = SimMediaBackend::new();
        let tracks = vec![
            Track::subtitle("sub-hi", 2, 0, 100, "second").with_transform(Transform::at(0.0, 0.5)),
            Track::subtitle("sub-lo", 0, 0, 100, "first").with_transform(Transform::at(0.0, 0.8)),
            Track::text("title", 1, 0, 100, "Title"),
        ];
        let out = render(&tracks, 5, &backend);
        assert_eq!(out.instructions.len(), 2);

        let merged = &out.instructions[1];
        assert_eq!(merged.track_id, "sub-lo");
        assert_eq!(merged.transform.unwrap().y, 0.8);
        let RenderContent::Subtitles { cues } = &merged.content else {
            panic!("expected merged subtitles");
        };
        let texts: Vec<&str> = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn test_unresolvable_media_renders_placeholder() {
        let backend = SimMediaBackend::new();
        backend.make_unresolvable("missing.mp4");
        backend.make_unresolvable("missing.png");
        let tracks = vec![
            Track::video("v", 0, 0, 100, "missing.mp4"),
            Track::image("img", 1, 0, 100, "missing.png"),
            Track::text("t", 2, 0, 100, "still here"),
        ];
        let out = render(&tracks, 0, &backend);
        assert_eq!(out.placeholders().count(), 2);
        assert!(out.audio.is_none());
        assert!(matches!(
            out.instruction("t").unwrap().content,
            RenderContent::Text { .. }
        ));
    }

    #[test]
    fn test_transient_overrides_persisted_transform() {
        let backend = SimMediaBackend::new();
        let tracks = vec![Track::text("t", 0, 0, 100, "x").with_transform(Transform::at(0.1, 0.1))];
        let timeline = VirtualTimeline::build(&tracks);
        let mut c = compositor(&backend);
        c.reconcile(0, &timeline, &params());

        let live = Transform::at(0.5, -0.5);
        let out = c.render_frame(0, &timeline, &tracks, Some(("t", &live)));
        assert_eq!(out.instruction("t").unwrap().transform, Some(live));
        let out = c.render_frame(0, &timeline, &tracks, None);
        assert_eq!(out.instruction("t").unwrap().transform.unwrap().x, 0.1);
    }

    #[test]
    fn test_mount_and_unmount_follow_lookahead() {
        let backend = SimMediaBackend::new();
        let tracks = vec![
            Track::video("a", 0, 0, 30, "A"),
            Track::video("b", 1, 100, 130, "B"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let mut c = compositor(&backend);

        c.reconcile(0, &timeline, &params());
        assert_eq!(c.mounted_lanes(), vec![LaneId::new(TrackKind::Video, 0)]);

        c.reconcile(60, &timeline, &params());
        assert_eq!(c.mounted_lanes(), vec![LaneId::new(TrackKind::Video, 1)]);
        // Lane 0's elements were torn down before removal.
        assert!(backend
            .elements()
            .iter()
            .filter(|e| e.lane.row == 0)
            .all(|e| e.dropped && e.uri.is_none()));

        c.reconcile(200, &timeline, &params());
        assert!(c.mounted_lanes().is_empty());
    }

    #[test]
    fn test_overlap_loser_is_not_rendered() {
        let backend = SimMediaBackend::new();
        let tracks = vec![
            Track::video("early", 0, 0, 100, "A"),
            Track::video("late", 0, 50, 150, "B"),
        ];
        let out = render(&tracks, 60, &backend);
        assert_eq!(out.video_layers().count(), 1);
        assert!(out.instruction("late").is_some());
        assert!(out.instruction("early").is_none());
    }

    #[test]
    fn test_failed_top_video_hands_topmost_down() {
        let backend = SimMediaBackend::new();
        backend.make_unresolvable("C");
        let tracks = vec![
            Track::video("bottom", 0, 0, 100, "A"),
            Track::video("middle", 1, 0, 100, "B"),
            Track::video("top", 2, 0, 100, "C"),
        ];
        let out = render(&tracks, 0, &backend);

        assert!(matches!(
            out.instruction("top").unwrap().content,
            RenderContent::Placeholder { .. }
        ));
        assert_eq!(out.topmost_video().unwrap().track_id, "middle");
        let topmost = out
            .video_layers()
            .filter(|i| {
                matches!(
                    i.content,
                    RenderContent::Video {
                        priority: VideoPriority::Topmost,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(topmost, 1);
    }

    #[test]
    fn test_unmounted_lane_renders_loading_video() {
        let backend = SimMediaBackend::new();
        let tracks = vec![
            Track::video("v", 0, 0, 100, "A"),
            Track::video("early", 1, 0, 50, "B"),
            Track::video("late", 1, 20, 100, "C"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let mut c = compositor(&backend);

        let out = c.render_frame(30, &timeline, &tracks, None);
        let ids: Vec<&str> = out.video_layers().map(|i| i.track_id.as_str()).collect();
        assert_eq!(ids, vec!["v", "late"]);
        assert!(out
            .video_layers()
            .all(|i| matches!(i.content, RenderContent::Video { frame: None, .. })));
        assert_eq!(out.topmost_video().unwrap().track_id, "late");
        assert!(c.mounted_lanes().is_empty());
    }

    #[test]
    fn test_compose_layers_merges_subtitles_at_last_slot() {
        let tracks = vec![
            Track::subtitle("s0", 0, 0, 10, "a"),
            Track::text("t1", 1, 0, 10, "x"),
            Track::subtitle("s2", 2, 0, 10, "b"),
        ];
        let active = active_tracks(&tracks, 0);
        let layers = compose_layers(&active);
        assert_eq!(layers.len(), 2);
        assert!(matches!(layers[0], Layer::Track(t) if t.id() == "t1"));
        let Layer::Subtitles {
            anchor,
            z_index,
            cues,
        } = &layers[1]
        else {
            panic!("expected merged subtitles");
        };
        assert_eq!(anchor.id(), "s0");
        assert_eq!(*z_index, tracks[2].z_index());
        assert_eq!(cues.len(), 2);
    }
}
