//! Virtual timeline: per-lane index of media segments.
//!
//! Media tracks (video and audio) are grouped into lanes (kind × row) and
//! sorted by start frame. Each segment records whether playing it needs a
//! different source than the segment before it on the same lane, which is
//! what drives standby preloading.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use splice_common::clock::frames_to_secs;
use splice_project_model::track::{FrameIndex, FrameRange, Track, TrackId, TrackKind};

/// One decode lane: a media kind on a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LaneId {
    pub kind: TrackKind,
    pub row: usize,
}

impl LaneId {
    pub fn new(kind: TrackKind, row: usize) -> Self {
        Self { kind, row }
    }

    pub fn of(track: &Track) -> Self {
        Self::new(track.kind(), track.row())
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.row)
    }
}

/// A track's occupied range on its lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSegment {
    pub track_id: TrackId,
    pub lane: LaneId,
    pub source_key: String,
    pub frames: FrameRange,
    /// Source time (seconds) at `frames.start`.
    pub source_start_time: f64,
    /// Differs in source from the previous segment on this lane (always set
    /// on a lane's first segment).
    pub requires_source_change: bool,
}

impl TimelineSegment {
    /// Source time (seconds) to show at `frame`.
    pub fn source_time_at(&self, frame: FrameIndex, fps: f64) -> f64 {
        let into = frame.saturating_sub(self.frames.start);
        self.source_start_time + frames_to_secs(into as f64, fps)
    }
}

/// A segment starting within the lookahead window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpcomingSegment<'a> {
    pub segment: &'a TimelineSegment,
    pub frames_until_start: u64,
    pub requires_source_change: bool,
}

/// Frames covered by `lookahead_ms` of wall time at `fps` × `playback_rate`.
pub fn lookahead_frames(lookahead_ms: f64, fps: f64, playback_rate: f64) -> u64 {
    let frames = lookahead_ms / 1000.0 * fps * playback_rate;
    if frames.is_finite() && frames > 0.0 {
        frames.ceil() as u64
    } else {
        0
    }
}

/// Per-lane sorted segment index.
#[derive(Debug, Clone, Default)]
pub struct VirtualTimeline {
    lanes: BTreeMap<LaneId, Vec<TimelineSegment>>,
}

impl VirtualTimeline {
    /// Index the visible media tracks. Same-lane overlaps are truncated so
    /// the later segment (in sort order) wins.
    pub fn build(tracks: &[Track]) -> Self {
        let mut grouped: BTreeMap<LaneId, Vec<TimelineSegment>> = BTreeMap::new();

        for track in tracks {
            let Some(media) = track.media() else {
                continue;
            };
            if !track.base().visible {
                continue;
            }
            let frames = track.frames();
            if frames.is_empty() {
                tracing::warn!(track = track.id(), ?frames, "Skipping media track with empty range");
                continue;
            }
            let lane = LaneId::of(track);
            grouped.entry(lane).or_default().push(TimelineSegment {
                track_id: track.id().to_string(),
                lane,
                source_key: media.source_key().to_string(),
                frames,
                source_start_time: media.source_start_time,
                requires_source_change: true,
            });
        }

        let mut lanes = BTreeMap::new();
        for (lane, mut segments) in grouped {
            // Stable: equal starts keep input order, so the later track wins.
            segments.sort_by_key(|s| s.frames.start);

            let mut resolved: Vec<TimelineSegment> = Vec::with_capacity(segments.len());
            for segment in segments {
                if let Some(prev) = resolved.last_mut() {
                    if prev.frames.end > segment.frames.start {
                        tracing::warn!(
                            %lane,
                            earlier = %prev.track_id,
                            later = %segment.track_id,
                            "Overlapping segments on one lane; truncating the earlier one"
                        );
                        prev.frames.end = segment.frames.start;
                        if prev.frames.is_empty() {
                            resolved.pop();
                        }
                    }
                }
                resolved.push(segment);
            }

            for i in 0..resolved.len() {
                resolved[i].requires_source_change =
                    i == 0 || resolved[i - 1].source_key != resolved[i].source_key;
            }

            if !resolved.is_empty() {
                lanes.insert(lane, resolved);
            }
        }

        Self { lanes }
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn lanes(&self) -> impl Iterator<Item = &LaneId> {
        self.lanes.keys()
    }

    pub fn lane_segments(&self, lane: &LaneId) -> &[TimelineSegment] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Segment covering `frame` on `lane`.
    pub fn segment_at(&self, lane: &LaneId, frame: FrameIndex) -> Option<&TimelineSegment> {
        let segments = self.lane_segments(lane);
        let idx = segments.partition_point(|s| s.frames.start <= frame);
        idx.checked_sub(1)
            .map(|i| &segments[i])
            .filter(|s| s.frames.contains(frame))
    }

    /// First segment on `lane` starting after `frame`.
    pub fn next_segment(&self, lane: &LaneId, frame: FrameIndex) -> Option<&TimelineSegment> {
        let segments = self.lane_segments(lane);
        let idx = segments.partition_point(|s| s.frames.start <= frame);
        segments.get(idx)
    }

    /// Every segment covering `frame`, in lane order.
    pub fn active_segments(&self, frame: FrameIndex) -> Vec<&TimelineSegment> {
        self.lanes
            .keys()
            .filter_map(|lane| self.segment_at(lane, frame))
            .collect()
    }

    /// Segments starting in `(current_frame, current_frame + lookahead_frames]`,
    /// nearest first.
    pub fn get_upcoming_segments(
        &self,
        current_frame: FrameIndex,
        lookahead_frames: u64,
    ) -> Vec<UpcomingSegment<'_>> {
        let horizon = current_frame.saturating_add(lookahead_frames);
        let mut upcoming: Vec<UpcomingSegment<'_>> = self
            .lanes
            .values()
            .flatten()
            .filter(|s| s.frames.start > current_frame && s.frames.start <= horizon)
            .map(|s| UpcomingSegment {
                segment: s,
                frames_until_start: s.frames.start - current_frame,
                requires_source_change: s.requires_source_change,
            })
            .collect();
        upcoming.sort_by_key(|u| (u.frames_until_start, u.segment.lane));
        upcoming
    }

    /// Whether `lane` has a segment covering `frame` or starting within
    /// `lookahead_frames` of it.
    pub fn lane_needed(&self, lane: &LaneId, frame: FrameIndex, lookahead_frames: u64) -> bool {
        self.segment_at(lane, frame).is_some()
            || self
                .next_segment(lane, frame)
                .is_some_and(|s| s.frames.start - frame <= lookahead_frames)
    }

    /// Lanes that are active at `frame` or start within the lookahead.
    pub fn needed_lanes(&self, frame: FrameIndex, lookahead_frames: u64) -> Vec<LaneId> {
        self.lanes
            .keys()
            .filter(|lane| self.lane_needed(lane, frame, lookahead_frames))
            .copied()
            .collect()
    }

    /// Last frame covered by any segment (exclusive).
    pub fn end_frame(&self) -> FrameIndex {
        self.lanes
            .values()
            .filter_map(|s| s.last())
            .map(|s| s.frames.end)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_lane(row: usize) -> LaneId {
        LaneId::new(TrackKind::Video, row)
    }

    #[test]
    fn test_empty_input() {
        let timeline = VirtualTimeline::build(&[]);
        assert!(timeline.is_empty());
        assert!(timeline.get_upcoming_segments(0, 100).is_empty());
        assert!(timeline.active_segments(0).is_empty());
        assert_eq!(timeline.end_frame(), 0);
    }

    #[test]
    fn test_same_source_continues() {
        let tracks = vec![
            Track::video("a1", 0, 0, 90, "A"),
            Track::video("a2", 0, 90, 180, "A"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let segments = timeline.lane_segments(&video_lane(0));
        assert_eq!(segments.len(), 2);
        assert!(segments[0].requires_source_change);
        assert!(!segments[1].requires_source_change);
    }

    #[test]
    fn test_different_source_flags_change() {
        let tracks = vec![
            Track::video("b", 0, 90, 180, "B"),
            Track::video("a", 0, 0, 90, "A"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let next = timeline.next_segment(&video_lane(0), 10).unwrap();
        assert_eq!(next.track_id, "b");
        assert!(next.requires_source_change);
    }

    #[test]
    fn test_upcoming_window_is_half_open_at_current() {
        let tracks = vec![
            Track::video("a", 0, 0, 90, "A"),
            Track::video("b", 0, 90, 180, "B"),
            Track::audio("m", 0, 60, 200, "music"),
        ];
        let timeline = VirtualTimeline::build(&tracks);

        let upcoming = timeline.get_upcoming_segments(45, 45);
        let ids: Vec<&str> = upcoming.iter().map(|u| u.segment.track_id.as_str()).collect();
        assert_eq!(ids, vec!["m", "b"]);
        assert_eq!(upcoming[1].frames_until_start, 45);

        // A segment starting at the current frame is active, not upcoming.
        assert!(timeline
            .get_upcoming_segments(90, 45)
            .iter()
            .all(|u| u.segment.track_id != "b"));
        assert!(timeline.get_upcoming_segments(44, 45).iter().all(|u| u.segment.track_id != "b"));
    }

    #[test]
    fn test_lanes_split_by_kind_and_row() {
        let tracks = vec![
            Track::video("v0", 0, 0, 10, "A"),
            Track::video("v1", 1, 0, 10, "B"),
            Track::audio("a0", 0, 0, 10, "C"),
            Track::text("t0", 0, 0, 10, "not media"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        assert_eq!(timeline.lanes().count(), 3);
        assert_eq!(timeline.active_segments(5).len(), 3);
    }

    #[test]
    fn test_overlap_truncates_earlier() {
        let tracks = vec![
            Track::video("a", 0, 0, 100, "A"),
            Track::video("b", 0, 50, 150, "B"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let segments = timeline.lane_segments(&video_lane(0));
        assert_eq!(segments[0].frames, FrameRange::new(0, 50));
        assert_eq!(segments[1].frames, FrameRange::new(50, 150));
        assert_eq!(timeline.segment_at(&video_lane(0), 60).unwrap().track_id, "b");
    }

    #[test]
    fn test_overlap_with_same_start_drops_earlier() {
        let tracks = vec![
            Track::video("a", 0, 10, 100, "A"),
            Track::video("b", 0, 10, 40, "B"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        let segments = timeline.lane_segments(&video_lane(0));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].track_id, "b");
    }

    #[test]
    fn test_hidden_tracks_are_not_indexed() {
        let mut hidden = Track::video("h", 0, 0, 10, "A");
        hidden.base_mut().visible = false;
        assert!(VirtualTimeline::build(&[hidden]).is_empty());
    }

    #[test]
    fn test_lookahead_frames_rounds_up() {
        assert_eq!(lookahead_frames(1500.0, 30.0, 1.0), 45);
        assert_eq!(lookahead_frames(1000.0, 29.97, 1.0), 30);
        assert_eq!(lookahead_frames(1500.0, 30.0, 2.0), 90);
        assert_eq!(lookahead_frames(0.0, 30.0, 1.0), 0);
    }

    #[test]
    fn test_source_time_at() {
        let mut track = Track::video("a", 0, 30, 90, "A");
        if let Track::Video(v) = &mut track {
            v.media.source_start_time = 2.0;
        }
        let timeline = VirtualTimeline::build(&[track]);
        let seg = timeline.segment_at(&video_lane(0), 60).unwrap();
        assert!((seg.source_time_at(60, 30.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_needed_lanes_includes_lookahead() {
        let tracks = vec![
            Track::video("a", 0, 0, 30, "A"),
            Track::video("b", 1, 100, 130, "B"),
        ];
        let timeline = VirtualTimeline::build(&tracks);
        assert_eq!(timeline.needed_lanes(10, 45), vec![video_lane(0)]);
        assert_eq!(timeline.needed_lanes(60, 45), vec![video_lane(1)]);
        assert!(timeline.needed_lanes(200, 45).is_empty());
    }
}
