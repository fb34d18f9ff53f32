use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use splice_common::config::EngineConfig;
use splice_playback::sim::SimMediaBackend;
use splice_playback::{lookahead_frames, HoldReason, LaneEvent, LaneParams, VirtualTimeline};
use splice_project_model::project::CanvasConfig;
use splice_project_model::track::Track;
use splice_render_engine::{
    EngineEvent, OverlayCompositor, RenderContent, TimelineEngine, VideoPriority,
};

const CANVAS: CanvasConfig = CanvasConfig {
    width: 1920,
    height: 1080,
    fps: 30.0,
};

struct Harness {
    engine: TimelineEngine,
    backend: SimMediaBackend,
    events: Rc<RefCell<Vec<EngineEvent>>>,
}

impl Harness {
    fn new(tracks: Vec<Track>, latency_ms: f64) -> Self {
        let backend = SimMediaBackend::with_latency_ms(latency_ms);
        let mut engine = TimelineEngine::new(
            EngineConfig::default(),
            CANVAS,
            tracks,
            Box::new(backend.clone()),
            Box::new(backend.resolver()),
        )
        .unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        engine.add_observer(move |e: &EngineEvent| sink.borrow_mut().push(e.clone()));
        engine.start();
        Self {
            engine,
            backend,
            events,
        }
    }

    /// Advance decoders and engine by the same synthetic time.
    fn run(&mut self, ticks: usize, delta_ms: f64) {
        for _ in 0..ticks {
            self.backend.advance(delta_ms);
            self.engine.tick(delta_ms);
        }
    }

    fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }
}

#[test]
fn three_videos_on_three_rows_have_one_topmost() {
    let mut h = Harness::new(
        vec![
            Track::video("bottom", 0, 0, 300, "A"),
            Track::video("middle", 1, 0, 300, "B"),
            Track::video("top", 2, 0, 300, "C"),
        ],
        0.0,
    );
    let render = h.engine.tick(16.0).unwrap().clone();

    let videos: Vec<_> = render.video_layers().collect();
    assert_eq!(videos.len(), 3);
    let topmost: Vec<&str> = videos
        .iter()
        .filter(|i| {
            matches!(
                i.content,
                RenderContent::Video {
                    priority: VideoPriority::Topmost,
                    ..
                }
            )
        })
        .map(|i| i.track_id.as_str())
        .collect();
    assert_eq!(topmost, vec!["top"]);
    let background = videos
        .iter()
        .filter(|i| {
            matches!(
                i.content,
                RenderContent::Video {
                    priority: VideoPriority::Background { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(background, 2);

    // One audible element across all lanes.
    let audible = h
        .backend
        .live_elements()
        .into_iter()
        .filter(|e| !e.muted)
        .count();
    assert_eq!(audible, 1);
    assert_eq!(render.audio.unwrap().track_id, "bottom");
}

#[test]
fn unresolvable_top_video_leaves_one_topmost() {
    let mut h = Harness::new(
        vec![
            Track::video("bottom", 0, 0, 300, "A"),
            Track::video("middle", 1, 0, 300, "B"),
            Track::video("top", 2, 0, 300, "C"),
        ],
        0.0,
    );
    h.backend.make_unresolvable("C");
    let render = h.engine.tick(16.0).unwrap().clone();

    assert_eq!(render.placeholders().count(), 1);
    assert_eq!(render.placeholders().next().unwrap().track_id, "top");
    let topmost: Vec<&str> = render
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
        .map(|i| i.track_id.as_str())
        .collect();
    assert_eq!(topmost, vec!["middle"]);
}

#[test]
fn two_stalls_pause_and_resume_exactly_twice() {
    let mut h = Harness::new(vec![Track::video("v", 0, 0, 3000, "A")], 0.0);
    h.engine.play();
    h.run(10, 20.0);
    assert_eq!(h.count(|e| matches!(e, EngineEvent::Stalled { .. })), 0);

    for _ in 0..2 {
        h.backend.stall_source("A");
        h.run(20, 20.0);
        assert!(h.engine.is_stalled());
        assert!(h.engine.clock().is_held(HoldReason::Stall));
        let frozen = h.engine.current_frame();
        h.run(5, 20.0);
        assert_eq!(h.engine.current_frame(), frozen);

        h.backend.recover_source("A");
        h.run(20, 20.0);
        assert!(!h.engine.is_stalled());
        assert!(h.engine.clock().holds().is_empty());
        assert!(h.engine.current_frame() > frozen);
    }

    assert_eq!(h.count(|e| matches!(e, EngineEvent::Stalled { .. })), 2);
    assert_eq!(h.count(|e| matches!(e, EngineEvent::Recovered)), 2);
    assert_eq!(h.engine.stall_count(), 2);
}

#[test]
fn preloaded_source_change_swaps_without_hold() {
    let mut h = Harness::new(
        vec![
            Track::video("first", 0, 0, 90, "A"),
            Track::video("second", 0, 90, 180, "B"),
        ],
        200.0,
    );
    h.engine.play();

    // Wait out the initial load.
    while h.engine.is_stalled() || h.engine.current_frame() == 0 {
        h.run(1, 20.0);
    }

    while h.engine.current_frame() < 120 {
        h.run(1, 20.0);
        let render = h.engine.last_render().unwrap();
        let top = render.topmost_video().unwrap();
        let RenderContent::Video {
            frame: Some(shown), ..
        } = &top.content
        else {
            panic!("no frame at {}", render.frame);
        };
        assert!(shown.ready_state.can_render(), "blank at {}", render.frame);
        assert!(!shown.held);
    }

    let lookahead = lookahead_frames(1500.0, 30.0, 1.0);
    let events = h.events.borrow();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::Lane(LaneEvent::Preloading { source_key, frames_until_start, .. })
            if source_key == "B" && *frames_until_start <= lookahead
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::Lane(LaneEvent::Swapped { track_id, held: false, .. }) if track_id == "second"
    )));
    assert_eq!(h.backend.load_count("B"), 1);
}

#[test]
fn seek_resyncs_every_lane_immediately() {
    let mut h = Harness::new(
        vec![
            Track::video("first", 0, 0, 90, "A"),
            Track::video("second", 0, 90, 180, "B"),
            Track::audio("music", 1, 0, 180, "M"),
        ],
        0.0,
    );
    h.engine.tick(16.0);
    h.engine.seek(120);

    assert_eq!(h.engine.current_frame(), 120);
    let render = h.engine.render_current();
    let top = render.topmost_video().unwrap();
    assert_eq!(top.track_id, "second");
    let RenderContent::Video {
        frame: Some(shown), ..
    } = &top.content
    else {
        panic!("no frame after seek");
    };
    assert!((shown.media_time - 1.0).abs() < 1e-6);

    assert!(h
        .events
        .borrow()
        .iter()
        .any(|e| matches!(e, EngineEvent::Seeked { frame: 120 })));
}

#[test]
fn failed_source_renders_placeholder_and_keeps_playing() {
    let mut h = Harness::new(
        vec![
            Track::video("broken", 0, 0, 300, "bad.mp4"),
            Track::text("title", 1, 0, 300, "Still here"),
        ],
        0.0,
    );
    h.backend.fail_source("bad.mp4");
    h.engine.play();
    h.run(30, 20.0);

    let render = h.engine.last_render().unwrap();
    assert_eq!(render.placeholders().count(), 1);
    assert!(render.instruction("title").is_some());
    assert!(!h.engine.is_stalled());
    assert!(h.engine.current_frame() > 0);
    assert_eq!(
        h.count(|e| matches!(e, EngineEvent::Lane(LaneEvent::LoadFailed { .. }))),
        1
    );
}

fn arb_visual_track() -> impl Strategy<Value = Track> {
    (0usize..4, 0u64..60, 1u64..60, 0u8..3).prop_map(|(row, start, len, kind)| match kind {
        0 => Track::video("t", row, start, start + len, format!("src{row}")),
        1 => Track::image("t", row, start, start + len, "logo.png"),
        _ => Track::text("t", row, start, start + len, "caption"),
    })
}

proptest! {
    #[test]
    fn render_order_and_topmost_are_consistent(
        tracks in prop::collection::vec(arb_visual_track(), 0..12),
        frame in 0u64..120,
    ) {
        let tracks: Vec<Track> = tracks
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                t.base_mut().id = format!("t{i:02}");
                t
            })
            .collect();
        let backend = SimMediaBackend::new();
        let timeline = VirtualTimeline::build(&tracks);
        let params = LaneParams {
            fps: 30.0,
            playback_rate: 1.0,
            lookahead_frames: lookahead_frames(1500.0, 30.0, 1.0),
            drift_tolerance_ms: 250.0,
            playing: true,
        };
        let mut compositor = OverlayCompositor::new(
            Box::new(backend.clone()),
            Box::new(backend.resolver()),
            2,
        );
        compositor.reconcile(frame, &timeline, &params);
        let render = compositor.render_frame(frame, &timeline, &tracks, None);

        for pair in render.instructions.windows(2) {
            prop_assert!(pair[0].z_index <= pair[1].z_index);
        }

        let videos: Vec<_> = render.video_layers().collect();
        let topmost = videos
            .iter()
            .filter(|i| matches!(
                i.content,
                RenderContent::Video { priority: VideoPriority::Topmost, .. }
            ))
            .count();
        prop_assert_eq!(topmost, usize::from(!videos.is_empty()));
        if let Some(top) = render.topmost_video() {
            prop_assert!(videos.iter().all(|v| v.z_index <= top.z_index));
        }
    }
}
