//! Run the playback engine headless against simulated decoders.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use splice_common::config::EngineConfig;
use splice_playback::sim::SimMediaBackend;
use splice_playback::LaneEvent;
use splice_project_model::ProjectDocument;
use splice_render_engine::{EngineEvent, FrameRender, TimelineEngine};

pub struct SimulateOptions {
    pub seconds: f64,
    pub refresh_hz: f64,
    pub latency_ms: f64,
    pub realtime: bool,
    pub fail_sources: Vec<String>,
}

#[derive(Debug, Default)]
struct SimStats {
    stalls: u64,
    recoveries: u64,
    preloads: u64,
    swaps: u64,
    held_swaps: u64,
    on_demand_loads: u64,
    load_failures: u64,
}

impl SimStats {
    fn record(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Stalled { .. } => self.stalls += 1,
            EngineEvent::Recovered => self.recoveries += 1,
            EngineEvent::Lane(lane) => match lane {
                LaneEvent::Preloading { .. } => self.preloads += 1,
                LaneEvent::Swapped { held, .. } => {
                    self.swaps += 1;
                    if *held {
                        self.held_swaps += 1;
                    }
                }
                LaneEvent::LoadedOnDemand { .. } => self.on_demand_loads += 1,
                LaneEvent::LoadFailed { .. } => self.load_failures += 1,
            },
            _ => {}
        }
    }
}

pub async fn run(
    path: PathBuf,
    options: SimulateOptions,
    config: EngineConfig,
) -> anyhow::Result<()> {
    if !(options.refresh_hz.is_finite() && options.refresh_hz > 0.0) {
        return Err(anyhow::anyhow!(
            "refresh rate must be > 0, got {}",
            options.refresh_hz
        ));
    }

    let project = ProjectDocument::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let backend = SimMediaBackend::with_latency_ms(options.latency_ms);
    for key in &options.fail_sources {
        backend.fail_source(key);
    }

    let mut engine = TimelineEngine::from_project(
        config,
        &project,
        Box::new(backend.clone()),
        Box::new(backend.resolver()),
    )?;
    let stats = Rc::new(RefCell::new(SimStats::default()));
    let sink = stats.clone();
    engine.add_observer(move |e: &EngineEvent| sink.borrow_mut().record(e));

    println!("Simulating: {}", project.name);
    println!(
        "  {} tracks, {}x{} @ {}fps, refresh {} Hz, decoder latency {} ms{}",
        project.tracks.len(),
        project.canvas.width,
        project.canvas.height,
        project.canvas.fps,
        options.refresh_hz,
        options.latency_ms,
        if options.realtime { ", realtime" } else { "" }
    );

    let delta_ms = 1000.0 / options.refresh_hz;
    let total_ticks = (options.seconds.max(0.0) * options.refresh_hz).ceil() as u64;
    let ticks_per_second = (options.refresh_hz.round() as u64).max(1);
    let mut interval = options
        .realtime
        .then(|| tokio::time::interval(Duration::from_secs_f64(delta_ms / 1000.0)));

    engine.start();
    engine.play();
    for tick in 1..=total_ticks {
        if let Some(interval) = interval.as_mut() {
            interval.tick().await;
        }
        backend.advance(delta_ms);
        let Some(render) = engine.tick(delta_ms) else {
            break;
        };
        if tick % ticks_per_second == 0 {
            let line = summarize(render);
            let stalled = if engine.is_stalled() { " STALLED" } else { "" };
            println!("  t={}s {line}{stalled}", tick / ticks_per_second);
        }
        if !engine.clock().is_playing() {
            println!(
                "  Reached end of timeline at frame {}",
                engine.current_frame()
            );
            break;
        }
    }
    engine.shutdown();

    let stats = stats.borrow();
    println!();
    println!("Summary:");
    println!("  Final frame: {}", engine.current_frame());
    println!("  Stalls: {} (recovered {})", stats.stalls, stats.recoveries);
    println!("  Preloads: {}", stats.preloads);
    println!(
        "  Swaps: {} ({} held for the incoming frame)",
        stats.swaps, stats.held_swaps
    );
    println!("  Loads at boundary: {}", stats.on_demand_loads);
    println!("  Load failures: {}", stats.load_failures);
    tracing::debug!(?stats, "Simulation finished");

    Ok(())
}

fn summarize(render: &FrameRender) -> String {
    let topmost = render
        .topmost_video()
        .map(|i| i.track_id.as_str())
        .unwrap_or("-");
    let audio = render
        .audio
        .as_ref()
        .map(|a| a.track_id.as_str())
        .unwrap_or("-");
    format!(
        "frame={} layers={} topmost={} audio={} held={} placeholders={}",
        render.frame,
        render.instructions.len(),
        topmost,
        audio,
        render.held_layers(),
        render.placeholders().count()
    )
}
