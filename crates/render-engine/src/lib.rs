//! Splice Render Engine
//!
//! Turns a track list and a virtual clock into ordered render instructions
//! at interactive rates, and into per-frame export plans offline.
//!
//! # Tick Pipeline
//!
//! ```text
//! host refresh ──▶ TickScheduler
//!                       │ delta_ms
//!                       ▼
//!               CompositingClock ──frame──▶ lane reconcile
//!                       ▲                  (mount / preload / swap / unmount)
//!                       │                          │
//!               pause / resume ◀── StallMonitor ◀──┘
//!                                                  │
//! gesture transient ───────────────────────────────┤
//!                                                  ▼
//!                                         OverlayCompositor
//!                                                  │
//!                                                  ▼
//!                                  FrameRender (z-ordered instructions,
//!                                               one elected audio source)
//! ```

pub mod compositor;
pub mod engine;
pub mod export;

pub use compositor::{
    active_tracks, elect_audio, owns_lane, AudioElection, AudioOrigin, FrameRender,
    OverlayCompositor, RenderContent, RenderInstruction, SubtitleCue, VideoPriority,
};
pub use engine::{intrinsic_size, EngineEvent, EngineObserver, TimelineEngine};
pub use export::{
    ExportFrame, ExportLayer, ExportPlan, ExportProgress, ExportSource, ExportStage,
    ProgressCallback,
};
