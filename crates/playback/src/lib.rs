//! Splice Playback
//!
//! Keeps every media lane's decode state reconciled to one virtual clock:
//!
//! ```text
//! tracks ──▶ VirtualTimeline ──▶ upcoming segments (lookahead)
//!                                     │
//! CompositingClock ──frame──▶ DualBufferVideoElement (per lane)
//!        ▲                      active ◀─swap─▶ standby (preload)
//!        │                            │
//!        └──── pause/resume ◀── StallMonitor (ready-state poll)
//! ```
//!
//! Media decoding sits behind the [`media::MediaElement`] seam; [`sim`]
//! provides a deterministic backend for tests and headless runs.

pub mod clock;
pub mod dual_buffer;
pub mod media;
pub mod sim;
pub mod stall;
pub mod timeline;

pub use clock::{CompositingClock, HoldReason};
pub use dual_buffer::{
    BufferStatus, DisplayedFrame, DualBufferVideoElement, LaneEvent, LaneParams,
};
pub use media::{MediaElement, MediaElementFactory, MediaResolver, MediaUri, ReadyState};
pub use stall::{LayerStatus, StallMonitor, StallTransition};
pub use timeline::{lookahead_frames, LaneId, TimelineSegment, UpcomingSegment, VirtualTimeline};
