//! Splice Project Model
//!
//! Defines the core data contracts for Splice projects:
//! - **Tracks:** Tagged union over video, audio, image, text, and subtitle tracks
//! - **Transform:** Persisted overlay placement in normalized, zoom-independent space
//! - **Events:** Pointer and key input consumed by overlay gestures
//! - **Project:** Top-level document with canvas settings and tracks
//!
//! Overlay positions are normalized to half the video's width/height with
//! the origin at the frame center, so they survive resolution and zoom
//! changes across sessions.

pub mod event;
pub mod geometry;
pub mod project;
pub mod track;
pub mod transform;

pub use event::*;
pub use geometry::*;
pub use project::*;
pub use track::*;
pub use transform::*;
