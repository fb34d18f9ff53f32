//! Splice Transform Boundary
//!
//! Everything between a pointer on the preview surface and a persisted
//! overlay [`Transform`](splice_project_model::Transform):
//! - **Coordinates:** normalized ⇄ video ⇄ screen conversion at any zoom
//! - **Snapping:** modifier-driven snapping to frame center and edges,
//!   evaluated in video space so it is resolution independent
//! - **Gestures:** drag, corner-scale, edge-resize, and rotate state machines
//!   whose live value is a pure function of where the gesture started and
//!   where the pointer is now
//!
//! Pure computation: no I/O and no playback state.

pub mod coords;
pub mod gesture;
pub mod snap;

pub use coords::ScreenMapping;
pub use gesture::{
    Corner, Edge, GestureContext, GestureKind, GestureMachine, GesturePhase, GestureUpdate,
};
pub use snap::{SnapMode, SnapSettings};
