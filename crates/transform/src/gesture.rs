//! Overlay gesture state machines.
//!
//! Every gesture (drag, corner-scale, edge-resize, rotate) runs the same
//! lifecycle:
//!
//! ```text
//! Idle ──down──▶ Pending ──move ≥ threshold──▶ Active ──up──▶ Committed
//!                  │                             │
//!                  └──up──▶ Idle                 └──Escape──▶ Cancelled
//! ```
//!
//! While active, the live value is recomputed from scratch on every move by
//! [`compute_transient`] using only the initial transform, the pointer-down
//! position, and the current pointer. Nothing is written back until the
//! pointer is released, so Escape reverts without partial writes.

use splice_common::config::SnappingConfig;
use splice_common::error::{SpliceError, SpliceResult};
use splice_project_model::event::Modifiers;
use splice_project_model::geometry::{Point2D, Size2D};
use splice_project_model::transform::Transform;

use crate::coords::ScreenMapping;
use crate::snap::{snap_position, snap_rotation, SnapMode, SnapSettings};

/// Smallest scale a corner drag can produce.
pub const MIN_SCALE: f64 = 0.01;

/// Smallest width (source units) an edge resize can produce.
pub const MIN_WIDTH: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Pending,
    Active,
    Committed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Move the overlay center.
    Drag,
    /// Uniform scale from a corner handle, about the center.
    Scale(Corner),
    /// Change the box width from a side handle; the opposite edge stays put
    /// and text reflows to the new width.
    Resize(Edge),
    /// Rotate about the center.
    Rotate,
}

/// Everything a gesture needs to know about the preview surface.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext {
    pub mapping: ScreenMapping,
    /// Screen pixels per video pixel.
    pub render_scale: f64,
    /// Overlay box size (source units) used when the transform has none.
    pub intrinsic_size: Size2D,
    pub snap: SnapSettings,
    /// Screen pixels of travel before a pending gesture activates.
    pub activation_threshold_px: f64,
}

impl GestureContext {
    pub fn new(mapping: ScreenMapping, render_scale: f64, intrinsic_size: Size2D) -> Self {
        Self {
            mapping,
            render_scale,
            intrinsic_size,
            snap: SnapSettings::default(),
            activation_threshold_px: 3.0,
        }
    }

    /// Take tolerances, rotation step, and activation threshold from config.
    pub fn with_config(self, config: &SnappingConfig) -> Self {
        self.with_snap(SnapSettings::from(config))
            .with_activation_threshold(config.activation_threshold_px)
    }

    pub fn with_snap(mut self, snap: SnapSettings) -> Self {
        self.snap = snap;
        self
    }

    pub fn with_activation_threshold(mut self, px: f64) -> Self {
        self.activation_threshold_px = px.max(0.0);
        self
    }
}

/// Result of feeding one input to a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureUpdate {
    /// Nothing changed.
    None,
    /// The gesture crossed the activation threshold; carries the first live value.
    Activated(Transform),
    /// New live value for feedback. Not persisted.
    Preview(Transform),
    /// Pointer released after activity; persist this value.
    Committed(Transform),
    /// Pointer released before activation; nothing to persist.
    Released,
    /// Escape; the overlay shows this (initial) value again.
    Cancelled(Transform),
}

/// One gesture on one overlay.
#[derive(Debug, Clone)]
pub struct GestureMachine {
    kind: GestureKind,
    phase: GesturePhase,
    initial: Transform,
    origin: Point2D,
    transient: Option<Transform>,
}

impl GestureMachine {
    pub fn new(kind: GestureKind) -> Self {
        Self {
            kind,
            phase: GesturePhase::Idle,
            initial: Transform::default(),
            origin: Point2D::ORIGIN,
            transient: None,
        }
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Live value while active.
    pub fn transient(&self) -> Option<&Transform> {
        self.transient.as_ref()
    }

    /// Transform captured at pointer-down.
    pub fn initial(&self) -> &Transform {
        &self.initial
    }

    /// Pending or active.
    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, GesturePhase::Pending | GesturePhase::Active)
    }

    pub fn pointer_down(&mut self, initial: Transform, at: Point2D) -> SpliceResult<GestureUpdate> {
        if self.is_in_flight() {
            return Err(SpliceError::transform("gesture already in progress"));
        }
        self.initial = initial;
        self.origin = at;
        self.transient = None;
        self.phase = GesturePhase::Pending;
        Ok(GestureUpdate::None)
    }

    pub fn pointer_move(
        &mut self,
        at: Point2D,
        modifiers: Modifiers,
        ctx: &GestureContext,
    ) -> GestureUpdate {
        match self.phase {
            GesturePhase::Pending => {
                if at.distance_to(&self.origin) < ctx.activation_threshold_px {
                    return GestureUpdate::None;
                }
                let live = self.compute(at, modifiers, ctx);
                self.phase = GesturePhase::Active;
                self.transient = Some(live);
                GestureUpdate::Activated(live)
            }
            GesturePhase::Active => {
                let live = self.compute(at, modifiers, ctx);
                self.transient = Some(live);
                GestureUpdate::Preview(live)
            }
            _ => GestureUpdate::None,
        }
    }

    pub fn pointer_up(
        &mut self,
        at: Point2D,
        modifiers: Modifiers,
        ctx: &GestureContext,
    ) -> GestureUpdate {
        match self.phase {
            GesturePhase::Pending => {
                self.phase = GesturePhase::Idle;
                GestureUpdate::Released
            }
            GesturePhase::Active => {
                let committed = self.compute(at, modifiers, ctx);
                self.phase = GesturePhase::Committed;
                self.transient = None;
                tracing::debug!(kind = ?self.kind, x = committed.x, y = committed.y, "Gesture committed");
                GestureUpdate::Committed(committed)
            }
            _ => GestureUpdate::None,
        }
    }

    pub fn cancel(&mut self) -> GestureUpdate {
        if !self.is_in_flight() {
            return GestureUpdate::None;
        }
        self.phase = GesturePhase::Cancelled;
        self.transient = None;
        tracing::debug!(kind = ?self.kind, "Gesture cancelled");
        GestureUpdate::Cancelled(self.initial)
    }

    fn compute(&self, at: Point2D, modifiers: Modifiers, ctx: &GestureContext) -> Transform {
        compute_transient(self.kind, &self.initial, self.origin, at, modifiers, ctx)
    }
}

/// Live transform for a gesture of `kind` that started at `origin` on an
/// overlay whose transform was `initial`, with the pointer now at `current`.
pub fn compute_transient(
    kind: GestureKind,
    initial: &Transform,
    origin: Point2D,
    current: Point2D,
    modifiers: Modifiers,
    ctx: &GestureContext,
) -> Transform {
    match kind {
        GestureKind::Drag => drag(initial, origin, current, modifiers, ctx),
        GestureKind::Scale(_) => corner_scale(initial, origin, current, ctx),
        GestureKind::Resize(edge) => edge_resize(initial, edge, origin, current, ctx),
        GestureKind::Rotate => rotate(initial, origin, current, modifiers, ctx),
    }
}

fn drag(
    initial: &Transform,
    origin: Point2D,
    current: Point2D,
    modifiers: Modifiers,
    ctx: &GestureContext,
) -> Transform {
    let m = &ctx.mapping;
    let delta = m.screen_delta_to_video(current.sub(&origin), ctx.render_scale);
    let mut position = m.normalized_to_video(initial.position()).add(&delta);

    if let Some(tolerance) = ctx.snap.tolerance(SnapMode::from_modifiers(modifiers)) {
        // Box edges only line up with the frame when the box is axis aligned.
        let box_size = is_axis_aligned(initial.rotation).then(|| {
            let size = initial.size_or(ctx.intrinsic_size);
            Size2D::new(size.width * initial.scale, size.height * initial.scale)
        });
        position = snap_position(position, m.video, box_size, tolerance).position;
    }

    let n = m.video_to_normalized(position);
    Transform {
        x: n.x,
        y: n.y,
        ..*initial
    }
}

fn corner_scale(
    initial: &Transform,
    origin: Point2D,
    current: Point2D,
    ctx: &GestureContext,
) -> Transform {
    let center = ctx
        .mapping
        .normalized_to_screen(initial.position(), ctx.render_scale);
    let start = origin.distance_to(&center);
    if start < f64::EPSILON {
        return *initial;
    }
    let ratio = current.distance_to(&center) / start;
    Transform {
        scale: (initial.scale * ratio).max(MIN_SCALE),
        ..*initial
    }
}

fn edge_resize(
    initial: &Transform,
    edge: Edge,
    origin: Point2D,
    current: Point2D,
    ctx: &GestureContext,
) -> Transform {
    let m = &ctx.mapping;
    let start_width = initial.width.unwrap_or(ctx.intrinsic_size.width);
    let delta = m.screen_delta_to_video(current.sub(&origin), ctx.render_scale);

    // Pointer travel along the box's own x axis, in source units.
    let local_dx = delta.rotated(-initial.rotation).x / initial.scale;
    let grow = match edge {
        Edge::Right => local_dx,
        Edge::Left => -local_dx,
    };
    let width = (start_width + grow).max(MIN_WIDTH);
    let applied = width - start_width;

    // Keep the opposite edge fixed: the center moves half the growth.
    let shift_local = match edge {
        Edge::Right => applied / 2.0,
        Edge::Left => -applied / 2.0,
    } * initial.scale;
    let shift = Point2D::new(shift_local, 0.0).rotated(initial.rotation);
    let n = m.video_to_normalized(m.normalized_to_video(initial.position()).add(&shift));

    Transform {
        x: n.x,
        y: n.y,
        width: Some(width),
        ..*initial
    }
}

fn rotate(
    initial: &Transform,
    origin: Point2D,
    current: Point2D,
    modifiers: Modifiers,
    ctx: &GestureContext,
) -> Transform {
    let center = ctx
        .mapping
        .normalized_to_screen(initial.position(), ctx.render_scale);
    let from = origin.sub(&center);
    let to = current.sub(&center);
    if from.length() < f64::EPSILON || to.length() < f64::EPSILON {
        return *initial;
    }

    let mut rotation = initial.rotation + normalize_angle(to.angle_deg() - from.angle_deg());
    if SnapMode::from_modifiers(modifiers) != SnapMode::Off {
        rotation = snap_rotation(rotation, ctx.snap.rotation_step_deg);
    }
    Transform {
        rotation,
        ..*initial
    }
}

/// Wrap an angle into `(-180, 180]`.
pub fn normalize_angle(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

fn is_axis_aligned(rotation: f64) -> bool {
    let r = rotation.rem_euclid(90.0);
    r < 1e-6 || (90.0 - r) < 1e-6
}
