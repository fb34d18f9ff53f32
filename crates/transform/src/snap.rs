//! Modifier-driven snapping in video space.
//!
//! Candidates are the frame center (0) and the frame edges (±half the video
//! size). When the overlay's box size is known its edges also snap flush to
//! the frame edges. A value within tolerance of a candidate lands on it
//! exactly.

use splice_common::config::SnappingConfig;
use splice_project_model::event::Modifiers;
use splice_project_model::geometry::{Point2D, Size2D};

/// Snapping strength selected by the held modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMode {
    Off,
    /// Ctrl: tight tolerance.
    Strict,
    /// Shift: loose tolerance.
    Soft,
}

impl SnapMode {
    pub fn from_modifiers(modifiers: Modifiers) -> Self {
        if modifiers.ctrl {
            SnapMode::Strict
        } else if modifiers.shift {
            SnapMode::Soft
        } else {
            SnapMode::Off
        }
    }
}

/// Snap tolerances (video pixels) and rotation step (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapSettings {
    pub strict_tolerance_px: f64,
    pub soft_tolerance_px: f64,
    pub rotation_step_deg: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self::from(&SnappingConfig::default())
    }
}

impl From<&SnappingConfig> for SnapSettings {
    fn from(config: &SnappingConfig) -> Self {
        Self {
            strict_tolerance_px: config.strict_tolerance_px,
            soft_tolerance_px: config.soft_tolerance_px,
            rotation_step_deg: config.rotation_step_deg,
        }
    }
}

impl SnapSettings {
    pub fn tolerance(&self, mode: SnapMode) -> Option<f64> {
        match mode {
            SnapMode::Off => None,
            SnapMode::Strict => Some(self.strict_tolerance_px),
            SnapMode::Soft => Some(self.soft_tolerance_px),
        }
    }
}

/// What a value snapped to, for drawing guides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapTarget {
    Center,
    /// Left or top frame edge.
    LeadingEdge,
    /// Right or bottom frame edge.
    TrailingEdge,
}

/// Snap result for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSnap {
    pub value: f64,
    pub target: Option<SnapTarget>,
}

/// Snap result for a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSnap {
    pub position: Point2D,
    pub x: Option<SnapTarget>,
    pub y: Option<SnapTarget>,
}

/// Snap one axis of an overlay center.
///
/// `half_frame` is half the video extent on this axis; `half_box` is half
/// the overlay's extent, when known.
pub fn snap_axis(value: f64, half_frame: f64, half_box: Option<f64>, tolerance: f64) -> AxisSnap {
    let mut candidates = vec![
        (0.0, SnapTarget::Center),
        (-half_frame, SnapTarget::LeadingEdge),
        (half_frame, SnapTarget::TrailingEdge),
    ];
    if let Some(half_box) = half_box.filter(|h| h.is_finite() && *h > 0.0) {
        // Center positions that put a box edge flush with a frame edge.
        candidates.push((-half_frame + half_box, SnapTarget::LeadingEdge));
        candidates.push((half_frame - half_box, SnapTarget::TrailingEdge));
    }

    candidates
        .into_iter()
        .map(|(candidate, target)| ((value - candidate).abs(), candidate, target))
        .filter(|(distance, _, _)| *distance <= tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate, target)| AxisSnap {
            value: candidate,
            target: Some(target),
        })
        .unwrap_or(AxisSnap {
            value,
            target: None,
        })
}

/// Snap an overlay center given in video space.
pub fn snap_position(
    position: Point2D,
    video: Size2D,
    box_size: Option<Size2D>,
    tolerance: f64,
) -> PositionSnap {
    let half = video.half();
    let half_box = box_size.map(|s| s.half());
    let x = snap_axis(position.x, half.width, half_box.map(|b| b.width), tolerance);
    let y = snap_axis(position.y, half.height, half_box.map(|b| b.height), tolerance);
    PositionSnap {
        position: Point2D::new(x.value, y.value),
        x: x.target,
        y: y.target,
    }
}

/// Round an angle to the nearest multiple of `step_deg`.
pub fn snap_rotation(degrees: f64, step_deg: f64) -> f64 {
    if step_deg <= 0.0 || !step_deg.is_finite() {
        return degrees;
    }
    (degrees / step_deg).round() * step_deg
}
