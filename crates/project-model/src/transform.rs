//! Persisted overlay transform.
//!
//! `Transform` is the one structure that crosses the persistence boundary,
//! so its JSON shape must stay backward compatible:
//! - `x`, `y`: normalized position, a fraction of half the video's
//!   width/height about the frame center. Roughly `-1..1` is on screen;
//!   values beyond are valid (overlay partly or fully off-frame).
//! - `scale`: uniform scale factor.
//! - `rotation`: degrees, clockwise on screen.
//! - `width`, `height`: optional box size in source-space units.
//!
//! Older documents stored `x`/`y` as pixel offsets from the frame center.
//! They carry no `coordinate_space` field and deserialize as
//! [`CoordinateSpace::LegacyPixels`]; the first read migrates them once.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point2D, Size2D};

/// Unit of the persisted `x`/`y` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Fraction of half the video size, origin at center.
    Normalized,
    /// Pixel offsets from the frame center. Documents without the field.
    #[default]
    LegacyPixels,
}

/// Overlay placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub coordinate_space: CoordinateSpace,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            rotation: 0.0,
            width: None,
            height: None,
            coordinate_space: CoordinateSpace::Normalized,
        }
    }
}

/// Result of a legacy migration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to do; the transform was already normalized.
    AlreadyNormalized,
    /// Converted using the project's video size.
    Migrated,
    /// The video size was unusable; converted against the fallback size.
    MigratedWithFallback,
}

/// Partial update merged into a [`Transform`]. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub scale: Option<f64>,
    pub rotation: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl Transform {
    /// Normalized transform at `(x, y)` with unit scale.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn is_normalized(&self) -> bool {
        self.coordinate_space == CoordinateSpace::Normalized
    }

    /// Box size, falling back to `intrinsic` for missing dimensions.
    pub fn size_or(&self, intrinsic: Size2D) -> Size2D {
        Size2D::new(
            self.width.unwrap_or(intrinsic.width),
            self.height.unwrap_or(intrinsic.height),
        )
    }

    /// Convert legacy pixel offsets to normalized space, exactly once.
    ///
    /// `video` is the project's video size; when it is unusable the
    /// `fallback` reference size is used instead. Either way the transform
    /// is flagged normalized afterwards so the conversion never repeats.
    pub fn migrate_legacy(&mut self, video: Size2D, fallback: Size2D) -> MigrationOutcome {
        if self.is_normalized() {
            return MigrationOutcome::AlreadyNormalized;
        }

        let (reference, outcome) = if video.is_valid() {
            (video, MigrationOutcome::Migrated)
        } else {
            tracing::warn!(
                width = video.width,
                height = video.height,
                fallback_width = fallback.width,
                fallback_height = fallback.height,
                "Legacy transform has no usable video size; normalizing against fallback"
            );
            (fallback, MigrationOutcome::MigratedWithFallback)
        };

        if reference.is_valid() {
            let half = reference.half();
            self.x /= half.width;
            self.y /= half.height;
        } else {
            tracing::warn!("Fallback reference size is unusable; keeping legacy values as-is");
        }
        self.coordinate_space = CoordinateSpace::Normalized;
        outcome
    }

    /// Read the transform in normalized space, migrating in place on the
    /// first read of a legacy value.
    pub fn read_normalized(&mut self, video: Size2D, fallback: Size2D) -> Transform {
        self.migrate_legacy(video, fallback);
        *self
    }

    /// Merge a partial update into this transform.
    pub fn apply(&mut self, patch: &TransformPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(width) = patch.width {
            self.width = Some(width);
        }
        if let Some(height) = patch.height {
            self.height = Some(height);
        }
    }

    /// Copy of this transform with `patch` merged in.
    pub fn merged(&self, patch: &TransformPatch) -> Transform {
        let mut out = *self;
        out.apply(patch);
        out
    }

    /// Check the values are usable for rendering.
    pub fn validate(&self) -> Result<(), String> {
        let finite = [self.x, self.y, self.scale, self.rotation]
            .iter()
            .chain(self.width.iter())
            .chain(self.height.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err("transform contains a non-finite value".to_string());
        }
        if self.scale <= 0.0 {
            return Err(format!("scale must be > 0, got {}", self.scale));
        }
        if self.width.is_some_and(|w| w <= 0.0) || self.height.is_some_and(|h| h <= 0.0) {
            return Err("width/height must be > 0".to_string());
        }
        Ok(())
    }
}

impl TransformPatch {
    /// Patch replacing every field present in `transform`.
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            x: Some(transform.x),
            y: Some(transform.y),
            scale: Some(transform.scale),
            rotation: Some(transform.rotation),
            width: transform.width,
            height: transform.height,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TransformPatch::default()
    }
}
