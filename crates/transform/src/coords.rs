//! Coordinate spaces.
//!
//! - **Normalized:** fraction of half the video's width/height, origin at
//!   the frame center. This is what gets persisted.
//! - **Video:** source pixels, origin at the frame center. Snapping runs
//!   here so tolerances mean the same thing at every zoom level.
//! - **Screen:** preview surface pixels. The frame center sits at
//!   `origin` and one video pixel spans `render_scale` screen pixels.
//!
//! All three share +Y down.

use splice_project_model::geometry::{Point2D, Size2D};

/// Smallest render scale accepted; protects the inverse mapping.
pub const MIN_RENDER_SCALE: f64 = 1e-6;

/// Mapping between the coordinate spaces for one preview surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    /// Video size in source pixels.
    pub video: Size2D,
    /// Screen position of the frame center.
    pub origin: Point2D,
}

impl ScreenMapping {
    pub fn new(video: Size2D, origin: Point2D) -> Self {
        Self { video, origin }
    }

    /// Mapping for a preview surface of `surface` pixels with the frame
    /// centered in it.
    pub fn centered_in(video: Size2D, surface: Size2D) -> Self {
        Self::new(video, Point2D::new(surface.width / 2.0, surface.height / 2.0))
    }

    pub fn normalized_to_video(&self, p: Point2D) -> Point2D {
        let half = self.video.half();
        Point2D::new(p.x * half.width, p.y * half.height)
    }

    pub fn video_to_normalized(&self, p: Point2D) -> Point2D {
        let half = self.video.half();
        Point2D::new(p.x / half.width, p.y / half.height)
    }

    pub fn normalized_to_screen(&self, p: Point2D, render_scale: f64) -> Point2D {
        let scale = sanitize_scale(render_scale);
        let v = self.normalized_to_video(p);
        Point2D::new(self.origin.x + v.x * scale, self.origin.y + v.y * scale)
    }

    pub fn screen_to_normalized(&self, p: Point2D, render_scale: f64) -> Point2D {
        let scale = sanitize_scale(render_scale);
        let v = Point2D::new((p.x - self.origin.x) / scale, (p.y - self.origin.y) / scale);
        self.video_to_normalized(v)
    }

    /// Screen-space delta expressed in video pixels.
    pub fn screen_delta_to_video(&self, delta: Point2D, render_scale: f64) -> Point2D {
        let scale = sanitize_scale(render_scale);
        Point2D::new(delta.x / scale, delta.y / scale)
    }
}

fn sanitize_scale(render_scale: f64) -> f64 {
    if render_scale.is_finite() {
        render_scale.max(MIN_RENDER_SCALE)
    } else {
        1.0
    }
}
