//! View transform: affine model-to-view mapping with pan and pivot zoom.
//!
//! The transform is a full affine matrix `[a, b, c, d, e, f]` where `(a, d)`
//! carry the uniform scale and `(e, f)` the pan offset. `b` and `c` are
//! unused (no rotation) but retained for matrix-multiply generality.

use kurbo::{Affine, Point, Vec2};

/// Minimum allowed scale.
pub const MIN_SCALE: f64 = 0.25;
/// Maximum allowed scale.
pub const MAX_SCALE: f64 = 4.0;
/// Raw delta substituted for discrete zoom steps (wheel notches).
pub const DISCRETE_ZOOM_DELTA: f64 = 100.0;

/// Camera mapping model space to view/device space.
#[derive(Debug, Clone)]
pub struct Camera {
    transform: Affine,
    /// On-screen offset of the drawing surface within the window.
    pub surface_offset: Vec2,
    /// Device pixel ratio of the surface.
    pub pixel_ratio: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            surface_offset: Vec2::ZERO,
            pixel_ratio: 1.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current model-to-device affine.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Current uniform scale (the `a` coefficient).
    pub fn scale(&self) -> f64 {
        self.transform.as_coeffs()[0]
    }

    /// Current pan offset (the `e, f` coefficients).
    pub fn offset(&self) -> Vec2 {
        let c = self.transform.as_coeffs();
        Vec2::new(c[4], c[5])
    }

    /// Pan by a delta in device coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        let c = self.transform.as_coeffs();
        self.transform = Affine::new([c[0], c[1], c[2], c[3], c[4] + delta.x, c[5] + delta.y]);
    }

    /// Zoom so the model point currently under `device_point` stays under it.
    ///
    /// `raw_delta` is the gesture's signed delta; the new scale is
    /// `clamp(a - raw_delta / 1000)`. Discrete steps (wheel notches) are
    /// normalized to a fixed delta so trackpads and wheels feel consistent.
    pub fn zoom_at(&mut self, device_point: Point, raw_delta: f64, discrete: bool) {
        let delta = if discrete {
            raw_delta.signum() * DISCRETE_ZOOM_DELTA
        } else {
            raw_delta
        };
        let c = self.transform.as_coeffs();
        let scale = c[0];
        let new_scale = (scale - delta / 1000.0).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - scale).abs() < f64::EPSILON {
            return;
        }

        // Model point under the pivot before rescaling.
        let pivot = Point::new((device_point.x - c[4]) / c[0], (device_point.y - c[5]) / c[3]);
        let e = c[4] - pivot.x * (new_scale - c[0]);
        let f = c[5] - pivot.y * (new_scale - c[3]);
        self.transform = Affine::new([new_scale, c[1], c[2], new_scale, e, f]);
    }

    /// Map a window/pointer coordinate to model space, accounting for the
    /// surface's on-screen offset and device pixel density.
    pub fn view_to_model(&self, view_point: Point) -> Point {
        let device = Point::new(
            (view_point.x - self.surface_offset.x) * self.pixel_ratio,
            (view_point.y - self.surface_offset.y) * self.pixel_ratio,
        );
        self.transform.inverse() * device
    }

    /// Map a model coordinate back to window space. Used to position
    /// overlay UI (selection box, resize handles, menus).
    pub fn model_to_view(&self, model_point: Point) -> Point {
        let device = self.transform * model_point;
        Point::new(
            device.x / self.pixel_ratio + self.surface_offset.x,
            device.y / self.pixel_ratio + self.surface_offset.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_round_trip() {
        let camera = Camera::new();
        let p = Point::new(123.0, 456.0);
        let back = camera.model_to_view(camera.view_to_model(p));
        assert!((back.x - p.x).abs() < 1e-10);
        assert!((back.y - p.y).abs() < 1e-10);
    }

    #[test]
    fn test_round_trip_with_offset_and_ratio() {
        let mut camera = Camera::new();
        camera.surface_offset = Vec2::new(40.0, 60.0);
        camera.pixel_ratio = 2.0;
        camera.pan(Vec2::new(-15.0, 25.0));
        camera.zoom_at(Point::new(10.0, 10.0), -500.0, false);

        let p = Point::new(200.0, 300.0);
        let back = camera.model_to_view(camera.view_to_model(p));
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_scale_clamped() {
        let mut camera = Camera::new();
        camera.zoom_at(Point::ZERO, 10_000.0, false);
        assert!((camera.scale() - MIN_SCALE).abs() < f64::EPSILON);

        camera.zoom_at(Point::ZERO, -100_000.0, false);
        assert!((camera.scale() - MAX_SCALE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_pivot_invariance() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(30.0, -20.0));

        let pivot = Point::new(150.0, 90.0);
        let model_before = camera.view_to_model(pivot);
        camera.zoom_at(pivot, -400.0, false);
        let view_after = camera.model_to_view(model_before);

        assert!((view_after.x - pivot.x).abs() < 1e-9);
        assert!((view_after.y - pivot.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_pivot_invariance_with_surface_offset() {
        let mut camera = Camera::new();
        camera.surface_offset = Vec2::new(12.0, 8.0);
        camera.pixel_ratio = 2.0;

        // zoom_at operates in device coordinates; convert the window-space
        // pivot before pivoting.
        let window_pivot = Point::new(100.0, 100.0);
        let device_pivot = Point::new(
            (window_pivot.x - camera.surface_offset.x) * camera.pixel_ratio,
            (window_pivot.y - camera.surface_offset.y) * camera.pixel_ratio,
        );
        let model_before = camera.view_to_model(window_pivot);
        camera.zoom_at(device_pivot, -250.0, false);
        let after = camera.model_to_view(model_before);
        assert!((after.x - window_pivot.x).abs() < 1e-9);
        assert!((after.y - window_pivot.y).abs() < 1e-9);
    }

    #[test]
    fn test_discrete_step_normalization() {
        let mut a = Camera::new();
        let mut b = Camera::new();
        a.zoom_at(Point::ZERO, -3.0, true);
        b.zoom_at(Point::ZERO, -DISCRETE_ZOOM_DELTA, false);
        assert!((a.scale() - b.scale()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_moves_offset() {
        let mut camera = Camera::new();
        camera.pan(Vec2::new(10.0, 20.0));
        assert!((camera.offset().x - 10.0).abs() < f64::EPSILON);
        assert!((camera.offset().y - 20.0).abs() < f64::EPSILON);
    }
}
