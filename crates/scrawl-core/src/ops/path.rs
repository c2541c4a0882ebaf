//! Freehand stroke and highlighter payloads.

use super::{Bounds, Rgba};
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Alpha applied to highlighter strokes at draw time.
pub const HIGHLIGHTER_ALPHA: f64 = 0.3;

/// Minimum number of down-sampled points for a stroke to be kept.
/// Anything shorter is treated as an accidental tap.
pub const MIN_STROKE_POINTS: usize = 3;

/// Ordered point list shared by the stroke and highlighter tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOp {
    pub points: Vec<Point>,
    pub color: Rgba,
    pub size: f64,
}

/// Down-sample raw pointer samples by taking every other point.
pub fn downsample(samples: &[Point]) -> Vec<Point> {
    samples.iter().copied().step_by(2).collect()
}

impl PathOp {
    /// Build a stroke payload from raw pointer samples. Returns `None` when
    /// the down-sampled gesture is too short to be intentional.
    pub fn from_samples(samples: &[Point], color: Rgba, size: f64) -> Option<Self> {
        let points = downsample(samples);
        if points.len() < MIN_STROKE_POINTS {
            return None;
        }
        Some(Self {
            points,
            color,
            size,
        })
    }

    /// Bounding box of the point list.
    pub fn bounds(&self) -> Bounds {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        if self.points.is_empty() {
            return Bounds::default();
        }
        Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            point.x += delta.x;
            point.y += delta.y;
        }
    }

    /// Smoothed path: quadratic Bézier segments through consecutive
    /// midpoints, with each recorded point as the control point.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let points = &self.points;
        if points.is_empty() {
            return path;
        }
        path.move_to(points[0]);
        if points.len() < 3 {
            for point in points.iter().skip(1) {
                path.line_to(*point);
            }
            return path;
        }
        for i in 1..points.len() - 1 {
            let mid = Point::new(
                (points[i].x + points[i + 1].x) / 2.0,
                (points[i].y + points[i + 1].y) / 2.0,
            );
            path.quad_to(points[i], mid);
        }
        path.line_to(points[points.len() - 1]);
        path
    }
}
