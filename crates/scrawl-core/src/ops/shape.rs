//! Shape payload: rectangles, ovals, triangles and arrow polygons.

use super::{Bounds, Rgba};
use kurbo::{BezPath, Ellipse, Point, Shape as KurboShape, Vec2};
use serde::{Deserialize, Serialize};

/// Drags shorter than this (in model units, per axis combined) are treated
/// as accidental clicks and discarded.
pub const MIN_DRAG_DISTANCE: f64 = 2.0;

/// Available shape primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    Rectangle,
    Oval,
    IsoTriangle,
    RightTriangle,
    ArrowLeft,
    ArrowRight,
}

/// A shape defined by the two corners of its drag gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeOp {
    pub kind: ShapeKind,
    /// Top-left corner (normalized).
    pub start: Point,
    /// Bottom-right corner (normalized).
    pub end: Point,
    pub color: Rgba,
    pub size: f64,
}

impl ShapeOp {
    /// Build a shape from a drag gesture. Corners are normalized so the drag
    /// direction never affects the stored geometry. Returns `None` for
    /// near-zero drags.
    pub fn from_drag(kind: ShapeKind, a: Point, b: Point, color: Rgba, size: f64) -> Option<Self> {
        if (b - a).hypot() < MIN_DRAG_DISTANCE {
            return None;
        }
        let bounds = Bounds::from_corners(a, b);
        Some(Self {
            kind,
            start: bounds.origin(),
            end: Point::new(bounds.x + bounds.w, bounds.y + bounds.h),
            color,
            size,
        })
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_corners(self.start, self.end)
    }

    /// Recompute the corners from a new bounding box.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.start = bounds.origin();
        self.end = Point::new(bounds.x + bounds.w, bounds.y + bounds.h);
    }

    pub fn to_path(&self) -> BezPath {
        let b = self.bounds();
        match self.kind {
            ShapeKind::Rectangle => b.to_rect().to_path(0.1),
            ShapeKind::Oval => {
                Ellipse::new(b.center(), Vec2::new(b.w / 2.0, b.h / 2.0), 0.0).to_path(0.1)
            }
            ShapeKind::IsoTriangle => polygon(&[
                Point::new(b.x + b.w / 2.0, b.y),
                Point::new(b.x + b.w, b.y + b.h),
                Point::new(b.x, b.y + b.h),
            ]),
            ShapeKind::RightTriangle => polygon(&[
                Point::new(b.x, b.y),
                Point::new(b.x + b.w, b.y + b.h),
                Point::new(b.x, b.y + b.h),
            ]),
            ShapeKind::ArrowRight => polygon(&arrow_points(b, false)),
            ShapeKind::ArrowLeft => polygon(&arrow_points(b, true)),
        }
    }
}

/// Closed polygon through the given points.
fn polygon(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for point in rest {
            path.line_to(*point);
        }
        path.close_path();
    }
    path
}

/// Arrow polygon parameterized by width/height fractions of the drag box:
/// a shaft across the middle half of the height joined to a full-height
/// triangular head occupying the last 40% of the width.
fn arrow_points(b: Bounds, left: bool) -> Vec<Point> {
    let fx = |f: f64| {
        if left {
            b.x + b.w * (1.0 - f)
        } else {
            b.x + b.w * f
        }
    };
    let fy = |f: f64| b.y + b.h * f;
    vec![
        Point::new(fx(0.0), fy(0.25)),
        Point::new(fx(0.6), fy(0.25)),
        Point::new(fx(0.6), fy(0.0)),
        Point::new(fx(1.0), fy(0.5)),
        Point::new(fx(0.6), fy(1.0)),
        Point::new(fx(0.6), fy(0.75)),
        Point::new(fx(0.0), fy(0.75)),
    ]
}
