//! Hit-testing, selection and the resize gesture engine.
//!
//! Hit-testing runs against the reduced scene in model space. The tolerance
//! is a fixed screen-space padding divided by the camera scale, so the feel
//! stays constant regardless of zoom. Resizing never mutates the target in
//! place: each drag frame produces a candidate bounding box that the board
//! turns into a coalesced `Update` log entry.

use crate::ops::{Bounds, OpId, Operation};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Screen-space hit padding in pixels.
pub const HIT_PADDING: f64 = 10.0;

/// Find the topmost operation under a model-space point.
///
/// The scene is iterated in reverse so the most recently drawn operation
/// wins. Remove markers and any leading Clear are skipped; they have no
/// geometry to hit.
pub fn hit_test(point: Point, scene: &[Operation], scale: f64) -> Option<OpId> {
    let tolerance = HIT_PADDING / scale.max(f64::EPSILON);
    scene
        .iter()
        .rev()
        .filter(|op| op.tool().is_drawable())
        .find(|op| op.pos.inflate(tolerance).contains(point))
        .map(|op| op.id)
}

/// The seven resize handle directions.
///
/// TopRight is intentionally absent; the handle set ships asymmetric and
/// the gap is preserved pending a product decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeDirection {
    TopLeft,
    TopCenter,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl ResizeDirection {
    /// All handle directions, in the order they are laid out on screen.
    pub const ALL: [ResizeDirection; 7] = [
        ResizeDirection::TopLeft,
        ResizeDirection::TopCenter,
        ResizeDirection::MiddleLeft,
        ResizeDirection::MiddleRight,
        ResizeDirection::BottomLeft,
        ResizeDirection::BottomCenter,
        ResizeDirection::BottomRight,
    ];

    /// Model-space anchor point of this handle on a bounding box.
    pub fn handle_position(self, b: Bounds) -> Point {
        match self {
            ResizeDirection::TopLeft => Point::new(b.x, b.y),
            ResizeDirection::TopCenter => Point::new(b.x + b.w / 2.0, b.y),
            ResizeDirection::MiddleLeft => Point::new(b.x, b.y + b.h / 2.0),
            ResizeDirection::MiddleRight => Point::new(b.x + b.w, b.y + b.h / 2.0),
            ResizeDirection::BottomLeft => Point::new(b.x, b.y + b.h),
            ResizeDirection::BottomCenter => Point::new(b.x + b.w / 2.0, b.y + b.h),
            ResizeDirection::BottomRight => Point::new(b.x + b.w, b.y + b.h),
        }
    }

    /// Clamp a pointer diff so the resulting box can never go negative.
    /// Edge handles also zero out the irrelevant axis.
    pub fn clamp_diff(self, anchor: Bounds, diff: Vec2) -> Vec2 {
        match self {
            ResizeDirection::TopLeft => Vec2::new(diff.x.min(anchor.w), diff.y.min(anchor.h)),
            ResizeDirection::TopCenter => Vec2::new(0.0, diff.y.min(anchor.h)),
            ResizeDirection::MiddleLeft => Vec2::new(diff.x.min(anchor.w), 0.0),
            ResizeDirection::MiddleRight => Vec2::new(diff.x.max(-anchor.w), 0.0),
            ResizeDirection::BottomLeft => Vec2::new(diff.x.min(anchor.w), diff.y.max(-anchor.h)),
            ResizeDirection::BottomCenter => Vec2::new(0.0, diff.y.max(-anchor.h)),
            ResizeDirection::BottomRight => {
                Vec2::new(diff.x.max(-anchor.w), diff.y.max(-anchor.h))
            }
        }
    }

    /// Apply a clamped diff to the anchor box. Corner handles adjust two
    /// edges plus the origin; edge handles adjust a single dimension.
    pub fn apply(self, anchor: Bounds, diff: Vec2) -> Bounds {
        let diff = self.clamp_diff(anchor, diff);
        match self {
            ResizeDirection::TopLeft => Bounds::new(
                anchor.x + diff.x,
                anchor.y + diff.y,
                anchor.w - diff.x,
                anchor.h - diff.y,
            ),
            ResizeDirection::TopCenter => {
                Bounds::new(anchor.x, anchor.y + diff.y, anchor.w, anchor.h - diff.y)
            }
            ResizeDirection::MiddleLeft => {
                Bounds::new(anchor.x + diff.x, anchor.y, anchor.w - diff.x, anchor.h)
            }
            ResizeDirection::MiddleRight => {
                Bounds::new(anchor.x, anchor.y, anchor.w + diff.x, anchor.h)
            }
            ResizeDirection::BottomLeft => Bounds::new(
                anchor.x + diff.x,
                anchor.y,
                anchor.w - diff.x,
                anchor.h + diff.y,
            ),
            ResizeDirection::BottomCenter => {
                Bounds::new(anchor.x, anchor.y, anchor.w, anchor.h + diff.y)
            }
            ResizeDirection::BottomRight => {
                Bounds::new(anchor.x, anchor.y, anchor.w + diff.x, anchor.h + diff.y)
            }
        }
    }
}

/// Handle positions for a selected operation's bounding box, for overlay UI.
pub fn handle_positions(bounds: Bounds) -> Vec<(ResizeDirection, Point)> {
    ResizeDirection::ALL
        .iter()
        .map(|&dir| (dir, dir.handle_position(bounds)))
        .collect()
}

/// Find a handle under a model-space point, zoom-compensated like hit_test.
pub fn hit_test_handles(bounds: Bounds, point: Point, scale: f64) -> Option<ResizeDirection> {
    let tolerance = HIT_PADDING / scale.max(f64::EPSILON);
    ResizeDirection::ALL.iter().copied().find(|dir| {
        let handle = dir.handle_position(bounds);
        (point - handle).hypot() <= tolerance
    })
}

/// State machine for an active resize gesture.
#[derive(Debug, Clone, Default)]
pub enum ResizeState {
    #[default]
    Idle,
    Resizing {
        target: OpId,
        direction: ResizeDirection,
        /// Bounding box of the target when the gesture started.
        anchor: Bounds,
        /// Model-space pointer position when the gesture started.
        anchor_point: Point,
    },
}

impl ResizeState {
    pub fn begin(&mut self, target: OpId, direction: ResizeDirection, anchor: Bounds, point: Point) {
        *self = ResizeState::Resizing {
            target,
            direction,
            anchor,
            anchor_point: point,
        };
    }

    /// Compute the updated bounding box for the current pointer position.
    /// Returns `None` when no gesture is active.
    pub fn update(&self, current: Point) -> Option<(OpId, Bounds)> {
        match self {
            ResizeState::Idle => None,
            ResizeState::Resizing {
                target,
                direction,
                anchor,
                anchor_point,
            } => {
                let diff = current - *anchor_point;
                Some((*target, direction.apply(*anchor, diff)))
            }
        }
    }

    pub fn finish(&mut self) {
        *self = ResizeState::Idle;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ResizeState::Resizing { .. })
    }
}
