//! Operation model for the scrawl board.
//!
//! Every edit is recorded as an [`Operation`]: a shared envelope (id, author,
//! timestamp, bounding box) plus a tool-specific body. Meta operations
//! (undo/redo/clear) and overlay operations (update/remove) carry no drawable
//! payload of their own; they only affect how the log reduces.

mod image;
mod path;
mod shape;
mod text;

pub use image::{ImageFormat, ImageOp};
pub use path::{downsample, PathOp, HIGHLIGHTER_ALPHA, MIN_STROKE_POINTS};
pub use shape::{ShapeKind, ShapeOp, MIN_DRAG_DISTANCE};
pub use text::TextOp;

use kurbo::{BezPath, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for operations.
pub type OpId = Uuid;

/// Accent color used for hover outlines.
pub const ACCENT: Rgba = Rgba {
    r: 66,
    g: 133,
    b: 244,
    a: 255,
};

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Return the same color with a different alpha (0.0..=1.0).
    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0) as u8,
            ..self
        }
    }

    /// Parse a `#rgb`, `#rrggbb` or `#rrggbbaa` hex string.
    /// Unparseable input falls back to black.
    pub fn from_hex(hex: &str) -> Self {
        let hex = hex.trim().trim_start_matches('#');
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(&hex[0..1], 16).unwrap_or(0) * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).unwrap_or(0) * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).unwrap_or(0) * 17;
                Self::new(r, g, b, 255)
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                Self::new(r, g, b, 255)
            }
            8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
                let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
                let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
                let a = u8::from_str_radix(&hex[6..8], 16).unwrap_or(255);
                Self::new(r, g, b, a)
            }
            _ => Self::black(),
        }
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<Rgba> for Color {
    fn from(color: Rgba) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Axis-aligned bounding box in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Normalized box from two drag corners; drag direction never affects
    /// the stored position.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            w: (b.x - a.x).abs(),
            h: (b.y - a.y).abs(),
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            x: rect.x0,
            y: rect.y0,
            w: rect.width(),
            h: rect.height(),
        }
    }

    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }

    pub fn origin(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn contains(self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.w
            && point.y >= self.y
            && point.y <= self.y + self.h
    }

    /// Grow the box by `pad` on every side.
    pub fn inflate(self, pad: f64) -> Self {
        Self {
            x: self.x - pad,
            y: self.y - pad,
            w: self.w + pad * 2.0,
            h: self.h + pad * 2.0,
        }
    }

    pub fn translate(self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..self
        }
    }
}

/// Closed set of tool discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    Stroke,
    Highlighter,
    Shape,
    Text,
    Latex,
    Emoji,
    Formula,
    Image,
    Undo,
    Redo,
    Clear,
    Update,
    Remove,
}

impl ToolKind {
    /// Meta operations affect reduction but carry no drawable payload.
    pub fn is_meta(self) -> bool {
        matches!(self, ToolKind::Undo | ToolKind::Redo | ToolKind::Clear)
    }

    /// Overlay operations reference another operation by id.
    pub fn is_overlay(self) -> bool {
        matches!(self, ToolKind::Update | ToolKind::Remove)
    }

    /// Drawable operations contribute visible content to the scene.
    pub fn is_drawable(self) -> bool {
        !self.is_meta() && !self.is_overlay()
    }

    /// Tools whose content is edited through the external text widget.
    /// A double-click on one of these re-enters edit mode.
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            ToolKind::Text | ToolKind::Latex | ToolKind::Emoji | ToolKind::Formula
        )
    }
}

/// Partial field patch carried by an `Update` operation.
/// Absent fields leave the target untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl OpPatch {
    /// Patch that only moves/resizes the target.
    pub fn position(pos: Bounds) -> Self {
        Self {
            pos: Some(pos),
            ..Self::default()
        }
    }
}

/// Tool-specific body of an operation. The serde tag produces the
/// `"tool": "<kind>"` discriminant of the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "camelCase")]
pub enum OpBody {
    Stroke(PathOp),
    Highlighter(PathOp),
    Shape(ShapeOp),
    Text(TextOp),
    Latex(TextOp),
    Emoji(TextOp),
    Formula(TextOp),
    Image(ImageOp),
    Undo,
    Redo,
    Clear,
    Update { target: OpId, patch: OpPatch },
    Remove { target: OpId },
}

/// One atomic, timestamped edit record in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique id, assigned by the author.
    pub id: OpId,
    /// Author of the operation.
    pub user_id: String,
    /// Milliseconds since the epoch; used only for cross-author ordering.
    pub timestamp: u64,
    /// Bounding box in model space.
    pub pos: Bounds,
    #[serde(flatten)]
    pub body: OpBody,
}

impl Operation {
    /// Create a new operation with a fresh id.
    pub fn new(user_id: impl Into<String>, timestamp: u64, pos: Bounds, body: OpBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            timestamp,
            pos,
            body,
        }
    }

    /// Tool discriminant of the body.
    pub fn tool(&self) -> ToolKind {
        match &self.body {
            OpBody::Stroke(_) => ToolKind::Stroke,
            OpBody::Highlighter(_) => ToolKind::Highlighter,
            OpBody::Shape(_) => ToolKind::Shape,
            OpBody::Text(_) => ToolKind::Text,
            OpBody::Latex(_) => ToolKind::Latex,
            OpBody::Emoji(_) => ToolKind::Emoji,
            OpBody::Formula(_) => ToolKind::Formula,
            OpBody::Image(_) => ToolKind::Image,
            OpBody::Undo => ToolKind::Undo,
            OpBody::Redo => ToolKind::Redo,
            OpBody::Clear => ToolKind::Clear,
            OpBody::Update { .. } => ToolKind::Update,
            OpBody::Remove { .. } => ToolKind::Remove,
        }
    }

    /// Target id of an overlay operation, if any.
    pub fn overlay_target(&self) -> Option<OpId> {
        match &self.body {
            OpBody::Update { target, .. } | OpBody::Remove { target } => Some(*target),
            _ => None,
        }
    }

    /// Path representation for rendering. Meta and overlay operations have
    /// none; images are drawn from the decoded asset, not a path.
    pub fn to_path(&self) -> Option<BezPath> {
        match &self.body {
            OpBody::Stroke(p) | OpBody::Highlighter(p) => Some(p.to_path()),
            OpBody::Shape(s) => Some(s.to_path()),
            OpBody::Text(_) | OpBody::Latex(_) | OpBody::Emoji(_) | OpBody::Formula(_) => None,
            OpBody::Image(_) => None,
            OpBody::Undo
            | OpBody::Redo
            | OpBody::Clear
            | OpBody::Update { .. }
            | OpBody::Remove { .. } => None,
        }
    }

    /// Primary color of the drawable payload, if any.
    pub fn color(&self) -> Option<Rgba> {
        match &self.body {
            OpBody::Stroke(p) | OpBody::Highlighter(p) => Some(p.color),
            OpBody::Shape(s) => Some(s.color),
            OpBody::Text(t) | OpBody::Latex(t) | OpBody::Emoji(t) | OpBody::Formula(t) => {
                Some(t.color)
            }
            OpBody::Image(_)
            | OpBody::Undo
            | OpBody::Redo
            | OpBody::Clear
            | OpBody::Update { .. }
            | OpBody::Remove { .. } => None,
        }
    }

    /// Line width / font size of the drawable payload, if any.
    pub fn size(&self) -> Option<f64> {
        match &self.body {
            OpBody::Stroke(p) | OpBody::Highlighter(p) => Some(p.size),
            OpBody::Shape(s) => Some(s.size),
            OpBody::Text(t) | OpBody::Latex(t) | OpBody::Emoji(t) | OpBody::Formula(t) => {
                Some(t.size)
            }
            OpBody::Image(_)
            | OpBody::Undo
            | OpBody::Redo
            | OpBody::Clear
            | OpBody::Update { .. }
            | OpBody::Remove { .. } => None,
        }
    }

    /// Move the operation so its bounding box lands at `pos`, updating
    /// tool-specific derived geometry: point lists are translated by the
    /// positional delta, shape corners are recomputed from the new box.
    pub fn set_pos(&mut self, pos: Bounds) {
        let delta = Vec2::new(pos.x - self.pos.x, pos.y - self.pos.y);
        self.pos = pos;
        match &mut self.body {
            OpBody::Stroke(p) | OpBody::Highlighter(p) => p.translate(delta),
            OpBody::Shape(s) => s.set_bounds(pos),
            OpBody::Text(_)
            | OpBody::Latex(_)
            | OpBody::Emoji(_)
            | OpBody::Formula(_)
            | OpBody::Image(_) => {}
            OpBody::Undo
            | OpBody::Redo
            | OpBody::Clear
            | OpBody::Update { .. }
            | OpBody::Remove { .. } => {}
        }
    }

    /// Merge an update patch into this operation.
    pub fn apply_patch(&mut self, patch: &OpPatch) {
        if let Some(color) = patch.color {
            match &mut self.body {
                OpBody::Stroke(p) | OpBody::Highlighter(p) => p.color = color,
                OpBody::Shape(s) => s.color = color,
                OpBody::Text(t) | OpBody::Latex(t) | OpBody::Emoji(t) | OpBody::Formula(t) => {
                    t.color = color
                }
                _ => {}
            }
        }
        if let Some(size) = patch.size {
            match &mut self.body {
                OpBody::Stroke(p) | OpBody::Highlighter(p) => p.size = size,
                OpBody::Shape(s) => s.size = size,
                OpBody::Text(t) | OpBody::Latex(t) | OpBody::Emoji(t) | OpBody::Formula(t) => {
                    t.size = size
                }
                _ => {}
            }
        }
        if let Some(content) = &patch.content {
            match &mut self.body {
                OpBody::Text(t) | OpBody::Latex(t) | OpBody::Emoji(t) | OpBody::Formula(t) => {
                    t.content = content.clone()
                }
                _ => {}
            }
        }
        if let Some(pos) = patch.pos {
            self.set_pos(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_corners_normalizes() {
        let b = Bounds::from_corners(Point::new(100.0, 80.0), Point::new(20.0, 120.0));
        assert!((b.x - 20.0).abs() < f64::EPSILON);
        assert!((b.y - 80.0).abs() < f64::EPSILON);
        assert!((b.w - 80.0).abs() < f64::EPSILON);
        assert!((b.h - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_inflate_contains() {
        let b = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(!b.contains(Point::new(12.0, 5.0)));
        assert!(b.inflate(5.0).contains(Point::new(12.0, 5.0)));
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgba::from_hex("#ff0000"), Rgba::new(255, 0, 0, 255));
        assert_eq!(Rgba::from_hex("#f00"), Rgba::new(255, 0, 0, 255));
        assert_eq!(Rgba::from_hex("#11223344"), Rgba::new(0x11, 0x22, 0x33, 0x44));
        assert_eq!(Rgba::from_hex("garbage"), Rgba::black());
    }

    #[test]
    fn test_tool_classification() {
        assert!(ToolKind::Undo.is_meta());
        assert!(ToolKind::Update.is_overlay());
        assert!(ToolKind::Stroke.is_drawable());
        assert!(ToolKind::Latex.is_text_like());
        assert!(!ToolKind::Clear.is_drawable());
    }

    #[test]
    fn test_wire_shape_tagging() {
        let op = Operation::new(
            "u1",
            42,
            Bounds::new(1.0, 2.0, 3.0, 4.0),
            OpBody::Text(TextOp {
                content: "hi".to_string(),
                color: Rgba::black(),
                size: 16.0,
            }),
        );
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["tool"], "text");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["pos"]["w"], 3.0);
        assert_eq!(json["content"], "hi");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_meta_wire_shape() {
        let op = Operation::new("u1", 1, Bounds::default(), OpBody::Undo);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["tool"], "undo");
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back.tool(), ToolKind::Undo);
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut op = Operation::new(
            "u1",
            1,
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            OpBody::Text(TextOp {
                content: "a".to_string(),
                color: Rgba::black(),
                size: 12.0,
            }),
        );
        op.apply_patch(&OpPatch {
            pos: None,
            color: Some(Rgba::white()),
            size: Some(20.0),
            content: Some("b".to_string()),
        });
        assert_eq!(op.color(), Some(Rgba::white()));
        assert_eq!(op.size(), Some(20.0));
        match &op.body {
            OpBody::Text(t) => assert_eq!(t.content, "b"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_set_pos_translates_points() {
        let mut op = Operation::new(
            "u1",
            1,
            Bounds::new(0.0, 0.0, 10.0, 10.0),
            OpBody::Stroke(PathOp {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
                color: Rgba::black(),
                size: 2.0,
            }),
        );
        op.set_pos(Bounds::new(5.0, 5.0, 10.0, 10.0));
        match &op.body {
            OpBody::Stroke(p) => {
                assert!((p.points[0].x - 5.0).abs() < f64::EPSILON);
                assert!((p.points[1].y - 15.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected stroke"),
        }
    }
}
