//! Text-family payload, shared by the text, LaTeX, emoji and formula tools.
//!
//! Content is an opaque string; layout and glyph rendering belong to the
//! external text widget layer. The envelope's bounding box is authoritative
//! for hit-testing and selection.

use super::Rgba;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOp {
    pub content: String,
    pub color: Rgba,
    pub size: f64,
}

impl TextOp {
    pub fn new(content: impl Into<String>, color: Rgba, size: f64) -> Self {
        Self {
            content: content.into(),
            color,
            size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}
